//! In-app vote models.

use charm_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `votes` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Vote {
    pub id: DbId,
    pub proposal_id: DbId,
    pub evaluation_id: DbId,
    pub space_id: DbId,
    pub title: String,
    pub vote_type: String,
    pub options: Vec<String>,
    pub threshold: f64,
    pub max_choices: i32,
    pub deadline: Timestamp,
    pub status: String,
    pub created_by: DbId,
    pub created_at: Timestamp,
}

/// DTO for opening a vote on a vote step.
#[derive(Debug, Clone)]
pub struct CreateVote {
    pub proposal_id: DbId,
    pub evaluation_id: DbId,
    pub space_id: DbId,
    pub title: String,
    pub vote_type: String,
    pub options: Vec<String>,
    pub threshold: f64,
    pub max_choices: i32,
    pub deadline: Timestamp,
    pub created_by: DbId,
}
