//! Proposal and page models.

use charm_core::error::CoreError;
use charm_core::evaluation::ProposalStatus;
use charm_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Key under `fields` holding rewards not yet published.
pub const PENDING_REWARDS_FIELD: &str = "pendingRewards";

/// A row from the `proposals` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Proposal {
    pub id: DbId,
    pub space_id: DbId,
    pub status: String,
    pub published_at: Option<Timestamp>,
    pub workflow_id: Option<DbId>,
    pub fields: serde_json::Value,
    pub selected_credential_template_ids: Vec<String>,
    pub authors: Vec<DbId>,
    pub created_by: DbId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Proposal {
    pub fn status(&self) -> Result<ProposalStatus, CoreError> {
        ProposalStatus::parse(&self.status)
    }

    /// Rewards attached to the proposal but not yet published.
    pub fn pending_rewards(&self) -> Vec<serde_json::Value> {
        self.fields
            .get(PENDING_REWARDS_FIELD)
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_author(&self, user_id: DbId) -> bool {
        self.created_by == user_id || self.authors.contains(&user_id)
    }
}

/// A row from the `pages` table. Each proposal shares its id with its page.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Page {
    pub id: DbId,
    pub space_id: DbId,
    pub title: String,
    pub path: String,
    pub is_template: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a draft proposal together with its page.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProposal {
    pub space_id: DbId,
    pub title: String,
    pub created_by: DbId,
    pub authors: Vec<DbId>,
    pub is_template: bool,
    pub workflow_id: Option<DbId>,
    pub fields: serde_json::Value,
    pub selected_credential_template_ids: Vec<String>,
}

/// Filters for listing a space's proposals.
#[derive(Debug, Clone, Default)]
pub struct ProposalFilter {
    pub status: Option<ProposalStatus>,
    pub include_templates: bool,
}
