//! Published rewards and issued credentials.

use charm_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `proposal_rewards` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProposalReward {
    pub id: DbId,
    pub proposal_id: DbId,
    pub reward: serde_json::Value,
    pub created_at: Timestamp,
}

/// A row from the `issued_credentials` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct IssuedCredential {
    pub id: DbId,
    pub proposal_id: DbId,
    pub credential_template_id: String,
    pub user_id: DbId,
    pub created_at: Timestamp,
}
