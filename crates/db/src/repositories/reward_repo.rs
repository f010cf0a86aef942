//! Repository for `proposal_rewards` and `issued_credentials`.

use charm_core::types::DbId;
use sqlx::PgPool;

use crate::models::reward::{IssuedCredential, ProposalReward};

pub struct RewardRepo;

impl RewardRepo {
    pub async fn list_rewards(
        pool: &PgPool,
        proposal_id: DbId,
    ) -> Result<Vec<ProposalReward>, sqlx::Error> {
        sqlx::query_as::<_, ProposalReward>(
            "SELECT id, proposal_id, reward, created_at FROM proposal_rewards \
             WHERE proposal_id = $1 ORDER BY created_at",
        )
        .bind(proposal_id)
        .fetch_all(pool)
        .await
    }

    pub async fn list_issued_credentials(
        pool: &PgPool,
        proposal_id: DbId,
    ) -> Result<Vec<IssuedCredential>, sqlx::Error> {
        sqlx::query_as::<_, IssuedCredential>(
            "SELECT id, proposal_id, credential_template_id, user_id, created_at \
             FROM issued_credentials WHERE proposal_id = $1 ORDER BY created_at",
        )
        .bind(proposal_id)
        .fetch_all(pool)
        .await
    }
}
