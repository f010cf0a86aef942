//! Repository for the `votes` table.

use charm_core::vote::VOTE_STATUS_IN_PROGRESS;
use charm_core::types::DbId;
use sqlx::PgPool;

use crate::models::vote::{CreateVote, Vote};

/// Column list for `votes` queries.
const COLUMNS: &str = "id, proposal_id, evaluation_id, space_id, title, vote_type, options, \
    threshold, max_choices, deadline, status, created_by, created_at";

pub struct VoteRepo;

impl VoteRepo {
    pub async fn find_by_evaluation(
        pool: &PgPool,
        evaluation_id: DbId,
    ) -> Result<Option<Vote>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM votes WHERE evaluation_id = $1");
        sqlx::query_as::<_, Vote>(&query)
            .bind(evaluation_id)
            .fetch_optional(pool)
            .await
    }

    /// Open a vote. A second vote for the same step violates `uq_votes_evaluation`.
    pub async fn create(pool: &PgPool, input: &CreateVote) -> Result<Vote, sqlx::Error> {
        let query = format!(
            "INSERT INTO votes \
                (id, proposal_id, evaluation_id, space_id, title, vote_type, options, \
                 threshold, max_choices, deadline, status, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Vote>(&query)
            .bind(DbId::new_v4())
            .bind(input.proposal_id)
            .bind(input.evaluation_id)
            .bind(input.space_id)
            .bind(&input.title)
            .bind(&input.vote_type)
            .bind(&input.options)
            .bind(input.threshold)
            .bind(input.max_choices)
            .bind(input.deadline)
            .bind(VOTE_STATUS_IN_PROGRESS)
            .bind(input.created_by)
            .fetch_one(pool)
            .await
    }
}
