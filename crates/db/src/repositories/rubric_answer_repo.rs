//! Repository for final and draft rubric answers.
//!
//! Final answers live in `proposal_rubric_criteria_answers`, drafts in
//! `draft_proposal_rubric_criteria_answers`. Both are written as whole sets:
//! a reviewer's previous set for the evaluation is deleted and the new set
//! inserted in one transaction.

use charm_core::rubric::ValidatedAnswer;
use charm_core::types::DbId;
use sqlx::PgPool;

use crate::models::rubric::{AnswerScope, RubricAnswer};

/// Column list for both answer tables.
const COLUMNS: &str =
    "proposal_id, evaluation_id, user_id, rubric_criteria_id, response, comment, created_at";

fn table(is_draft: bool) -> &'static str {
    if is_draft {
        "draft_proposal_rubric_criteria_answers"
    } else {
        "proposal_rubric_criteria_answers"
    }
}

pub struct RubricAnswerRepo;

impl RubricAnswerRepo {
    /// Replace a reviewer's answer set for one evaluation.
    pub async fn replace(
        pool: &PgPool,
        scope: AnswerScope,
        answers: &[ValidatedAnswer],
        is_draft: bool,
    ) -> Result<Vec<RubricAnswer>, sqlx::Error> {
        let table = table(is_draft);
        let mut tx = pool.begin().await?;

        let delete = format!(
            "DELETE FROM {table} WHERE proposal_id = $1 AND evaluation_id = $2 AND user_id = $3"
        );
        sqlx::query(&delete)
            .bind(scope.proposal_id)
            .bind(scope.evaluation_id)
            .bind(scope.user_id)
            .execute(&mut *tx)
            .await?;

        let insert = format!(
            "INSERT INTO {table} \
                (proposal_id, evaluation_id, user_id, rubric_criteria_id, response, comment) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        let mut rows = Vec::with_capacity(answers.len());
        for answer in answers {
            let row = sqlx::query_as::<_, RubricAnswer>(&insert)
                .bind(scope.proposal_id)
                .bind(scope.evaluation_id)
                .bind(scope.user_id)
                .bind(answer.rubric_criteria_id)
                .bind(answer.response())
                .bind(&answer.comment)
                .fetch_one(&mut *tx)
                .await?;
            rows.push(row);
        }

        tx.commit().await?;
        Ok(rows)
    }

    /// List a proposal's answers, optionally narrowed to one evaluation.
    pub async fn list(
        pool: &PgPool,
        proposal_id: DbId,
        evaluation_id: Option<DbId>,
        is_draft: bool,
    ) -> Result<Vec<RubricAnswer>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM {} \
             WHERE proposal_id = $1 AND ($2::UUID IS NULL OR evaluation_id = $2) \
             ORDER BY created_at",
            table(is_draft)
        );
        sqlx::query_as::<_, RubricAnswer>(&query)
            .bind(proposal_id)
            .bind(evaluation_id)
            .fetch_all(pool)
            .await
    }
}
