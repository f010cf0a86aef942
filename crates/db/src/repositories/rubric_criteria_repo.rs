//! Repository for the `proposal_rubric_criteria` table.

use charm_core::rubric::{CriteriaPlan, CRITERIA_TYPE_RANGE};
use charm_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::rubric::RubricCriteria;

/// Column list for `proposal_rubric_criteria` queries.
const COLUMNS: &str =
    "id, proposal_id, evaluation_id, index, title, description, criteria_type, parameters";

pub struct RubricCriteriaRepo;

impl RubricCriteriaRepo {
    /// List the criteria of one evaluation, ordered by index.
    pub async fn list(
        pool: &PgPool,
        proposal_id: DbId,
        evaluation_id: DbId,
    ) -> Result<Vec<RubricCriteria>, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::list_inner(&mut conn, proposal_id, evaluation_id).await
    }

    /// List every criteria of a proposal, across its rubric steps.
    pub async fn list_by_proposal(
        pool: &PgPool,
        proposal_id: DbId,
    ) -> Result<Vec<RubricCriteria>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM proposal_rubric_criteria \
             WHERE proposal_id = $1 ORDER BY evaluation_id, index"
        );
        sqlx::query_as::<_, RubricCriteria>(&query)
            .bind(proposal_id)
            .fetch_all(pool)
            .await
    }

    /// Apply a reconciliation plan and return the resulting set.
    pub async fn replace(
        pool: &PgPool,
        proposal_id: DbId,
        evaluation_id: DbId,
        plan: &CriteriaPlan,
    ) -> Result<Vec<RubricCriteria>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        if !plan.delete.is_empty() {
            sqlx::query(
                "DELETE FROM proposal_rubric_criteria \
                 WHERE evaluation_id = $1 AND proposal_id = $2 AND id = ANY($3)",
            )
            .bind(evaluation_id)
            .bind(proposal_id)
            .bind(&plan.delete)
            .execute(&mut *tx)
            .await?;
        }

        for write in &plan.writes {
            let query = if write.existing {
                "UPDATE proposal_rubric_criteria SET \
                    index = $4, title = $5, description = $6, criteria_type = $7, parameters = $8 \
                 WHERE id = $1 AND proposal_id = $2 AND evaluation_id = $3"
            } else {
                "INSERT INTO proposal_rubric_criteria \
                    (id, proposal_id, evaluation_id, index, title, description, criteria_type, parameters) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
            };
            sqlx::query(query)
                .bind(write.id)
                .bind(proposal_id)
                .bind(evaluation_id)
                .bind(write.index)
                .bind(&write.title)
                .bind(&write.description)
                .bind(CRITERIA_TYPE_RANGE)
                .bind(write.parameters.to_json())
                .execute(&mut *tx)
                .await?;
        }

        let criteria = Self::list_inner(&mut tx, proposal_id, evaluation_id).await?;
        tx.commit().await?;
        Ok(criteria)
    }

    async fn list_inner(
        conn: &mut PgConnection,
        proposal_id: DbId,
        evaluation_id: DbId,
    ) -> Result<Vec<RubricCriteria>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM proposal_rubric_criteria \
             WHERE proposal_id = $1 AND evaluation_id = $2 \
             ORDER BY index"
        );
        sqlx::query_as::<_, RubricCriteria>(&query)
            .bind(proposal_id)
            .bind(evaluation_id)
            .fetch_all(conn)
            .await
    }
}
