//! Repository for evaluation steps and their reviews.
//!
//! Every method that may decide a step locks the evaluation row with
//! `SELECT ... FOR UPDATE` first, then inserts and recounts inside the same
//! transaction. Two reviewers submitting at once therefore serialise on the
//! row and the second one sees the first one's review.

use charm_core::aggregation::appeal_required_reviews;
use charm_core::evaluation::EvaluationResult;
use charm_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::decision::tally;
use crate::models::evaluation::{
    CreateEvaluation, EvaluationReview, NewReview, ProposalEvaluation, ReviewOutcome,
};

/// Column list for `proposal_evaluations` queries.
const COLUMNS: &str = "id, proposal_id, index, evaluation_type, title, result, required_reviews, \
    final_step, appealable, appeal_required_reviews, appealed_at, appealed_by, appeal_reason, \
    decided_by, completed_at, declined_at, due_date, vote_settings, snapshot_proposal_id, created_at";

/// Column list for both review tables.
const REVIEW_COLUMNS: &str = "id, evaluation_id, reviewer_id, result, decline_reasons, completed_at";

/// Which review table a write goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewTable {
    Reviews,
    AppealReviews,
}

impl ReviewTable {
    fn name(self) -> &'static str {
        match self {
            Self::Reviews => "proposal_evaluation_reviews",
            Self::AppealReviews => "proposal_evaluation_appeal_reviews",
        }
    }
}

pub struct EvaluationRepo;

impl EvaluationRepo {
    /// Append a step after the proposal's last one.
    pub async fn create(
        pool: &PgPool,
        proposal_id: DbId,
        input: &CreateEvaluation,
    ) -> Result<ProposalEvaluation, sqlx::Error> {
        let query = format!(
            "INSERT INTO proposal_evaluations \
                (id, proposal_id, index, evaluation_type, title, required_reviews, final_step, \
                 appealable, appeal_required_reviews, due_date, vote_settings) \
             VALUES ($1, $2, \
                 (SELECT COALESCE(MAX(index) + 1, 0) FROM proposal_evaluations WHERE proposal_id = $2), \
                 $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ProposalEvaluation>(&query)
            .bind(DbId::new_v4())
            .bind(proposal_id)
            .bind(input.evaluation_type.as_str())
            .bind(&input.title)
            .bind(input.required_reviews)
            .bind(input.final_step)
            .bind(input.appealable)
            .bind(input.appeal_required_reviews)
            .bind(input.due_date)
            .bind(&input.vote_settings)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<ProposalEvaluation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM proposal_evaluations WHERE id = $1");
        sqlx::query_as::<_, ProposalEvaluation>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List a proposal's steps ordered by index.
    pub async fn list_by_proposal(
        pool: &PgPool,
        proposal_id: DbId,
    ) -> Result<Vec<ProposalEvaluation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM proposal_evaluations WHERE proposal_id = $1 ORDER BY index"
        );
        sqlx::query_as::<_, ProposalEvaluation>(&query)
            .bind(proposal_id)
            .fetch_all(pool)
            .await
    }

    pub async fn list_reviews(
        pool: &PgPool,
        table: ReviewTable,
        evaluation_id: DbId,
    ) -> Result<Vec<EvaluationReview>, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::list_reviews_inner(&mut conn, table, evaluation_id).await
    }

    /// Record a pass/fail review and decide the step once enough are in.
    ///
    /// A reviewer submitting again replaces their earlier review.
    pub async fn record_review(
        pool: &PgPool,
        evaluation_id: DbId,
        review: &NewReview,
    ) -> Result<ReviewOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let evaluation = Self::lock(&mut tx, evaluation_id).await?;

        if evaluation.result.is_some() {
            return Ok(ReviewOutcome::AlreadyDecided { evaluation });
        }

        Self::upsert_review(&mut tx, ReviewTable::Reviews, evaluation_id, review).await?;
        let reviews = Self::list_reviews_inner(&mut tx, ReviewTable::Reviews, evaluation_id).await?;
        let counts = tally(&reviews)?;

        let outcome = match counts.decide(evaluation.required_reviews) {
            Some(result) => {
                let evaluation =
                    Self::write_decision(&mut tx, evaluation_id, result, Some(review.reviewer_id))
                        .await?;
                ReviewOutcome::Decided { evaluation }
            }
            None => ReviewOutcome::Pending {
                evaluation,
                reviews: counts.total(),
            },
        };

        tx.commit().await?;
        Ok(outcome)
    }

    /// Record an appeal review and decide the appeal once enough are in.
    pub async fn record_appeal_review(
        pool: &PgPool,
        evaluation_id: DbId,
        review: &NewReview,
    ) -> Result<ReviewOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let evaluation = Self::lock(&mut tx, evaluation_id).await?;
        let required = appeal_required_reviews(evaluation.appeal_required_reviews);

        let existing =
            Self::list_reviews_inner(&mut tx, ReviewTable::AppealReviews, evaluation_id).await?;
        let already_passed = evaluation.result.as_deref() == Some(EvaluationResult::Pass.as_str());
        if already_passed || tally(&existing)?.decide(required).is_some() {
            return Ok(ReviewOutcome::AlreadyDecided { evaluation });
        }

        Self::upsert_review(&mut tx, ReviewTable::AppealReviews, evaluation_id, review).await?;
        let reviews =
            Self::list_reviews_inner(&mut tx, ReviewTable::AppealReviews, evaluation_id).await?;
        let counts = tally(&reviews)?;

        let outcome = match counts.decide(required) {
            Some(result) => {
                let evaluation =
                    Self::write_decision(&mut tx, evaluation_id, result, Some(review.reviewer_id))
                        .await?;
                ReviewOutcome::Decided { evaluation }
            }
            None => ReviewOutcome::Pending {
                evaluation,
                reviews: counts.total(),
            },
        };

        tx.commit().await?;
        Ok(outcome)
    }

    /// Set the result of a step decided by a single submission.
    pub async fn decide(
        pool: &PgPool,
        evaluation_id: DbId,
        result: EvaluationResult,
        decided_by: DbId,
    ) -> Result<ReviewOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let evaluation = Self::lock(&mut tx, evaluation_id).await?;
        if evaluation.result.is_some() {
            return Ok(ReviewOutcome::AlreadyDecided { evaluation });
        }
        let evaluation = Self::write_decision(&mut tx, evaluation_id, result, Some(decided_by)).await?;
        tx.commit().await?;
        Ok(ReviewOutcome::Decided { evaluation })
    }

    /// Recount stored reviews and write the result if the threshold is met.
    ///
    /// Returns the updated row when a decision was written.
    pub async fn recompute_result(
        pool: &PgPool,
        evaluation_id: DbId,
    ) -> Result<Option<ProposalEvaluation>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let evaluation = Self::lock(&mut tx, evaluation_id).await?;
        if evaluation.result.is_some() {
            return Ok(None);
        }

        let reviews = Self::list_reviews_inner(&mut tx, ReviewTable::Reviews, evaluation_id).await?;
        let Some(result) = tally(&reviews)?.decide(evaluation.required_reviews) else {
            return Ok(None);
        };
        let last_reviewer = reviews
            .iter()
            .max_by_key(|r| r.completed_at)
            .map(|r| r.reviewer_id);
        let evaluation = Self::write_decision(&mut tx, evaluation_id, result, last_reviewer).await?;

        tx.commit().await?;
        Ok(Some(evaluation))
    }

    pub async fn set_required_reviews(
        pool: &PgPool,
        evaluation_id: DbId,
        required_reviews: i32,
    ) -> Result<ProposalEvaluation, sqlx::Error> {
        let query = format!(
            "UPDATE proposal_evaluations SET required_reviews = $2 WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ProposalEvaluation>(&query)
            .bind(evaluation_id)
            .bind(required_reviews)
            .fetch_one(pool)
            .await
    }

    /// File an appeal: reset a declined step and record who appealed and why.
    ///
    /// Returns `None` when the step is no longer declined or was appealed before.
    pub async fn appeal(
        pool: &PgPool,
        evaluation_id: DbId,
        appealed_by: DbId,
        reason: Option<&str>,
    ) -> Result<Option<ProposalEvaluation>, sqlx::Error> {
        let query = format!(
            "UPDATE proposal_evaluations SET \
                result = NULL, decided_by = NULL, completed_at = NULL, declined_at = NULL, \
                appealed_at = NOW(), appealed_by = $2, appeal_reason = $3 \
             WHERE id = $1 AND result = 'fail' AND appealed_at IS NULL \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ProposalEvaluation>(&query)
            .bind(evaluation_id)
            .bind(appealed_by)
            .bind(reason)
            .fetch_optional(pool)
            .await
    }

    // -----------------------------------------------------------------------
    // Transaction helpers
    // -----------------------------------------------------------------------

    async fn lock(
        conn: &mut PgConnection,
        evaluation_id: DbId,
    ) -> Result<ProposalEvaluation, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM proposal_evaluations WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, ProposalEvaluation>(&query)
            .bind(evaluation_id)
            .fetch_one(conn)
            .await
    }

    async fn upsert_review(
        conn: &mut PgConnection,
        table: ReviewTable,
        evaluation_id: DbId,
        review: &NewReview,
    ) -> Result<(), sqlx::Error> {
        let query = format!(
            "INSERT INTO {} (id, evaluation_id, reviewer_id, result, decline_reasons) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (evaluation_id, reviewer_id) DO UPDATE SET \
                result = EXCLUDED.result, \
                decline_reasons = EXCLUDED.decline_reasons, \
                completed_at = NOW()",
            table.name()
        );
        sqlx::query(&query)
            .bind(DbId::new_v4())
            .bind(evaluation_id)
            .bind(review.reviewer_id)
            .bind(review.result.as_str())
            .bind(&review.decline_reasons)
            .execute(conn)
            .await?;
        Ok(())
    }

    async fn list_reviews_inner(
        conn: &mut PgConnection,
        table: ReviewTable,
        evaluation_id: DbId,
    ) -> Result<Vec<EvaluationReview>, sqlx::Error> {
        let query = format!(
            "SELECT {REVIEW_COLUMNS} FROM {} WHERE evaluation_id = $1 ORDER BY completed_at",
            table.name()
        );
        sqlx::query_as::<_, EvaluationReview>(&query)
            .bind(evaluation_id)
            .fetch_all(conn)
            .await
    }

    async fn write_decision(
        conn: &mut PgConnection,
        evaluation_id: DbId,
        result: EvaluationResult,
        decided_by: Option<DbId>,
    ) -> Result<ProposalEvaluation, sqlx::Error> {
        let query = format!(
            "UPDATE proposal_evaluations SET \
                result = $2, \
                decided_by = $3, \
                completed_at = NOW(), \
                declined_at = CASE WHEN $2 = 'fail' THEN NOW() ELSE NULL END \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ProposalEvaluation>(&query)
            .bind(evaluation_id)
            .bind(result.as_str())
            .bind(decided_by)
            .fetch_one(conn)
            .await
    }
}
