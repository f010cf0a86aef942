//! Evaluation step and review models.

use charm_core::error::CoreError;
use charm_core::evaluation::{EvaluationResult, EvaluationStep, EvaluationType};
use charm_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `proposal_evaluations` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProposalEvaluation {
    pub id: DbId,
    pub proposal_id: DbId,
    pub index: i32,
    pub evaluation_type: String,
    pub title: String,
    pub result: Option<String>,
    pub required_reviews: i32,
    pub final_step: Option<bool>,
    pub appealable: bool,
    pub appeal_required_reviews: Option<i32>,
    pub appealed_at: Option<Timestamp>,
    pub appealed_by: Option<DbId>,
    pub appeal_reason: Option<String>,
    pub decided_by: Option<DbId>,
    pub completed_at: Option<Timestamp>,
    pub declined_at: Option<Timestamp>,
    pub due_date: Option<Timestamp>,
    pub vote_settings: Option<serde_json::Value>,
    pub snapshot_proposal_id: Option<String>,
    pub created_at: Timestamp,
}

impl ProposalEvaluation {
    pub fn evaluation_type(&self) -> Result<EvaluationType, CoreError> {
        EvaluationType::parse(&self.evaluation_type)
    }

    pub fn result(&self) -> Result<Option<EvaluationResult>, CoreError> {
        self.result.as_deref().map(EvaluationResult::parse).transpose()
    }

    /// The resolver's view of this row.
    pub fn to_step(&self) -> Result<EvaluationStep, CoreError> {
        Ok(EvaluationStep {
            id: self.id,
            index: self.index,
            title: self.title.clone(),
            evaluation_type: self.evaluation_type()?,
            result: self.result()?,
            required_reviews: self.required_reviews,
            final_step: self.final_step,
            appealed_at: self.appealed_at,
            due_date: self.due_date,
        })
    }

    /// Whether an appeal has been filed against this step.
    pub fn is_appealed(&self) -> bool {
        self.appealed_at.is_some()
    }
}

/// Convert a proposal's rows into resolver steps.
pub fn to_steps(rows: &[ProposalEvaluation]) -> Result<Vec<EvaluationStep>, CoreError> {
    rows.iter().map(ProposalEvaluation::to_step).collect()
}

/// DTO for appending an evaluation step to a draft proposal.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEvaluation {
    pub title: String,
    pub evaluation_type: EvaluationType,
    pub required_reviews: i32,
    pub final_step: Option<bool>,
    pub appealable: bool,
    pub appeal_required_reviews: Option<i32>,
    pub due_date: Option<Timestamp>,
    pub vote_settings: Option<serde_json::Value>,
}

/// A row from `proposal_evaluation_reviews` or
/// `proposal_evaluation_appeal_reviews`; both tables share this shape.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EvaluationReview {
    pub id: DbId,
    pub evaluation_id: DbId,
    pub reviewer_id: DbId,
    pub result: String,
    pub decline_reasons: Vec<String>,
    pub completed_at: Timestamp,
}

impl EvaluationReview {
    pub fn result(&self) -> Result<EvaluationResult, CoreError> {
        EvaluationResult::parse(&self.result)
    }
}

/// A reviewer decision to record.
#[derive(Debug, Clone)]
pub struct NewReview {
    pub reviewer_id: DbId,
    pub result: EvaluationResult,
    pub decline_reasons: Vec<String>,
}

/// What happened to an evaluation after a review or decision was recorded.
#[derive(Debug, Clone)]
pub enum ReviewOutcome {
    /// Recorded; the step still needs more reviews.
    Pending {
        evaluation: ProposalEvaluation,
        reviews: i64,
    },
    /// Recorded, and the step is now decided.
    Decided { evaluation: ProposalEvaluation },
    /// The step was already decided when the lock was taken; nothing written.
    AlreadyDecided { evaluation: ProposalEvaluation },
}

impl ReviewOutcome {
    pub fn evaluation(&self) -> &ProposalEvaluation {
        match self {
            Self::Pending { evaluation, .. }
            | Self::Decided { evaluation }
            | Self::AlreadyDecided { evaluation } => evaluation,
        }
    }
}
