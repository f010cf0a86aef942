//! Current-step resolution.
//!
//! Given a proposal's evaluations and lifecycle status, decide which step is
//! active and describe it for display. The resolver is pure: the rewards and
//! credentials flags come from [`crate::projection::ProposalProjection`].

use serde::Serialize;

use crate::evaluation::{sorted_by_index, EvaluationResult, EvaluationStep, ProposalStatus};
use crate::status::{ProposalStepKind, StepResult};
use crate::types::{DbId, Timestamp};

/// Title of the synthetic step shown before publishing.
pub const DRAFT_STEP_TITLE: &str = "Draft";

/// Title of the synthetic step shown once the workflow passed with rewards attached.
pub const REWARDS_STEP_TITLE: &str = "Rewards";

/// Title of the synthetic step shown once the workflow passed with credentials enabled.
pub const CREDENTIALS_STEP_TITLE: &str = "Credentials";

/// Aggregate facts about rewards and credentials the resolver cannot see.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StepFlags {
    pub has_pending_rewards: bool,
    pub has_published_rewards: bool,
    pub credentials_enabled: bool,
    pub has_pending_credentials: bool,
}

impl StepFlags {
    fn has_rewards(&self) -> bool {
        self.has_pending_rewards || self.has_published_rewards
    }

    /// Published rewards give way to Credentials once credentials are enabled.
    fn shows_rewards(&self) -> bool {
        self.has_pending_rewards || (self.has_published_rewards && !self.credentials_enabled)
    }
}

/// The computed, never-persisted view of a proposal's current step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposalStep {
    pub title: String,
    pub step: ProposalStepKind,
    pub result: StepResult,
    /// `None` for pseudo-steps.
    pub id: Option<DbId>,
    /// 1-based position for display; 0 for the draft step.
    pub index: i32,
    pub required_reviews: i32,
    pub final_step: Option<bool>,
    pub appealed_at: Option<Timestamp>,
    pub due_date: Option<Timestamp>,
}

impl ProposalStep {
    fn pseudo(title: &str, step: ProposalStepKind, result: StepResult, index: i32) -> Self {
        Self {
            title: title.to_string(),
            step,
            result,
            id: None,
            index,
            required_reviews: 1,
            final_step: None,
            appealed_at: None,
            due_date: None,
        }
    }

    /// The step every draft (or evaluation-less) proposal sits on.
    pub fn draft() -> Self {
        Self::pseudo(
            DRAFT_STEP_TITLE,
            ProposalStepKind::Draft,
            StepResult::InProgress,
            0,
        )
    }

    fn from_evaluation(evaluation: &EvaluationStep) -> Self {
        Self {
            title: evaluation.title.clone(),
            step: evaluation.evaluation_type.into(),
            result: evaluation.result.into(),
            id: Some(evaluation.id),
            index: evaluation.index + 1,
            required_reviews: evaluation.required_reviews,
            final_step: evaluation.final_step,
            appealed_at: evaluation.appealed_at,
            due_date: evaluation.due_date,
        }
    }
}

/// Find the evaluation the workflow is currently sitting on.
///
/// Walking by ascending index, the first evaluation that is undecided
/// (including one reset by a pending appeal), declined, or a passed final
/// step stops the walk. When every evaluation passed, the last one is
/// current. The earliest stopping evaluation always wins, so a pending
/// appeal on an earlier step takes precedence over a later final step.
pub fn get_current_evaluation(evaluations: &[EvaluationStep]) -> Option<&EvaluationStep> {
    let sorted = sorted_by_index(evaluations);
    sorted
        .iter()
        .copied()
        .find(|e| match e.result {
            None => true,
            Some(EvaluationResult::Fail) => true,
            Some(EvaluationResult::Pass) => e.is_final_step(),
        })
        .or_else(|| sorted.last().copied())
}

/// True when `current` passed and nothing after it will be evaluated.
fn workflow_completed(evaluations: &[EvaluationStep], current: &EvaluationStep) -> bool {
    if current.result != Some(EvaluationResult::Pass) {
        return false;
    }
    let is_last = evaluations.iter().all(|e| e.index <= current.index);
    is_last || current.is_final_step()
}

/// Resolve the step to display for a proposal.
///
/// Pending rewards take priority over Credentials; published rewards only
/// show while credentials are disabled. Either pseudo-step replaces the
/// completed evaluation it follows, and Credentials sits after Rewards.
pub fn get_current_step(
    evaluations: &[EvaluationStep],
    proposal_status: ProposalStatus,
    flags: StepFlags,
) -> ProposalStep {
    if proposal_status == ProposalStatus::Draft {
        return ProposalStep::draft();
    }

    let Some(current) = get_current_evaluation(evaluations) else {
        return ProposalStep::draft();
    };

    let total = evaluations.len() as i32;

    if workflow_completed(evaluations, current) {
        if flags.shows_rewards() {
            let result = if flags.has_published_rewards {
                StepResult::Pass
            } else {
                StepResult::InProgress
            };
            return ProposalStep::pseudo(
                REWARDS_STEP_TITLE,
                ProposalStepKind::Rewards,
                result,
                total + 1,
            );
        }

        if flags.credentials_enabled {
            let result = if flags.has_pending_credentials {
                StepResult::InProgress
            } else {
                StepResult::Pass
            };
            let offset = if flags.has_rewards() { 2 } else { 1 };
            return ProposalStep::pseudo(
                CREDENTIALS_STEP_TITLE,
                ProposalStepKind::Credentials,
                result,
                total + offset,
            );
        }
    }

    ProposalStep::from_evaluation(current)
}
