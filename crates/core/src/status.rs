//! Step kinds, display results and the evaluation status table.
//!
//! [`ProposalStepKind`] is the one enum every step-dependent decision
//! matches on: real evaluation types plus the Draft, Rewards and Credentials
//! pseudo-steps.

use crate::evaluation::{define_text_enum, EvaluationResult, EvaluationType};

define_text_enum! {
    /// Kind of the step shown to users, real or synthetic.
    ProposalStepKind ("step") {
        Draft = "draft",
        Feedback = "feedback",
        PassFail = "pass_fail",
        Rubric = "rubric",
        Vote = "vote",
        Rewards = "rewards",
        Credentials = "credentials",
    }
}

define_text_enum! {
    /// Result of the displayed step.
    StepResult ("step result") {
        InProgress = "in_progress",
        Pass = "pass",
        Fail = "fail",
        Archived = "archived",
    }
}

define_text_enum! {
    /// Human-facing status derived from a step and its result.
    EvaluationStatus ("evaluation status") {
        Draft = "draft",
        InProgress = "in_progress",
        Passed = "passed",
        Declined = "declined",
        Unpublished = "unpublished",
        Published = "published",
        NotIssued = "not_issued",
        Issued = "issued",
        Archived = "archived",
    }
}

impl From<EvaluationType> for ProposalStepKind {
    fn from(value: EvaluationType) -> Self {
        match value {
            EvaluationType::Feedback => Self::Feedback,
            EvaluationType::PassFail => Self::PassFail,
            EvaluationType::Rubric => Self::Rubric,
            EvaluationType::Vote => Self::Vote,
        }
    }
}

impl From<Option<EvaluationResult>> for StepResult {
    fn from(value: Option<EvaluationResult>) -> Self {
        match value {
            None => Self::InProgress,
            Some(EvaluationResult::Pass) => Self::Pass,
            Some(EvaluationResult::Fail) => Self::Fail,
        }
    }
}

/// Map a step and its result to the status shown on proposal lists and cards.
///
/// An archived result wins over every step. Combinations with no meaning of
/// their own (a draft that "passed", rewards that "failed") report the
/// step's in-progress status.
pub fn get_proposal_evaluation_status(
    step: ProposalStepKind,
    result: StepResult,
) -> EvaluationStatus {
    use EvaluationStatus as S;

    if result == StepResult::Archived {
        return S::Archived;
    }

    match (step, result) {
        (ProposalStepKind::Draft, _) => S::Draft,

        (ProposalStepKind::Feedback, StepResult::InProgress) => S::InProgress,
        (ProposalStepKind::Feedback, _) => S::Passed,

        (
            ProposalStepKind::PassFail | ProposalStepKind::Rubric | ProposalStepKind::Vote,
            StepResult::Pass,
        ) => S::Passed,
        (
            ProposalStepKind::PassFail | ProposalStepKind::Rubric | ProposalStepKind::Vote,
            StepResult::Fail,
        ) => S::Declined,
        (ProposalStepKind::PassFail | ProposalStepKind::Rubric | ProposalStepKind::Vote, _) => {
            S::InProgress
        }

        (ProposalStepKind::Rewards, StepResult::Pass) => S::Published,
        (ProposalStepKind::Rewards, _) => S::Unpublished,

        (ProposalStepKind::Credentials, StepResult::Pass) => S::Issued,
        (ProposalStepKind::Credentials, _) => S::NotIssued,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rubric_in_progress_is_in_progress() {
        assert_eq!(
            get_proposal_evaluation_status(ProposalStepKind::Rubric, StepResult::InProgress),
            EvaluationStatus::InProgress
        );
    }

    #[test]
    fn rewards_pass_is_published() {
        assert_eq!(
            get_proposal_evaluation_status(ProposalStepKind::Rewards, StepResult::Pass),
            EvaluationStatus::Published
        );
    }

    #[test]
    fn archived_wins_for_every_step() {
        for step in ProposalStepKind::ALL {
            assert_eq!(
                get_proposal_evaluation_status(*step, StepResult::Archived),
                EvaluationStatus::Archived,
                "step {step} should report archived"
            );
        }
    }

    #[test]
    fn draft_is_draft() {
        assert_eq!(
            get_proposal_evaluation_status(ProposalStepKind::Draft, StepResult::InProgress),
            EvaluationStatus::Draft
        );
    }

    #[test]
    fn feedback_never_declines() {
        assert_eq!(
            get_proposal_evaluation_status(ProposalStepKind::Feedback, StepResult::Fail),
            EvaluationStatus::Passed
        );
        assert_eq!(
            get_proposal_evaluation_status(ProposalStepKind::Feedback, StepResult::Pass),
            EvaluationStatus::Passed
        );
    }

    #[test]
    fn reviewable_steps_decline_on_fail() {
        for step in [
            ProposalStepKind::PassFail,
            ProposalStepKind::Rubric,
            ProposalStepKind::Vote,
        ] {
            assert_eq!(
                get_proposal_evaluation_status(step, StepResult::Fail),
                EvaluationStatus::Declined
            );
            assert_eq!(
                get_proposal_evaluation_status(step, StepResult::Pass),
                EvaluationStatus::Passed
            );
            assert_eq!(
                get_proposal_evaluation_status(step, StepResult::InProgress),
                EvaluationStatus::InProgress
            );
        }
    }

    #[test]
    fn rewards_and_credentials_pending_states() {
        assert_eq!(
            get_proposal_evaluation_status(ProposalStepKind::Rewards, StepResult::InProgress),
            EvaluationStatus::Unpublished
        );
        assert_eq!(
            get_proposal_evaluation_status(ProposalStepKind::Credentials, StepResult::InProgress),
            EvaluationStatus::NotIssued
        );
        assert_eq!(
            get_proposal_evaluation_status(ProposalStepKind::Credentials, StepResult::Pass),
            EvaluationStatus::Issued
        );
    }

    #[test]
    fn step_kind_from_evaluation_type() {
        assert_eq!(
            ProposalStepKind::from(EvaluationType::PassFail),
            ProposalStepKind::PassFail
        );
        assert_eq!(ProposalStepKind::from(EvaluationType::Vote).as_str(), "vote");
    }

    #[test]
    fn step_result_from_optional_result() {
        assert_eq!(StepResult::from(None), StepResult::InProgress);
        assert_eq!(
            StepResult::from(Some(EvaluationResult::Fail)),
            StepResult::Fail
        );
    }
}
