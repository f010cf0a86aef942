//! Checks that gate publishing a draft proposal.

use crate::error::CoreError;
use crate::evaluation::{validate_sequence, EvaluationStep, EvaluationType, ProposalStatus};
use crate::vote::VoteSettings;

/// One evaluation step with the configuration publishing depends on.
#[derive(Debug, Clone)]
pub struct StepConfig<'a> {
    pub step: &'a EvaluationStep,
    pub criteria_count: usize,
    pub vote_settings: Option<&'a serde_json::Value>,
}

/// Validate that a proposal may leave draft.
pub fn validate_publish(status: ProposalStatus, steps: &[StepConfig<'_>]) -> Result<(), CoreError> {
    if status != ProposalStatus::Draft {
        return Err(CoreError::UndesirableOperation(format!(
            "Only draft proposals can be published, this one is {status}"
        )));
    }
    if steps.is_empty() {
        return Err(CoreError::InvalidInput(
            "Proposal must have at least one evaluation step".into(),
        ));
    }

    let evaluations: Vec<EvaluationStep> = steps.iter().map(|s| s.step.clone()).collect();
    validate_sequence(&evaluations)?;

    for config in steps {
        let step = config.step;
        if step.required_reviews < 1 {
            return Err(CoreError::InvalidInput(format!(
                "Step \"{}\" must require at least one review",
                step.title
            )));
        }
        match step.evaluation_type {
            EvaluationType::Rubric if config.criteria_count == 0 => {
                return Err(CoreError::InvalidInput(format!(
                    "Rubric step \"{}\" has no criteria",
                    step.title
                )));
            }
            EvaluationType::Vote => {
                let Some(raw) = config.vote_settings else {
                    return Err(CoreError::InvalidInput(format!(
                        "Vote step \"{}\" has no vote settings",
                        step.title
                    )));
                };
                VoteSettings::from_json(raw)?.validate()?;
            }
            _ => {}
        }
    }
    Ok(())
}

/// The evaluation directly after `index`, if any.
pub fn next_evaluation(evaluations: &[EvaluationStep], index: i32) -> Option<&EvaluationStep> {
    evaluations
        .iter()
        .filter(|e| e.index > index)
        .min_by_key(|e| e.index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DbId;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn step(index: i32, kind: EvaluationType) -> EvaluationStep {
        EvaluationStep {
            id: DbId::new_v4(),
            index,
            title: format!("{kind} {index}"),
            evaluation_type: kind,
            result: None,
            required_reviews: 1,
            final_step: None,
            appealed_at: None,
            due_date: None,
        }
    }

    fn config(step: &EvaluationStep) -> StepConfig<'_> {
        StepConfig {
            step,
            criteria_count: 0,
            vote_settings: None,
        }
    }

    #[test]
    fn feedback_only_proposal_publishes() {
        let s = step(0, EvaluationType::Feedback);
        assert!(validate_publish(ProposalStatus::Draft, &[config(&s)]).is_ok());
    }

    #[test]
    fn published_proposal_cannot_republish() {
        let s = step(0, EvaluationType::Feedback);
        assert_matches!(
            validate_publish(ProposalStatus::Published, &[config(&s)]),
            Err(CoreError::UndesirableOperation(_))
        );
    }

    #[test]
    fn no_steps_rejected() {
        assert_matches!(
            validate_publish(ProposalStatus::Draft, &[]),
            Err(CoreError::InvalidInput(_))
        );
    }

    #[test]
    fn rubric_needs_criteria() {
        let s = step(0, EvaluationType::Rubric);
        assert!(validate_publish(ProposalStatus::Draft, &[config(&s)]).is_err());
        let with_criteria = StepConfig { criteria_count: 2, ..config(&s) };
        assert!(validate_publish(ProposalStatus::Draft, &[with_criteria]).is_ok());
    }

    #[test]
    fn vote_needs_valid_settings() {
        let s = step(0, EvaluationType::Vote);
        assert!(validate_publish(ProposalStatus::Draft, &[config(&s)]).is_err());

        let settings = json!({
            "type": "Approval", "threshold": 50, "options": ["Yes", "No"],
            "maxChoices": 1, "durationDays": 5
        });
        let ok = StepConfig { vote_settings: Some(&settings), ..config(&s) };
        assert!(validate_publish(ProposalStatus::Draft, &[ok]).is_ok());
    }

    #[test]
    fn next_evaluation_skips_to_following_index() {
        let steps = vec![
            step(2, EvaluationType::Vote),
            step(0, EvaluationType::Feedback),
            step(1, EvaluationType::PassFail),
        ];
        assert_eq!(next_evaluation(&steps, 0).unwrap().index, 1);
        assert_eq!(next_evaluation(&steps, 1).unwrap().index, 2);
        assert!(next_evaluation(&steps, 2).is_none());
    }
}
