//! Evaluation sequence model.
//!
//! Proposals move through an ordered list of evaluation steps. This module
//! defines the step types, results and proposal lifecycle states, plus the
//! [`EvaluationStep`] view the resolver and aggregator work from.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Define a string-backed enum with `as_str`, `parse` and `Display`.
///
/// The string forms match the TEXT values stored in the database and the
/// snake_case names used on the wire.
macro_rules! define_text_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($label:literal) {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize,
        )]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$( $name::$variant ),+];

            /// Return the stored string form.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $val ),+
                }
            }

            /// Parse the stored string form.
            pub fn parse(value: &str) -> Result<Self, $crate::error::CoreError> {
                match value {
                    $( $val => Ok(Self::$variant), )+
                    other => Err($crate::error::CoreError::InvalidInput(format!(
                        "Invalid {} '{other}'. Must be one of: {}",
                        $label,
                        [$( $val ),+].join(", ")
                    ))),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use define_text_enum;

define_text_enum! {
    /// The kind of review a step performs.
    EvaluationType ("evaluation type") {
        Feedback = "feedback",
        PassFail = "pass_fail",
        Rubric = "rubric",
        Vote = "vote",
    }
}

define_text_enum! {
    /// Outcome of a decided step or of a single review.
    EvaluationResult ("evaluation result") {
        Pass = "pass",
        Fail = "fail",
    }
}

define_text_enum! {
    /// Proposal lifecycle state.
    ProposalStatus ("proposal status") {
        Draft = "draft",
        Published = "published",
        Archived = "archived",
    }
}

impl EvaluationType {
    /// Whether the step result is decided by counting reviewer submissions.
    ///
    /// Other step types take the submitted result as the step result.
    pub fn counts_reviews(self) -> bool {
        matches!(self, Self::PassFail)
    }

    /// Whether a failing result declines the proposal.
    ///
    /// Feedback steps only collect comments; moving on always counts as passing.
    pub fn can_decline(self) -> bool {
        !matches!(self, Self::Feedback)
    }
}

/// The resolver's view of one evaluation row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationStep {
    pub id: DbId,
    pub index: i32,
    pub title: String,
    pub evaluation_type: EvaluationType,
    pub result: Option<EvaluationResult>,
    pub required_reviews: i32,
    pub final_step: Option<bool>,
    pub appealed_at: Option<Timestamp>,
    pub due_date: Option<Timestamp>,
}

impl EvaluationStep {
    /// True when the step has been explicitly marked as the last evaluable step.
    pub fn is_final_step(&self) -> bool {
        self.final_step == Some(true)
    }

    /// True while the step has no result, including after an appeal reset it.
    pub fn is_undecided(&self) -> bool {
        self.result.is_none()
    }
}

/// Validate that evaluation indices are contiguous from zero once sorted.
pub fn validate_sequence(steps: &[EvaluationStep]) -> Result<(), CoreError> {
    let mut indices: Vec<i32> = steps.iter().map(|s| s.index).collect();
    indices.sort_unstable();
    for (expected, actual) in indices.iter().enumerate() {
        if *actual != expected as i32 {
            return Err(CoreError::InvalidInput(format!(
                "Evaluation indices must be contiguous from 0, found {actual} at position {expected}"
            )));
        }
    }
    Ok(())
}

/// Return the steps ordered by ascending index.
pub fn sorted_by_index(steps: &[EvaluationStep]) -> Vec<&EvaluationStep> {
    let mut sorted: Vec<&EvaluationStep> = steps.iter().collect();
    sorted.sort_by_key(|s| s.index);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn step(index: i32) -> EvaluationStep {
        EvaluationStep {
            id: DbId::new_v4(),
            index,
            title: format!("Step {index}"),
            evaluation_type: EvaluationType::PassFail,
            result: None,
            required_reviews: 1,
            final_step: None,
            appealed_at: None,
            due_date: None,
        }
    }

    #[test]
    fn evaluation_type_round_trips_through_text() {
        for kind in EvaluationType::ALL {
            assert_eq!(EvaluationType::parse(kind.as_str()).unwrap(), *kind);
        }
    }

    #[test]
    fn unknown_type_is_invalid_input() {
        let err = EvaluationType::parse("poll").unwrap_err();
        assert_matches!(err, CoreError::InvalidInput(msg) if msg.contains("pass_fail"));
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&EvaluationType::PassFail).unwrap();
        assert_eq!(json, "\"pass_fail\"");
    }

    #[test]
    fn only_pass_fail_counts_reviews() {
        assert!(EvaluationType::PassFail.counts_reviews());
        assert!(!EvaluationType::Rubric.counts_reviews());
        assert!(!EvaluationType::Feedback.counts_reviews());
        assert!(!EvaluationType::Vote.counts_reviews());
    }

    #[test]
    fn feedback_cannot_decline() {
        assert!(!EvaluationType::Feedback.can_decline());
        assert!(EvaluationType::Vote.can_decline());
    }

    #[test]
    fn contiguous_sequence_is_valid_in_any_order() {
        let steps = vec![step(2), step(0), step(1)];
        assert!(validate_sequence(&steps).is_ok());
    }

    #[test]
    fn gap_in_sequence_is_rejected() {
        let steps = vec![step(0), step(2)];
        assert!(validate_sequence(&steps).is_err());
    }

    #[test]
    fn sorted_by_index_orders_ascending() {
        let steps = vec![step(1), step(0)];
        let sorted = sorted_by_index(&steps);
        assert_eq!(sorted[0].index, 0);
        assert_eq!(sorted[1].index, 1);
    }
}
