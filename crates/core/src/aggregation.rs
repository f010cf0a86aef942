//! Review aggregation for pass/fail steps and appeals.
//!
//! A step is decided once it holds at least `required_reviews` reviews. The
//! decided result is the strict majority: ties fail.

use serde::Serialize;

use crate::error::CoreError;
use crate::evaluation::EvaluationResult;

/// Minimum number of reviews any step or appeal may require.
pub const MIN_REQUIRED_REVIEWS: i32 = 1;

/// Appeal threshold used when the step does not configure one.
pub const DEFAULT_APPEAL_REQUIRED_REVIEWS: i32 = 1;

/// Pass and fail counts over a set of reviews.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReviewTally {
    pub passed: i64,
    pub failed: i64,
}

impl ReviewTally {
    pub fn from_results<I>(results: I) -> Self
    where
        I: IntoIterator<Item = EvaluationResult>,
    {
        results
            .into_iter()
            .fold(Self::default(), |mut tally, result| {
                match result {
                    EvaluationResult::Pass => tally.passed += 1,
                    EvaluationResult::Fail => tally.failed += 1,
                }
                tally
            })
    }

    pub fn total(&self) -> i64 {
        self.passed + self.failed
    }

    /// Majority result; a tie fails.
    pub fn majority(&self) -> EvaluationResult {
        if self.passed > self.failed {
            EvaluationResult::Pass
        } else {
            EvaluationResult::Fail
        }
    }

    /// Return the decided result once `required` reviews are in, else `None`.
    pub fn decide(&self, required: i32) -> Option<EvaluationResult> {
        let required = i64::from(required.max(MIN_REQUIRED_REVIEWS));
        (self.total() >= required).then(|| self.majority())
    }
}

/// Validate a configured review threshold.
pub fn validate_required_reviews(value: i32) -> Result<(), CoreError> {
    if value < MIN_REQUIRED_REVIEWS {
        return Err(CoreError::InvalidInput(format!(
            "Required reviews must be at least {MIN_REQUIRED_REVIEWS}, got {value}"
        )));
    }
    Ok(())
}

/// Resolve the appeal threshold, falling back to the default.
pub fn appeal_required_reviews(configured: Option<i32>) -> i32 {
    configured
        .filter(|n| *n >= MIN_REQUIRED_REVIEWS)
        .unwrap_or(DEFAULT_APPEAL_REQUIRED_REVIEWS)
}

/// Result recorded for a step when a single submission decides it.
///
/// Feedback steps cannot decline, so they always pass.
pub fn direct_result(
    kind: crate::evaluation::EvaluationType,
    submitted: EvaluationResult,
) -> EvaluationResult {
    if kind.can_decline() {
        submitted
    } else {
        EvaluationResult::Pass
    }
}
