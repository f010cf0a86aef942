//! Shared helpers for turning stored reviews into decisions.

use charm_core::aggregation::ReviewTally;
use charm_core::error::CoreError;

use crate::models::evaluation::EvaluationReview;

/// Surface a malformed stored value as a decode error.
pub fn decode_error(err: CoreError) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(err))
}

/// Count pass and fail reviews.
pub fn tally(reviews: &[EvaluationReview]) -> Result<ReviewTally, sqlx::Error> {
    let results = reviews
        .iter()
        .map(EvaluationReview::result)
        .collect::<Result<Vec<_>, _>>()
        .map_err(decode_error)?;
    Ok(ReviewTally::from_results(results))
}
