//! Handlers for reviewing, re-thresholding and appealing evaluation steps.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use charm_core::evaluation::EvaluationResult;
use charm_core::types::DbId;
use serde::Deserialize;
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::services::evaluations::{self, ResultSubmission};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResultRequest {
    pub result: EvaluationResult,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub decline_reasons: Vec<String>,
}

impl From<SubmitResultRequest> for ResultSubmission {
    fn from(input: SubmitResultRequest) -> Self {
        Self {
            result: input.result,
            decline_reasons: input.decline_reasons,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RequiredReviewsRequest {
    #[validate(range(min = 1))]
    pub required_reviews: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AppealRequest {
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub reason: Option<String>,
}

/// POST /api/v1/proposals/{id}/evaluations/{evaluation_id}/submit-result
pub async fn submit_result(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((id, evaluation_id)): Path<(DbId, DbId)>,
    Json(input): Json<SubmitResultRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let change = evaluations::submit_evaluation_result(
        state.store.as_ref(),
        &state.event_bus,
        id,
        evaluation_id,
        auth.user_id,
        &input.into(),
    )
    .await?;

    tracing::info!(
        user_id = %auth.user_id,
        role = %auth.role,
        proposal_id = %id,
        evaluation_id = %evaluation_id,
        decided = change.decided,
        "Evaluation result submitted"
    );
    Ok(Json(DataResponse { data: change }))
}

/// PUT /api/v1/proposals/{id}/evaluations/{evaluation_id}/required-reviews
///
/// Change the review threshold and decide the step if it is now met.
pub async fn update_required_reviews(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((id, evaluation_id)): Path<(DbId, DbId)>,
    Json(input): Json<RequiredReviewsRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let evaluation = evaluations::update_required_reviews(
        state.store.as_ref(),
        &state.event_bus,
        id,
        evaluation_id,
        auth.user_id,
        input.required_reviews,
    )
    .await?;
    Ok(Json(DataResponse { data: evaluation }))
}

/// POST /api/v1/proposals/{id}/evaluations/{evaluation_id}/appeal
pub async fn appeal(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((id, evaluation_id)): Path<(DbId, DbId)>,
    Json(input): Json<AppealRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let evaluation = evaluations::appeal_evaluation(
        state.store.as_ref(),
        &state.event_bus,
        id,
        evaluation_id,
        auth.user_id,
        input.reason.as_deref(),
    )
    .await?;
    Ok(Json(DataResponse { data: evaluation }))
}

/// POST /api/v1/proposals/{id}/evaluations/{evaluation_id}/appeal/submit-result
pub async fn submit_appeal_result(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((id, evaluation_id)): Path<(DbId, DbId)>,
    Json(input): Json<SubmitResultRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let change = evaluations::submit_evaluation_appeal_result(
        state.store.as_ref(),
        &state.event_bus,
        id,
        evaluation_id,
        auth.user_id,
        &input.into(),
    )
    .await?;

    tracing::info!(
        user_id = %auth.user_id,
        role = %auth.role,
        proposal_id = %id,
        evaluation_id = %evaluation_id,
        decided = change.decided,
        "Appeal result submitted"
    );
    Ok(Json(DataResponse { data: change }))
}
