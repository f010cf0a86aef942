//! Handlers for rubric criteria and answers.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use charm_core::rubric::{RubricAnswerInput, RubricCriteriaInput};
use charm_core::types::DbId;
use charm_db::models::rubric::{AnswerScope, RubricAnswer};
use serde::Deserialize;
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::services::rubric;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpsertCriteriaRequest {
    #[validate(length(max = 100))]
    pub rubric_criteria: Vec<RubricCriteriaInput>,
}

/// The full answer set of one reviewer; it replaces whatever was stored.
#[derive(Debug, Deserialize, Validate)]
pub struct UpsertAnswersRequest {
    #[validate(length(max = 100))]
    pub answers: Vec<RubricAnswerInput>,
}

/// PUT /api/v1/proposals/{id}/evaluations/{evaluation_id}/rubric-criteria
pub async fn upsert_criteria(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((id, evaluation_id)): Path<(DbId, DbId)>,
    Json(input): Json<UpsertCriteriaRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let criteria =
        rubric::upsert_rubric_criteria(state.store.as_ref(), id, evaluation_id, &input.rubric_criteria)
            .await?;

    tracing::info!(
        user_id = %auth.user_id,
        role = %auth.role,
        proposal_id = %id,
        evaluation_id = %evaluation_id,
        "Rubric criteria saved"
    );
    Ok(Json(DataResponse { data: criteria }))
}

/// PUT /api/v1/proposals/{id}/evaluations/{evaluation_id}/rubric-answers
pub async fn upsert_answers(
    auth: AuthUser,
    state: State<AppState>,
    path: Path<(DbId, DbId)>,
    input: Json<UpsertAnswersRequest>,
) -> AppResult<impl IntoResponse> {
    save_answers(auth, state, path, input, false).await
}

/// PUT /api/v1/proposals/{id}/evaluations/{evaluation_id}/rubric-answers/draft
pub async fn upsert_draft_answers(
    auth: AuthUser,
    state: State<AppState>,
    path: Path<(DbId, DbId)>,
    input: Json<UpsertAnswersRequest>,
) -> AppResult<impl IntoResponse> {
    save_answers(auth, state, path, input, true).await
}

async fn save_answers(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((id, evaluation_id)): Path<(DbId, DbId)>,
    Json(input): Json<UpsertAnswersRequest>,
    is_draft: bool,
) -> AppResult<Json<DataResponse<Vec<RubricAnswer>>>> {
    input.validate()?;
    let scope = AnswerScope {
        proposal_id: id,
        evaluation_id,
        user_id: auth.user_id,
    };
    let answers = rubric::upsert_rubric_answers(
        state.store.as_ref(),
        &state.event_bus,
        scope,
        &input.answers,
        is_draft,
    )
    .await?;
    Ok(Json(DataResponse { data: answers }))
}
