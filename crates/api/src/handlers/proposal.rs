//! Handlers for the `/proposals`, `/proposal-templates` and
//! `/spaces/{space_id}` resources.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use charm_core::evaluation::{EvaluationType, ProposalStatus};
use charm_core::types::{DbId, Timestamp};
use charm_db::models::evaluation::CreateEvaluation;
use charm_db::models::proposal::{CreateProposal, ProposalFilter};
use serde::Deserialize;
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::services::{cards, proposals};
use crate::state::AppState;

fn default_required_reviews() -> i32 {
    1
}

fn empty_fields() -> serde_json::Value {
    serde_json::json!({})
}

/// One evaluation step in a create or add-step request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateEvaluationRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(rename = "type")]
    pub evaluation_type: EvaluationType,
    #[serde(default = "default_required_reviews")]
    #[validate(range(min = 1))]
    pub required_reviews: i32,
    #[serde(default)]
    pub final_step: Option<bool>,
    #[serde(default)]
    pub appealable: bool,
    #[serde(default)]
    #[validate(range(min = 1))]
    pub appeal_required_reviews: Option<i32>,
    #[serde(default)]
    pub due_date: Option<Timestamp>,
    #[serde(default)]
    pub vote_settings: Option<serde_json::Value>,
}

impl From<CreateEvaluationRequest> for CreateEvaluation {
    fn from(input: CreateEvaluationRequest) -> Self {
        Self {
            title: input.title,
            evaluation_type: input.evaluation_type,
            required_reviews: input.required_reviews,
            final_step: input.final_step,
            appealable: input.appealable,
            appeal_required_reviews: input.appeal_required_reviews,
            due_date: input.due_date,
            vote_settings: input.vote_settings,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProposalRequest {
    pub space_id: DbId,
    #[validate(length(min = 1, max = 500))]
    pub title: String,
    /// The caller is always added as an author.
    #[serde(default)]
    pub authors: Vec<DbId>,
    #[serde(default)]
    pub is_template: bool,
    #[serde(default)]
    pub workflow_id: Option<DbId>,
    #[serde(default = "empty_fields")]
    pub fields: serde_json::Value,
    #[serde(default)]
    pub selected_credential_template_ids: Vec<String>,
    #[serde(default)]
    #[validate(nested)]
    pub evaluations: Vec<CreateEvaluationRequest>,
}

/// Query parameters for listing a space's proposals.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListProposalsQuery {
    pub status: Option<ProposalStatus>,
    #[serde(default)]
    pub include_templates: bool,
}

/// POST /api/v1/proposals
///
/// Create a draft proposal, optionally with its evaluation steps.
pub async fn create_proposal(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateProposalRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;

    let mut authors = input.authors;
    if !authors.contains(&auth.user_id) {
        authors.push(auth.user_id);
    }
    let create = CreateProposal {
        space_id: input.space_id,
        title: input.title,
        created_by: auth.user_id,
        authors,
        is_template: input.is_template,
        workflow_id: input.workflow_id,
        fields: input.fields,
        selected_credential_template_ids: input.selected_credential_template_ids,
    };
    let evaluations: Vec<CreateEvaluation> =
        input.evaluations.into_iter().map(Into::into).collect();

    let proposal =
        proposals::create_proposal(state.store.as_ref(), &state.event_bus, &create, &evaluations)
            .await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: proposal })))
}

/// GET /api/v1/spaces/{space_id}/proposals
pub async fn list_proposals(
    State(state): State<AppState>,
    Path(space_id): Path<DbId>,
    Query(params): Query<ListProposalsQuery>,
) -> AppResult<impl IntoResponse> {
    let filter = ProposalFilter {
        status: params.status,
        include_templates: params.include_templates,
    };
    let summaries = proposals::get_proposals(state.store.as_ref(), space_id, &filter).await?;
    Ok(Json(DataResponse { data: summaries }))
}

/// GET /api/v1/spaces/{space_id}/proposal-cards
pub async fn list_proposal_cards(
    State(state): State<AppState>,
    Path(space_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let cards = cards::list_proposal_cards(state.store.as_ref(), space_id).await?;
    Ok(Json(DataResponse { data: cards }))
}

/// GET /api/v1/proposals/{id}
pub async fn get_proposal(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let proposal = proposals::get_proposal(state.store.as_ref(), id, auth.user_id).await?;
    Ok(Json(DataResponse { data: proposal }))
}

/// GET /api/v1/proposal-templates/{id}
pub async fn get_proposal_template(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let template = proposals::get_proposal_template(state.store.as_ref(), id, auth.user_id).await?;
    Ok(Json(DataResponse { data: template }))
}

/// POST /api/v1/proposals/{id}/publish
///
/// Move a draft into review. Authors only.
pub async fn publish_proposal(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let proposal =
        proposals::publish_proposal(state.store.as_ref(), &state.event_bus, id, auth.user_id)
            .await?;
    Ok(Json(DataResponse { data: proposal }))
}

/// POST /api/v1/proposals/{id}/archive
pub async fn archive_proposal(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let summary =
        proposals::archive_proposal(state.store.as_ref(), &state.event_bus, id, auth.user_id)
            .await?;
    Ok(Json(DataResponse { data: summary }))
}

/// POST /api/v1/proposals/{id}/rewards
///
/// Publish the proposal's pending rewards once its workflow has passed.
pub async fn publish_rewards(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let rewards =
        proposals::publish_rewards(state.store.as_ref(), &state.event_bus, id, auth.user_id)
            .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: rewards })))
}

/// POST /api/v1/proposals/{id}/evaluations
///
/// Append an evaluation step to a draft.
pub async fn add_evaluation(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<CreateEvaluationRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let evaluation =
        proposals::add_evaluation(state.store.as_ref(), id, auth.user_id, &input.into()).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: evaluation })))
}
