//! Route definitions for the `/proposals` resource.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::{evaluation, proposal, rubric};
use crate::state::AppState;

/// Routes mounted at `/proposals`.
///
/// ```text
/// POST   /                                               -> create_proposal
/// GET    /{id}                                           -> get_proposal
/// POST   /{id}/publish                                   -> publish_proposal
/// POST   /{id}/archive                                   -> archive_proposal
/// POST   /{id}/rewards                                   -> publish_rewards
/// POST   /{id}/evaluations                               -> add_evaluation
/// POST   /{id}/evaluations/{eid}/submit-result           -> submit_result
/// PUT    /{id}/evaluations/{eid}/required-reviews        -> update_required_reviews
/// POST   /{id}/evaluations/{eid}/appeal                  -> appeal
/// POST   /{id}/evaluations/{eid}/appeal/submit-result    -> submit_appeal_result
/// PUT    /{id}/evaluations/{eid}/rubric-criteria         -> upsert_criteria
/// PUT    /{id}/evaluations/{eid}/rubric-answers          -> upsert_answers
/// PUT    /{id}/evaluations/{eid}/rubric-answers/draft    -> upsert_draft_answers
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(proposal::create_proposal))
        .route("/{id}", get(proposal::get_proposal))
        .route("/{id}/publish", post(proposal::publish_proposal))
        .route("/{id}/archive", post(proposal::archive_proposal))
        .route("/{id}/rewards", post(proposal::publish_rewards))
        .route("/{id}/evaluations", post(proposal::add_evaluation))
        .route(
            "/{id}/evaluations/{evaluation_id}/submit-result",
            post(evaluation::submit_result),
        )
        .route(
            "/{id}/evaluations/{evaluation_id}/required-reviews",
            put(evaluation::update_required_reviews),
        )
        .route(
            "/{id}/evaluations/{evaluation_id}/appeal",
            post(evaluation::appeal),
        )
        .route(
            "/{id}/evaluations/{evaluation_id}/appeal/submit-result",
            post(evaluation::submit_appeal_result),
        )
        .route(
            "/{id}/evaluations/{evaluation_id}/rubric-criteria",
            put(rubric::upsert_criteria),
        )
        .route(
            "/{id}/evaluations/{evaluation_id}/rubric-answers",
            put(rubric::upsert_answers),
        )
        .route(
            "/{id}/evaluations/{evaluation_id}/rubric-answers/draft",
            put(rubric::upsert_draft_answers),
        )
}
