pub mod health;
pub mod proposal;
pub mod space;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /proposals                                              create (POST)
/// /proposals/{id}                                         get
/// /proposals/{id}/publish                                 publish (POST)
/// /proposals/{id}/archive                                 archive (POST)
/// /proposals/{id}/rewards                                 publish pending rewards (POST)
/// /proposals/{id}/evaluations                             add step to a draft (POST)
/// /proposals/{id}/evaluations/{eid}/submit-result         review (POST)
/// /proposals/{id}/evaluations/{eid}/required-reviews      threshold change (PUT)
/// /proposals/{id}/evaluations/{eid}/appeal                appeal (POST)
/// /proposals/{id}/evaluations/{eid}/appeal/submit-result  appeal review (POST)
/// /proposals/{id}/evaluations/{eid}/rubric-criteria       upsert criteria (PUT)
/// /proposals/{id}/evaluations/{eid}/rubric-answers        upsert answers (PUT)
/// /proposals/{id}/evaluations/{eid}/rubric-answers/draft  upsert draft answers (PUT)
///
/// /proposal-templates/{id}                                get template
///
/// /spaces/{space_id}/proposals                            list (?status, ?includeTemplates)
/// /spaces/{space_id}/proposal-cards                       board cards
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/proposals", proposal::router())
        .route(
            "/proposal-templates/{id}",
            get(handlers::proposal::get_proposal_template),
        )
        .nest("/spaces", space::router())
}
