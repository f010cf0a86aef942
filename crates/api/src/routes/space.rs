//! Route definitions for space-scoped proposal listings.

use axum::routing::get;
use axum::Router;

use crate::handlers::proposal;
use crate::state::AppState;

/// Routes mounted at `/spaces`.
///
/// ```text
/// GET    /{space_id}/proposals        -> list_proposals
/// GET    /{space_id}/proposal-cards   -> list_proposal_cards
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{space_id}/proposals", get(proposal::list_proposals))
        .route("/{space_id}/proposal-cards", get(proposal::list_proposal_cards))
}
