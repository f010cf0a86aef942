//! Proposal operations, written against [`ProposalStore`] and [`EventBus`].
//!
//! Handlers parse and authenticate, then call into these modules. Every
//! operation validates before its first write; the writes that must be
//! atomic happen inside a single store call.

pub mod cards;
pub mod evaluations;
pub mod proposals;
pub mod rubric;
pub mod votes;

use charm_core::error::CoreError;
use charm_core::evaluation::{EvaluationStep, ProposalStatus};
use charm_core::projection::ProposalProjection;
use charm_core::types::DbId;
use charm_db::models::evaluation::{to_steps, ProposalEvaluation};
use charm_db::models::proposal::{Page, Proposal};
use charm_db::ProposalStore;
use charm_events::bus::{ENTITY_EVALUATION, ENTITY_PROPOSAL};
use charm_events::PlatformEvent;

use crate::error::AppResult;

/// Treat a row that fails to decode into domain types as an internal fault.
pub(crate) fn stored<T>(result: Result<T, CoreError>) -> AppResult<T> {
    result.map_err(|e| CoreError::Internal(format!("Malformed stored value: {e}")).into())
}

pub(crate) async fn load_proposal(store: &dyn ProposalStore, id: DbId) -> AppResult<Proposal> {
    store.find_proposal(id).await?.ok_or_else(|| {
        CoreError::NotFound {
            entity: "Proposal",
            id,
        }
        .into()
    })
}

pub(crate) async fn load_page(store: &dyn ProposalStore, id: DbId) -> AppResult<Page> {
    store
        .find_page(id)
        .await?
        .ok_or_else(|| CoreError::NotFound { entity: "Page", id }.into())
}

/// Load an evaluation and check it belongs to `proposal_id`.
pub(crate) async fn load_evaluation(
    store: &dyn ProposalStore,
    proposal_id: DbId,
    evaluation_id: DbId,
) -> AppResult<ProposalEvaluation> {
    let evaluation = store
        .find_evaluation(evaluation_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "ProposalEvaluation",
            id: evaluation_id,
        })?;
    if evaluation.proposal_id != proposal_id {
        return Err(CoreError::InsecureOperation(format!(
            "Evaluation {evaluation_id} does not belong to proposal {proposal_id}"
        ))
        .into());
    }
    Ok(evaluation)
}

/// The proposal's evaluation rows (ordered by index) and their resolver view.
pub(crate) async fn load_steps(
    store: &dyn ProposalStore,
    proposal_id: DbId,
) -> AppResult<(Vec<ProposalEvaluation>, Vec<EvaluationStep>)> {
    let rows = store.list_evaluations(proposal_id).await?;
    let steps = stored(to_steps(&rows))?;
    Ok((rows, steps))
}

/// Gather rewards and credentials so the resolver can place pseudo-steps.
pub(crate) async fn load_projection(
    store: &dyn ProposalStore,
    proposal: &Proposal,
    steps: Vec<EvaluationStep>,
) -> AppResult<ProposalProjection> {
    let status = stored(proposal.status())?;
    let rewards = store.list_rewards(proposal.id).await?;
    let issued = store.list_issued_credentials(proposal.id).await?;

    Ok(ProposalProjection::new(status, steps)
        .with_pending_rewards(proposal.pending_rewards().len())
        .with_published_rewards(rewards.len())
        .with_selected_credentials(proposal.selected_credential_template_ids.clone())
        .with_issued_credentials(issued.into_iter().map(|c| c.credential_template_id)))
}

/// Reviews and appeals only happen on published proposals.
pub(crate) fn require_published(proposal: &Proposal) -> AppResult<()> {
    match stored(proposal.status())? {
        ProposalStatus::Published => Ok(()),
        status => Err(CoreError::UndesirableOperation(format!(
            "Proposal {} is {status}, not published",
            proposal.id
        ))
        .into()),
    }
}

pub(crate) fn require_author(proposal: &Proposal, user_id: DbId, action: &str) -> AppResult<()> {
    if proposal.is_author(user_id) {
        Ok(())
    } else {
        Err(CoreError::UnauthorisedAction(format!(
            "Only proposal authors can {action}"
        ))
        .into())
    }
}

pub(crate) fn proposal_event(event_type: &str, proposal_id: DbId, actor: DbId) -> PlatformEvent {
    PlatformEvent::new(event_type)
        .with_source(ENTITY_PROPOSAL, proposal_id)
        .with_actor(actor)
}

pub(crate) fn evaluation_event(
    event_type: &str,
    evaluation: &ProposalEvaluation,
    actor: DbId,
) -> PlatformEvent {
    PlatformEvent::new(event_type)
        .with_source(ENTITY_EVALUATION, evaluation.id)
        .with_actor(actor)
        .with_payload(serde_json::json!({
            "proposal_id": evaluation.proposal_id,
            "evaluation_type": evaluation.evaluation_type,
            "index": evaluation.index,
            "result": evaluation.result,
        }))
}
