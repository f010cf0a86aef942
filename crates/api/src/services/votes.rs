//! Opening in-app votes when a vote step becomes current.

use charm_core::error::CoreError;
use charm_core::evaluation::EvaluationType;
use charm_core::types::DbId;
use charm_core::vote::VoteSettings;
use charm_db::models::evaluation::ProposalEvaluation;
use charm_db::models::proposal::Proposal;
use charm_db::models::vote::{CreateVote, Vote};
use charm_db::ProposalStore;
use charm_events::{event_types, EventBus};

use super::{evaluation_event, load_page, stored};
use crate::error::AppResult;

/// Create the vote for `evaluation` if it is a vote step that has none yet.
///
/// Returns the created vote. Non-vote steps, steps that already have a vote
/// and Snapshot-strategy steps return `None`.
pub async fn create_vote_if_necessary(
    store: &dyn ProposalStore,
    bus: &EventBus,
    proposal: &Proposal,
    evaluation: &ProposalEvaluation,
    created_by: DbId,
) -> AppResult<Option<Vote>> {
    if stored(evaluation.evaluation_type())? != EvaluationType::Vote {
        return Ok(None);
    }
    if store.find_vote_for_evaluation(evaluation.id).await?.is_some() {
        return Ok(None);
    }

    let raw = evaluation.vote_settings.as_ref().ok_or_else(|| {
        CoreError::InvalidInput(format!(
            "Vote step \"{}\" has no vote settings",
            evaluation.title
        ))
    })?;
    let settings = VoteSettings::from_json(raw)?;
    settings.validate()?;
    if !settings.creates_in_app_vote() {
        tracing::debug!(
            evaluation_id = %evaluation.id,
            "Vote step uses an external strategy, no in-app vote created"
        );
        return Ok(None);
    }

    let page = load_page(store, proposal.id).await?;
    let vote = store
        .create_vote(&CreateVote {
            proposal_id: proposal.id,
            evaluation_id: evaluation.id,
            space_id: proposal.space_id,
            title: page.title,
            vote_type: settings.vote_type.as_str().to_string(),
            options: settings.options.clone(),
            threshold: settings.threshold,
            max_choices: settings.max_choices,
            deadline: settings.deadline(chrono::Utc::now()),
            created_by,
        })
        .await?;

    tracing::info!(
        proposal_id = %proposal.id,
        evaluation_id = %evaluation.id,
        vote_id = %vote.id,
        deadline = %vote.deadline,
        "Vote created"
    );
    bus.publish(
        evaluation_event(event_types::VOTE_CREATED, evaluation, created_by)
            .with_payload(serde_json::json!({
                "proposal_id": proposal.id,
                "vote_id": vote.id,
                "deadline": vote.deadline,
            })),
    );

    Ok(Some(vote))
}
