//! Board cards for proposals.

use charm_core::card::{map_proposal_to_card, CardSource, ProposalCard, RubricScores};
use charm_core::evaluation::EvaluationType;
use charm_core::types::DbId;
use charm_db::models::proposal::{Proposal, ProposalFilter};
use charm_db::models::rubric::RubricCriteria;
use charm_db::ProposalStore;

use super::{load_page, load_projection, load_proposal, load_steps, stored};
use crate::error::AppResult;

async fn card_for(store: &dyn ProposalStore, proposal: &Proposal) -> AppResult<ProposalCard> {
    let page = load_page(store, proposal.id).await?;
    let (rows, steps) = load_steps(store, proposal.id).await?;
    let resolved = load_projection(store, proposal, steps).await?.resolve();

    let criteria = store.list_proposal_rubric_criteria(proposal.id).await?;
    let answers = store.list_rubric_answers(proposal.id, None, false).await?;

    let mut rubrics = Vec::new();
    for evaluation in &rows {
        if stored(evaluation.evaluation_type())? != EvaluationType::Rubric {
            continue;
        }
        let mut own: Vec<&RubricCriteria> = criteria
            .iter()
            .filter(|c| c.evaluation_id == evaluation.id)
            .collect();
        own.sort_by_key(|c| c.index);
        let own = stored(
            own.into_iter()
                .map(RubricCriteria::to_criterion)
                .collect::<Result<Vec<_>, _>>(),
        )?;

        rubrics.push(RubricScores {
            evaluation_id: evaluation.id,
            title: evaluation.title.clone(),
            criteria: own,
            answers: answers
                .iter()
                .filter(|a| a.evaluation_id == evaluation.id)
                .filter_map(|a| a.to_scored())
                .collect(),
        });
    }

    Ok(map_proposal_to_card(&CardSource {
        proposal_id: proposal.id,
        title: &page.title,
        path: &page.path,
        status: stored(proposal.status())?,
        authors: &proposal.authors,
        current_step: &resolved.current_step,
        rubrics: &rubrics,
    }))
}

/// Map one proposal to its board card.
pub async fn get_proposal_card(
    store: &dyn ProposalStore,
    proposal_id: DbId,
) -> AppResult<ProposalCard> {
    let proposal = load_proposal(store, proposal_id).await?;
    card_for(store, &proposal).await
}

/// Cards for every non-template proposal in a space.
pub async fn list_proposal_cards(
    store: &dyn ProposalStore,
    space_id: DbId,
) -> AppResult<Vec<ProposalCard>> {
    let proposals = store
        .list_proposals(space_id, &ProposalFilter::default())
        .await?;
    let mut cards = Vec::with_capacity(proposals.len());
    for proposal in &proposals {
        cards.push(card_for(store, proposal).await?);
    }
    tracing::debug!(space_id = %space_id, cards = cards.len(), "Proposal cards mapped");
    Ok(cards)
}
