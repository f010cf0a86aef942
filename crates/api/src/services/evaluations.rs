//! Reviewer decisions, threshold changes and appeals.

use charm_core::aggregation::{direct_result, validate_required_reviews};
use charm_core::current_step::get_current_evaluation;
use charm_core::error::CoreError;
use charm_core::evaluation::EvaluationResult;
use charm_core::projection::ResolvedStep;
use charm_core::publish::next_evaluation;
use charm_core::types::DbId;
use charm_db::models::evaluation::{NewReview, ProposalEvaluation, ReviewOutcome};
use charm_db::models::proposal::Proposal;
use charm_db::models::vote::Vote;
use charm_db::ProposalStore;
use charm_events::{event_types, EventBus};
use serde::Serialize;

use super::votes::create_vote_if_necessary;
use super::{
    evaluation_event, load_evaluation, load_projection, load_proposal, load_steps,
    require_author, require_published, stored,
};
use crate::error::AppResult;

/// A reviewer's pass/fail decision.
#[derive(Debug, Clone)]
pub struct ResultSubmission {
    pub result: EvaluationResult,
    /// Kept only when the result is a fail.
    pub decline_reasons: Vec<String>,
}

impl ResultSubmission {
    fn review(&self, reviewer_id: DbId) -> NewReview {
        let decline_reasons = match self.result {
            EvaluationResult::Fail => self.decline_reasons.clone(),
            EvaluationResult::Pass => Vec::new(),
        };
        NewReview {
            reviewer_id,
            result: self.result,
            decline_reasons,
        }
    }
}

/// State of an evaluation after a review, decision or appeal review.
#[derive(Debug, Serialize)]
pub struct EvaluationChange {
    pub evaluation: ProposalEvaluation,
    /// Whether this call decided the step.
    pub decided: bool,
    /// Reviews counted so far while the step is still open.
    pub reviews: Option<i64>,
    pub resolved: ResolvedStep,
    /// The vote opened on the next step, if this decision opened one.
    pub vote: Option<Vote>,
}

/// Record a reviewer's decision on the proposal's current evaluation.
///
/// Pass/fail steps count reviews and decide once `required_reviews` is met,
/// by majority with ties failing. Other step types take the submitted
/// result directly, and feedback steps always pass.
pub async fn submit_evaluation_result(
    store: &dyn ProposalStore,
    bus: &EventBus,
    proposal_id: DbId,
    evaluation_id: DbId,
    reviewer_id: DbId,
    submission: &ResultSubmission,
) -> AppResult<EvaluationChange> {
    let proposal = load_proposal(store, proposal_id).await?;
    require_published(&proposal)?;
    let evaluation = load_evaluation(store, proposal_id, evaluation_id).await?;

    if evaluation.result.is_some() {
        return Err(already_decided(&evaluation));
    }
    if evaluation.is_appealed() {
        return Err(CoreError::UndesirableOperation(format!(
            "Evaluation \"{}\" is under appeal, only appeal reviews are accepted",
            evaluation.title
        ))
        .into());
    }
    let (_, steps) = load_steps(store, proposal_id).await?;
    if get_current_evaluation(&steps).map(|s| s.id) != Some(evaluation_id) {
        return Err(CoreError::UndesirableOperation(format!(
            "Evaluation \"{}\" is not the current step",
            evaluation.title
        ))
        .into());
    }

    let kind = stored(evaluation.evaluation_type())?;
    let outcome = if kind.counts_reviews() {
        store
            .record_review(evaluation_id, &submission.review(reviewer_id))
            .await?
    } else {
        store
            .decide_evaluation(
                evaluation_id,
                direct_result(kind, submission.result),
                reviewer_id,
            )
            .await?
    };

    apply_outcome(store, bus, &proposal, outcome, reviewer_id).await
}

/// Decide a pass/fail step from its stored reviews if the threshold is met.
///
/// Used after the threshold changes. Returns `None` when nothing changed,
/// including for step types that do not count reviews.
pub async fn update_pass_fail_evaluation_result_if_required(
    store: &dyn ProposalStore,
    bus: &EventBus,
    proposal_id: DbId,
    evaluation_id: DbId,
    actor: DbId,
) -> AppResult<Option<EvaluationChange>> {
    let proposal = load_proposal(store, proposal_id).await?;
    let evaluation = load_evaluation(store, proposal_id, evaluation_id).await?;
    if !stored(evaluation.evaluation_type())?.counts_reviews() {
        return Ok(None);
    }

    match store.recompute_result(evaluation_id).await? {
        Some(evaluation) => {
            let change =
                apply_outcome(store, bus, &proposal, ReviewOutcome::Decided { evaluation }, actor)
                    .await?;
            Ok(Some(change))
        }
        None => Ok(None),
    }
}

/// Change how many reviews an undecided step needs, then re-check it.
pub async fn update_required_reviews(
    store: &dyn ProposalStore,
    bus: &EventBus,
    proposal_id: DbId,
    evaluation_id: DbId,
    user_id: DbId,
    required_reviews: i32,
) -> AppResult<ProposalEvaluation> {
    validate_required_reviews(required_reviews)?;
    let proposal = load_proposal(store, proposal_id).await?;
    require_author(&proposal, user_id, "change review thresholds")?;
    let evaluation = load_evaluation(store, proposal_id, evaluation_id).await?;
    if evaluation.result.is_some() {
        return Err(already_decided(&evaluation));
    }

    let updated = store
        .set_required_reviews(evaluation_id, required_reviews)
        .await?;
    tracing::info!(
        proposal_id = %proposal_id,
        evaluation_id = %evaluation_id,
        required_reviews,
        "Required reviews updated"
    );

    let change =
        update_pass_fail_evaluation_result_if_required(store, bus, proposal_id, evaluation_id, user_id)
            .await?;
    Ok(change.map_or(updated, |c| c.evaluation))
}

/// File an appeal against a declined step.
///
/// Only authors may appeal, once per step, and only on steps configured as
/// appealable. The step's result is cleared so it becomes current again.
pub async fn appeal_evaluation(
    store: &dyn ProposalStore,
    bus: &EventBus,
    proposal_id: DbId,
    evaluation_id: DbId,
    user_id: DbId,
    reason: Option<&str>,
) -> AppResult<ProposalEvaluation> {
    let proposal = load_proposal(store, proposal_id).await?;
    require_published(&proposal)?;
    require_author(&proposal, user_id, "appeal an evaluation")?;
    let evaluation = load_evaluation(store, proposal_id, evaluation_id).await?;

    if !evaluation.appealable {
        return Err(CoreError::UndesirableOperation(format!(
            "Evaluation \"{}\" is not appealable",
            evaluation.title
        ))
        .into());
    }
    if evaluation.is_appealed() {
        return Err(CoreError::UndesirableOperation(format!(
            "Evaluation \"{}\" has already been appealed",
            evaluation.title
        ))
        .into());
    }
    if stored(evaluation.result())? != Some(EvaluationResult::Fail) {
        return Err(CoreError::UndesirableOperation(format!(
            "Only declined evaluations can be appealed, \"{}\" is not declined",
            evaluation.title
        ))
        .into());
    }

    let appealed = store
        .appeal_evaluation(evaluation_id, user_id, reason)
        .await?
        .ok_or_else(|| {
            CoreError::UndesirableOperation(format!(
                "Evaluation \"{}\" changed before the appeal was recorded",
                evaluation.title
            ))
        })?;

    store.touch_page(proposal_id).await?;
    tracing::info!(
        proposal_id = %proposal_id,
        evaluation_id = %evaluation_id,
        user_id = %user_id,
        "Evaluation appealed"
    );
    bus.publish(evaluation_event(
        event_types::EVALUATION_APPEALED,
        &appealed,
        user_id,
    ));
    Ok(appealed)
}

/// Record an appeal reviewer's decision on an appealed step.
///
/// Decides by majority over `appeal_required_reviews` (default 1), ties
/// failing. A failed appeal leaves the step declined for good.
pub async fn submit_evaluation_appeal_result(
    store: &dyn ProposalStore,
    bus: &EventBus,
    proposal_id: DbId,
    evaluation_id: DbId,
    reviewer_id: DbId,
    submission: &ResultSubmission,
) -> AppResult<EvaluationChange> {
    let proposal = load_proposal(store, proposal_id).await?;
    require_published(&proposal)?;
    let evaluation = load_evaluation(store, proposal_id, evaluation_id).await?;
    if !evaluation.is_appealed() {
        return Err(CoreError::UndesirableOperation(format!(
            "Evaluation \"{}\" has no appeal to review",
            evaluation.title
        ))
        .into());
    }

    let outcome = store
        .record_appeal_review(evaluation_id, &submission.review(reviewer_id))
        .await?;
    apply_outcome(store, bus, &proposal, outcome, reviewer_id).await
}

fn already_decided(evaluation: &ProposalEvaluation) -> crate::error::AppError {
    CoreError::UndesirableOperation(format!(
        "Evaluation \"{}\" has already been decided",
        evaluation.title
    ))
    .into()
}

/// Common tail of every decision: page touch, event, downstream vote, and
/// the freshly resolved current step.
async fn apply_outcome(
    store: &dyn ProposalStore,
    bus: &EventBus,
    proposal: &Proposal,
    outcome: ReviewOutcome,
    actor: DbId,
) -> AppResult<EvaluationChange> {
    let (evaluation, decided, reviews) = match outcome {
        ReviewOutcome::AlreadyDecided { evaluation } => return Err(already_decided(&evaluation)),
        ReviewOutcome::Pending {
            evaluation,
            reviews,
        } => (evaluation, false, Some(reviews)),
        ReviewOutcome::Decided { evaluation } => (evaluation, true, None),
    };

    store.touch_page(proposal.id).await?;
    bus.publish(evaluation_event(
        event_types::EVALUATION_CHANGED,
        &evaluation,
        actor,
    ));

    let (rows, steps) = load_steps(store, proposal.id).await?;
    let mut vote = None;
    if decided {
        tracing::info!(
            proposal_id = %proposal.id,
            evaluation_id = %evaluation.id,
            result = ?evaluation.result,
            "Evaluation decided"
        );
        let passed = stored(evaluation.result())? == Some(EvaluationResult::Pass);
        // A passed final step ends the workflow; later steps never open.
        if passed && evaluation.final_step != Some(true) {
            let next = next_evaluation(&steps, evaluation.index)
                .and_then(|step| rows.iter().find(|row| row.id == step.id));
            // The decision is already committed; vote failures are only logged.
            if let Some(next) = next {
                match create_vote_if_necessary(store, bus, proposal, next, actor).await {
                    Ok(created) => vote = created,
                    Err(e) => tracing::error!(
                        proposal_id = %proposal.id,
                        evaluation_id = %next.id,
                        error = %e,
                        "Failed to open vote for next step"
                    ),
                }
            }
        }
    } else {
        tracing::debug!(
            proposal_id = %proposal.id,
            evaluation_id = %evaluation.id,
            reviews = ?reviews,
            required = evaluation.required_reviews,
            "Review recorded, evaluation still open"
        );
    }

    let resolved = load_projection(store, proposal, steps).await?.resolve();
    Ok(EvaluationChange {
        evaluation,
        decided,
        reviews,
        resolved,
        vote,
    })
}
