//! Rubric criteria and answer upserts.

use charm_core::error::CoreError;
use charm_core::evaluation::EvaluationType;
use charm_core::rubric::{
    plan_criteria_upsert, validate_answers, RubricAnswerInput, RubricCriteriaInput,
};
use charm_core::types::DbId;
use charm_db::models::evaluation::ProposalEvaluation;
use charm_db::models::rubric::{AnswerScope, RubricAnswer, RubricCriteria};
use charm_db::ProposalStore;
use charm_events::{event_types, EventBus};

use super::{evaluation_event, load_evaluation, load_proposal, stored};
use crate::error::AppResult;

fn require_rubric(evaluation: &ProposalEvaluation) -> AppResult<()> {
    if stored(evaluation.evaluation_type())? != EvaluationType::Rubric {
        return Err(CoreError::InvalidInput(format!(
            "Evaluation \"{}\" is not a rubric step",
            evaluation.title
        ))
        .into());
    }
    Ok(())
}

/// Replace a rubric step's criteria with `inputs`.
///
/// Criteria whose id is missing from `inputs` are deleted along with their
/// answers; matching ids keep their identity. Returns the criteria ordered by
/// index.
pub async fn upsert_rubric_criteria(
    store: &dyn ProposalStore,
    proposal_id: DbId,
    evaluation_id: DbId,
    inputs: &[RubricCriteriaInput],
) -> AppResult<Vec<RubricCriteria>> {
    load_proposal(store, proposal_id).await?;
    let evaluation = load_evaluation(store, proposal_id, evaluation_id).await?;
    require_rubric(&evaluation)?;
    if evaluation.result.is_some() {
        return Err(CoreError::UndesirableOperation(format!(
            "Criteria of decided evaluation \"{}\" cannot change",
            evaluation.title
        ))
        .into());
    }

    let existing: Vec<DbId> = store
        .list_rubric_criteria(proposal_id, evaluation_id)
        .await?
        .iter()
        .map(|c| c.id)
        .collect();
    let plan = plan_criteria_upsert(&existing, inputs)?;

    let mut criteria = store
        .replace_rubric_criteria(proposal_id, evaluation_id, &plan)
        .await?;
    criteria.sort_by_key(|c| c.index);
    store.touch_page(proposal_id).await?;

    tracing::info!(
        proposal_id = %proposal_id,
        evaluation_id = %evaluation_id,
        criteria = criteria.len(),
        deleted = plan.delete.len(),
        "Rubric criteria upserted"
    );
    Ok(criteria)
}

/// Replace a reviewer's answers for one rubric step.
///
/// Every answer is validated before anything is written: identifiers, numeric
/// scores, criteria belonging to this (proposal, evaluation), and scores
/// inside each criteria's range. Draft answers go to their own table and
/// emit no event.
pub async fn upsert_rubric_answers(
    store: &dyn ProposalStore,
    bus: &EventBus,
    scope: AnswerScope,
    answers: &[RubricAnswerInput],
    is_draft: bool,
) -> AppResult<Vec<RubricAnswer>> {
    load_proposal(store, scope.proposal_id).await?;
    let evaluation = load_evaluation(store, scope.proposal_id, scope.evaluation_id).await?;
    require_rubric(&evaluation)?;

    let criteria = store
        .list_rubric_criteria(scope.proposal_id, scope.evaluation_id)
        .await?
        .iter()
        .map(RubricCriteria::to_criterion)
        .collect::<Result<Vec<_>, _>>();
    let criteria = stored(criteria)?;
    let validated = validate_answers(answers, &criteria)?;

    let rows = store
        .replace_rubric_answers(scope, &validated, is_draft)
        .await?;
    store.touch_page(scope.proposal_id).await?;

    tracing::info!(
        proposal_id = %scope.proposal_id,
        evaluation_id = %scope.evaluation_id,
        user_id = %scope.user_id,
        answers = rows.len(),
        is_draft,
        "Rubric answers upserted"
    );
    if !is_draft {
        bus.publish(
            evaluation_event(event_types::RUBRIC_ANSWERS_UPDATED, &evaluation, scope.user_id)
                .with_payload(serde_json::json!({
                    "proposal_id": scope.proposal_id,
                    "answers": rows.len(),
                })),
        );
    }
    Ok(rows)
}
