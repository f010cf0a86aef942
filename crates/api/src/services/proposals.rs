//! Proposal lifecycle: creation, reads, publishing, archiving and rewards.

use charm_core::aggregation::validate_required_reviews;
use charm_core::current_step::{get_current_evaluation, ProposalStep};
use charm_core::error::CoreError;
use charm_core::evaluation::{EvaluationType, ProposalStatus};
use charm_core::publish::{validate_publish, StepConfig};
use charm_core::status::{EvaluationStatus, ProposalStepKind};
use charm_core::types::{DbId, Timestamp};
use charm_core::vote::VoteSettings;
use charm_db::models::evaluation::{CreateEvaluation, EvaluationReview, ProposalEvaluation};
use charm_db::models::proposal::{CreateProposal, Proposal, ProposalFilter};
use charm_db::models::reward::ProposalReward;
use charm_db::models::rubric::{RubricAnswer, RubricCriteria};
use charm_db::models::vote::Vote;
use charm_db::ProposalStore;
use charm_events::{event_types, EventBus};
use serde::Serialize;

use super::votes::create_vote_if_necessary;
use super::{
    load_page, load_projection, load_proposal, load_steps, proposal_event, require_author,
    require_published, stored,
};
use crate::error::AppResult;

/// A proposal as listed: page fields plus its resolved current step.
#[derive(Debug, Serialize)]
pub struct ProposalSummary {
    pub id: DbId,
    pub space_id: DbId,
    pub title: String,
    pub path: String,
    pub status: String,
    pub is_template: bool,
    pub authors: Vec<DbId>,
    pub created_by: DbId,
    pub published_at: Option<Timestamp>,
    pub updated_at: Timestamp,
    pub current_step: ProposalStep,
    pub evaluation_status: EvaluationStatus,
}

/// One evaluation with everything recorded against it.
#[derive(Debug, Serialize)]
pub struct EvaluationDetail {
    #[serde(flatten)]
    pub evaluation: ProposalEvaluation,
    pub reviews: Vec<EvaluationReview>,
    pub appeal_reviews: Vec<EvaluationReview>,
    pub rubric_criteria: Vec<RubricCriteria>,
    pub rubric_answers: Vec<RubricAnswer>,
    /// The viewer's own draft answers; other reviewers' drafts stay private.
    pub draft_rubric_answers: Vec<RubricAnswer>,
    pub vote: Option<Vote>,
}

/// A single proposal with its workflow state.
#[derive(Debug, Serialize)]
pub struct ProposalDetail {
    #[serde(flatten)]
    pub summary: ProposalSummary,
    pub fields: serde_json::Value,
    pub selected_credential_template_ids: Vec<String>,
    pub evaluations: Vec<EvaluationDetail>,
    pub rewards: Vec<ProposalReward>,
}

fn validate_evaluation(input: &CreateEvaluation) -> AppResult<()> {
    if input.title.trim().is_empty() {
        return Err(CoreError::InvalidInput("Evaluation title must not be empty".into()).into());
    }
    validate_required_reviews(input.required_reviews)?;
    if let Some(appeal) = input.appeal_required_reviews {
        validate_required_reviews(appeal)?;
    }
    if let Some(settings) = &input.vote_settings {
        VoteSettings::from_json(settings)?.validate()?;
    }
    Ok(())
}

async fn summarize(store: &dyn ProposalStore, proposal: &Proposal) -> AppResult<ProposalSummary> {
    let page = load_page(store, proposal.id).await?;
    let (_, steps) = load_steps(store, proposal.id).await?;
    let resolved = load_projection(store, proposal, steps).await?.resolve();

    Ok(ProposalSummary {
        id: proposal.id,
        space_id: proposal.space_id,
        title: page.title,
        path: page.path,
        status: proposal.status.clone(),
        is_template: page.is_template,
        authors: proposal.authors.clone(),
        created_by: proposal.created_by,
        published_at: proposal.published_at,
        updated_at: page.updated_at,
        current_step: resolved.current_step,
        evaluation_status: resolved.evaluation_status,
    })
}

async fn detail(
    store: &dyn ProposalStore,
    proposal: &Proposal,
    viewer: DbId,
) -> AppResult<ProposalDetail> {
    let summary = summarize(store, proposal).await?;
    let (rows, _) = load_steps(store, proposal.id).await?;

    let mut evaluations = Vec::with_capacity(rows.len());
    for evaluation in rows {
        let id = evaluation.id;
        let is_rubric = stored(evaluation.evaluation_type())? == EvaluationType::Rubric;
        let (rubric_criteria, rubric_answers, draft_rubric_answers) = if is_rubric {
            let drafts = store
                .list_rubric_answers(proposal.id, Some(id), true)
                .await?
                .into_iter()
                .filter(|a| a.user_id == viewer)
                .collect();
            (
                store.list_rubric_criteria(proposal.id, id).await?,
                store.list_rubric_answers(proposal.id, Some(id), false).await?,
                drafts,
            )
        } else {
            (Vec::new(), Vec::new(), Vec::new())
        };

        evaluations.push(EvaluationDetail {
            reviews: store.list_reviews(id).await?,
            appeal_reviews: store.list_appeal_reviews(id).await?,
            rubric_criteria,
            rubric_answers,
            draft_rubric_answers,
            vote: store.find_vote_for_evaluation(id).await?,
            evaluation,
        });
    }

    Ok(ProposalDetail {
        summary,
        fields: proposal.fields.clone(),
        selected_credential_template_ids: proposal.selected_credential_template_ids.clone(),
        evaluations,
        rewards: store.list_rewards(proposal.id).await?,
    })
}

/// Create a draft proposal with its evaluation steps in order.
pub async fn create_proposal(
    store: &dyn ProposalStore,
    bus: &EventBus,
    input: &CreateProposal,
    evaluations: &[CreateEvaluation],
) -> AppResult<ProposalDetail> {
    if input.title.trim().is_empty() {
        return Err(CoreError::InvalidInput("Proposal title must not be empty".into()).into());
    }
    for evaluation in evaluations {
        validate_evaluation(evaluation)?;
    }

    let proposal = store.create_proposal(input).await?;
    for evaluation in evaluations {
        store.create_evaluation(proposal.id, evaluation).await?;
    }

    tracing::info!(
        proposal_id = %proposal.id,
        space_id = %proposal.space_id,
        evaluations = evaluations.len(),
        is_template = input.is_template,
        "Proposal created"
    );
    bus.publish(
        proposal_event(event_types::PROPOSAL_CREATED, proposal.id, input.created_by)
            .with_payload(serde_json::json!({ "space_id": proposal.space_id })),
    );

    detail(store, &proposal, input.created_by).await
}

/// Append an evaluation step to a draft.
pub async fn add_evaluation(
    store: &dyn ProposalStore,
    proposal_id: DbId,
    user_id: DbId,
    input: &CreateEvaluation,
) -> AppResult<ProposalEvaluation> {
    let proposal = load_proposal(store, proposal_id).await?;
    require_author(&proposal, user_id, "edit the workflow")?;
    if stored(proposal.status())? != ProposalStatus::Draft {
        return Err(CoreError::UndesirableOperation(
            "Evaluation steps can only be added while the proposal is a draft".into(),
        )
        .into());
    }
    validate_evaluation(input)?;

    let evaluation = store.create_evaluation(proposal_id, input).await?;
    store.touch_page(proposal_id).await?;
    tracing::info!(
        proposal_id = %proposal_id,
        evaluation_id = %evaluation.id,
        index = evaluation.index,
        evaluation_type = %evaluation.evaluation_type,
        "Evaluation step added"
    );
    Ok(evaluation)
}

/// List a space's proposals with their current step.
pub async fn get_proposals(
    store: &dyn ProposalStore,
    space_id: DbId,
    filter: &ProposalFilter,
) -> AppResult<Vec<ProposalSummary>> {
    let proposals = store.list_proposals(space_id, filter).await?;
    let mut summaries = Vec::with_capacity(proposals.len());
    for proposal in &proposals {
        summaries.push(summarize(store, proposal).await?);
    }
    Ok(summaries)
}

/// Load one proposal with its evaluations, reviews, rubric data and votes.
pub async fn get_proposal(
    store: &dyn ProposalStore,
    proposal_id: DbId,
    viewer: DbId,
) -> AppResult<ProposalDetail> {
    let proposal = load_proposal(store, proposal_id).await?;
    detail(store, &proposal, viewer).await
}

/// Load a proposal template. Regular proposals are not found here.
pub async fn get_proposal_template(
    store: &dyn ProposalStore,
    template_id: DbId,
    viewer: DbId,
) -> AppResult<ProposalDetail> {
    let not_found = || CoreError::NotFound {
        entity: "ProposalTemplate",
        id: template_id,
    };
    let proposal = store
        .find_proposal(template_id)
        .await?
        .ok_or_else(not_found)?;
    if !load_page(store, template_id).await?.is_template {
        return Err(not_found().into());
    }
    detail(store, &proposal, viewer).await
}

/// Move a draft into review.
///
/// Validates the workflow, stamps `published_at` and opens the vote when the
/// first step is a vote step.
pub async fn publish_proposal(
    store: &dyn ProposalStore,
    bus: &EventBus,
    proposal_id: DbId,
    user_id: DbId,
) -> AppResult<ProposalDetail> {
    let proposal = load_proposal(store, proposal_id).await?;
    require_author(&proposal, user_id, "publish the proposal")?;
    let (rows, steps) = load_steps(store, proposal_id).await?;

    let mut criteria_counts = Vec::with_capacity(rows.len());
    for row in &rows {
        let count = if stored(row.evaluation_type())? == EvaluationType::Rubric {
            store.list_rubric_criteria(proposal_id, row.id).await?.len()
        } else {
            0
        };
        criteria_counts.push(count);
    }
    let configs: Vec<StepConfig<'_>> = steps
        .iter()
        .zip(&rows)
        .zip(criteria_counts)
        .map(|((step, row), criteria_count)| StepConfig {
            step,
            criteria_count,
            vote_settings: row.vote_settings.as_ref(),
        })
        .collect();
    validate_publish(stored(proposal.status())?, &configs)?;

    let published = store
        .set_proposal_status(
            proposal_id,
            ProposalStatus::Published.as_str(),
            Some(chrono::Utc::now()),
        )
        .await?;

    if let Some(first) = get_current_evaluation(&steps)
        .and_then(|step| rows.iter().find(|row| row.id == step.id))
    {
        create_vote_if_necessary(store, bus, &published, first, user_id).await?;
    }
    store.touch_page(proposal_id).await?;

    tracing::info!(
        proposal_id = %proposal_id,
        user_id = %user_id,
        evaluations = rows.len(),
        "Proposal published"
    );
    bus.publish(
        proposal_event(event_types::PROPOSAL_PUBLISHED, proposal_id, user_id)
            .with_payload(serde_json::json!({ "evaluations": rows.len() })),
    );

    detail(store, &published, user_id).await
}

/// Archive a proposal. Its evaluation status reports `archived` from then on.
pub async fn archive_proposal(
    store: &dyn ProposalStore,
    bus: &EventBus,
    proposal_id: DbId,
    user_id: DbId,
) -> AppResult<ProposalSummary> {
    let proposal = load_proposal(store, proposal_id).await?;
    require_author(&proposal, user_id, "archive the proposal")?;
    if stored(proposal.status())? == ProposalStatus::Archived {
        return Err(CoreError::UndesirableOperation(format!(
            "Proposal {proposal_id} is already archived"
        ))
        .into());
    }

    let archived = store
        .set_proposal_status(proposal_id, ProposalStatus::Archived.as_str(), None)
        .await?;
    store.touch_page(proposal_id).await?;

    tracing::info!(proposal_id = %proposal_id, user_id = %user_id, "Proposal archived");
    bus.publish(proposal_event(
        event_types::PROPOSAL_ARCHIVED,
        proposal_id,
        user_id,
    ));
    summarize(store, &archived).await
}

/// Turn the proposal's pending rewards into published reward rows.
///
/// Only possible once the workflow has passed and the Rewards step is
/// current.
pub async fn publish_rewards(
    store: &dyn ProposalStore,
    bus: &EventBus,
    proposal_id: DbId,
    user_id: DbId,
) -> AppResult<Vec<ProposalReward>> {
    let proposal = load_proposal(store, proposal_id).await?;
    require_published(&proposal)?;
    require_author(&proposal, user_id, "publish rewards")?;
    if proposal.pending_rewards().is_empty() {
        return Err(
            CoreError::UndesirableOperation("Proposal has no pending rewards".into()).into(),
        );
    }

    let (_, steps) = load_steps(store, proposal_id).await?;
    let resolved = load_projection(store, &proposal, steps).await?.resolve();
    if resolved.current_step.step != ProposalStepKind::Rewards {
        return Err(CoreError::UndesirableOperation(
            "Rewards can only be published once the final evaluation has passed".into(),
        )
        .into());
    }

    let rewards = store.publish_pending_rewards(proposal_id).await?;
    store.touch_page(proposal_id).await?;

    tracing::info!(
        proposal_id = %proposal_id,
        rewards = rewards.len(),
        "Proposal rewards published"
    );
    bus.publish(
        proposal_event(event_types::REWARDS_PUBLISHED, proposal_id, user_id)
            .with_payload(serde_json::json!({ "rewards": rewards.len() })),
    );
    Ok(rewards)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::services::evaluations::{submit_evaluation_result, ResultSubmission};
    use crate::services::rubric::upsert_rubric_criteria;
    use crate::services::test_support::Fixture;
    use assert_matches::assert_matches;
    use charm_core::evaluation::EvaluationResult;
    use charm_core::rubric::RubricCriteriaInput;
    use charm_core::status::StepResult;
    use serde_json::json;

    fn create_input(fx: &Fixture, is_template: bool) -> CreateProposal {
        CreateProposal {
            space_id: fx.space_id,
            title: "Community grant".into(),
            created_by: fx.author,
            authors: vec![fx.author],
            is_template,
            workflow_id: None,
            fields: json!({}),
            selected_credential_template_ids: vec![],
        }
    }

    fn step(title: &str, evaluation_type: EvaluationType) -> CreateEvaluation {
        CreateEvaluation {
            title: title.into(),
            evaluation_type,
            required_reviews: 1,
            final_step: None,
            appealable: false,
            appeal_required_reviews: None,
            due_date: None,
            vote_settings: (evaluation_type == EvaluationType::Vote).then(|| {
                json!({
                    "type": "Approval",
                    "threshold": 50,
                    "options": ["Yes", "No"],
                    "maxChoices": 1,
                    "durationDays": 7
                })
            }),
        }
    }

    fn pass() -> ResultSubmission {
        ResultSubmission {
            result: EvaluationResult::Pass,
            decline_reasons: vec![],
        }
    }

    #[tokio::test]
    async fn created_proposal_sits_on_draft_step() {
        let fx = Fixture::new();
        let created = create_proposal(
            &fx.store,
            &fx.bus,
            &create_input(&fx, false),
            &[step("Feedback", EvaluationType::Feedback), step("Review", EvaluationType::PassFail)],
        )
        .await
        .unwrap();

        assert_eq!(created.summary.status, "draft");
        assert_eq!(created.summary.current_step.step, ProposalStepKind::Draft);
        assert_eq!(created.summary.evaluation_status, EvaluationStatus::Draft);
        let indices: Vec<i32> = created.evaluations.iter().map(|e| e.evaluation.index).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[tokio::test]
    async fn invalid_evaluation_creates_nothing() {
        let fx = Fixture::new();
        let mut bad = step("Review", EvaluationType::PassFail);
        bad.required_reviews = 0;

        let err = create_proposal(&fx.store, &fx.bus, &create_input(&fx, false), &[bad])
            .await
            .unwrap_err();
        assert_matches!(err, AppError::Core(CoreError::InvalidInput(_)));
        let listed = get_proposals(&fx.store, fx.space_id, &ProposalFilter::default())
            .await
            .unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn publishing_moves_to_first_step_and_opens_its_vote() {
        let fx = Fixture::new();
        let created = create_proposal(
            &fx.store,
            &fx.bus,
            &create_input(&fx, false),
            &[step("Community vote", EvaluationType::Vote)],
        )
        .await
        .unwrap();

        let published = publish_proposal(&fx.store, &fx.bus, created.summary.id, fx.author)
            .await
            .unwrap();
        assert_eq!(published.summary.status, "published");
        assert!(published.summary.published_at.is_some());
        assert_eq!(published.summary.current_step.step, ProposalStepKind::Vote);
        assert_eq!(published.summary.current_step.index, 1);
        assert!(published.evaluations[0].vote.is_some());
    }

    #[tokio::test]
    async fn publishing_twice_is_undesirable() {
        let fx = Fixture::new();
        let created = create_proposal(
            &fx.store,
            &fx.bus,
            &create_input(&fx, false),
            &[step("Review", EvaluationType::PassFail)],
        )
        .await
        .unwrap();
        publish_proposal(&fx.store, &fx.bus, created.summary.id, fx.author)
            .await
            .unwrap();

        let err = publish_proposal(&fx.store, &fx.bus, created.summary.id, fx.author)
            .await
            .unwrap_err();
        assert_matches!(err, AppError::Core(CoreError::UndesirableOperation(_)));
    }

    #[tokio::test]
    async fn publish_checks_authorship_and_workflow() {
        let fx = Fixture::new();
        let empty = create_proposal(&fx.store, &fx.bus, &create_input(&fx, false), &[])
            .await
            .unwrap();

        let err = publish_proposal(&fx.store, &fx.bus, empty.summary.id, DbId::new_v4())
            .await
            .unwrap_err();
        assert_matches!(err, AppError::Core(CoreError::UnauthorisedAction(_)));

        let err = publish_proposal(&fx.store, &fx.bus, empty.summary.id, fx.author)
            .await
            .unwrap_err();
        assert_matches!(err, AppError::Core(CoreError::InvalidInput(_)));

        let rubric = create_proposal(
            &fx.store,
            &fx.bus,
            &create_input(&fx, false),
            &[step("Scoring", EvaluationType::Rubric)],
        )
        .await
        .unwrap();
        let err = publish_proposal(&fx.store, &fx.bus, rubric.summary.id, fx.author)
            .await
            .unwrap_err();
        assert_matches!(err, AppError::Core(CoreError::InvalidInput(msg)) if msg.contains("no criteria"));

        let criteria: RubricCriteriaInput = serde_json::from_value(json!({
            "title": "Impact",
            "type": "range",
            "parameters": { "min": 1, "max": 5 }
        }))
        .unwrap();
        upsert_rubric_criteria(
            &fx.store,
            rubric.summary.id,
            rubric.evaluations[0].evaluation.id,
            &[criteria],
        )
        .await
        .unwrap();
        assert!(publish_proposal(&fx.store, &fx.bus, rubric.summary.id, fx.author)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn steps_cannot_be_added_after_publishing() {
        let fx = Fixture::new();
        let created = create_proposal(
            &fx.store,
            &fx.bus,
            &create_input(&fx, false),
            &[step("Review", EvaluationType::PassFail)],
        )
        .await
        .unwrap();
        let added = add_evaluation(
            &fx.store,
            created.summary.id,
            fx.author,
            &step("Feedback", EvaluationType::Feedback),
        )
        .await
        .unwrap();
        assert_eq!(added.index, 1);

        publish_proposal(&fx.store, &fx.bus, created.summary.id, fx.author)
            .await
            .unwrap();
        let err = add_evaluation(
            &fx.store,
            created.summary.id,
            fx.author,
            &step("Late", EvaluationType::Feedback),
        )
        .await
        .unwrap_err();
        assert_matches!(err, AppError::Core(CoreError::UndesirableOperation(_)));
    }

    #[tokio::test]
    async fn templates_are_listed_only_on_request_and_fetched_separately() {
        let fx = Fixture::new();
        let template = create_proposal(&fx.store, &fx.bus, &create_input(&fx, true), &[])
            .await
            .unwrap();
        let regular = create_proposal(&fx.store, &fx.bus, &create_input(&fx, false), &[])
            .await
            .unwrap();

        let listed = get_proposals(&fx.store, fx.space_id, &ProposalFilter::default())
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, regular.summary.id);

        let fetched = get_proposal_template(&fx.store, template.summary.id, fx.author)
            .await
            .unwrap();
        assert!(fetched.summary.is_template);

        let err = get_proposal_template(&fx.store, regular.summary.id, fx.author)
            .await
            .unwrap_err();
        assert_matches!(err, AppError::Core(CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn archived_proposal_reports_archived() {
        let fx = Fixture::new();
        let created = create_proposal(
            &fx.store,
            &fx.bus,
            &create_input(&fx, false),
            &[step("Review", EvaluationType::PassFail)],
        )
        .await
        .unwrap();
        publish_proposal(&fx.store, &fx.bus, created.summary.id, fx.author)
            .await
            .unwrap();

        let archived = archive_proposal(&fx.store, &fx.bus, created.summary.id, fx.author)
            .await
            .unwrap();
        assert_eq!(archived.status, "archived");
        assert_eq!(archived.evaluation_status, EvaluationStatus::Archived);

        let err = archive_proposal(&fx.store, &fx.bus, created.summary.id, fx.author)
            .await
            .unwrap_err();
        assert_matches!(err, AppError::Core(CoreError::UndesirableOperation(_)));
    }

    #[tokio::test]
    async fn rewards_publish_after_final_pass() {
        let fx = Fixture::new();
        let mut input = create_input(&fx, false);
        input.fields = json!({ "pendingRewards": [{ "title": "Bounty", "amount": 100 }] });
        let created = create_proposal(
            &fx.store,
            &fx.bus,
            &input,
            &[step("Review", EvaluationType::PassFail)],
        )
        .await
        .unwrap();
        let proposal_id = created.summary.id;
        let evaluation_id = created.evaluations[0].evaluation.id;
        publish_proposal(&fx.store, &fx.bus, proposal_id, fx.author)
            .await
            .unwrap();

        let err = publish_rewards(&fx.store, &fx.bus, proposal_id, fx.author)
            .await
            .unwrap_err();
        assert_matches!(err, AppError::Core(CoreError::UndesirableOperation(_)));

        submit_evaluation_result(
            &fx.store,
            &fx.bus,
            proposal_id,
            evaluation_id,
            DbId::new_v4(),
            &pass(),
        )
        .await
        .unwrap();
        let rewards = publish_rewards(&fx.store, &fx.bus, proposal_id, fx.author)
            .await
            .unwrap();
        assert_eq!(rewards.len(), 1);

        let after = get_proposal(&fx.store, proposal_id, fx.author).await.unwrap();
        assert_eq!(after.summary.current_step.step, ProposalStepKind::Rewards);
        assert_eq!(after.summary.current_step.result, StepResult::Pass);
        assert_eq!(after.summary.evaluation_status, EvaluationStatus::Published);
        assert_eq!(after.fields["pendingRewards"], json!([]));
    }

    #[tokio::test]
    async fn credentials_step_follows_issuance() {
        let fx = Fixture::new();
        let mut input = create_input(&fx, false);
        input.selected_credential_template_ids = vec!["tpl-approved".into()];
        let created = create_proposal(
            &fx.store,
            &fx.bus,
            &input,
            &[step("Review", EvaluationType::PassFail)],
        )
        .await
        .unwrap();
        let proposal_id = created.summary.id;
        publish_proposal(&fx.store, &fx.bus, proposal_id, fx.author)
            .await
            .unwrap();
        submit_evaluation_result(
            &fx.store,
            &fx.bus,
            proposal_id,
            created.evaluations[0].evaluation.id,
            DbId::new_v4(),
            &pass(),
        )
        .await
        .unwrap();

        let pending = get_proposal(&fx.store, proposal_id, fx.author).await.unwrap();
        assert_eq!(pending.summary.current_step.step, ProposalStepKind::Credentials);
        assert_eq!(pending.summary.current_step.index, 2);
        assert_eq!(pending.summary.evaluation_status, EvaluationStatus::NotIssued);

        fx.store
            .issue_credential(proposal_id, "tpl-approved", fx.author)
            .await;
        let issued = get_proposal(&fx.store, proposal_id, fx.author).await.unwrap();
        assert_eq!(issued.summary.evaluation_status, EvaluationStatus::Issued);
    }

    #[tokio::test]
    async fn credentials_step_follows_published_rewards() {
        let fx = Fixture::new();
        let mut input = create_input(&fx, false);
        input.fields = json!({ "pendingRewards": [{ "title": "Bounty", "amount": 100 }] });
        input.selected_credential_template_ids = vec!["tpl-approved".into()];
        let created = create_proposal(
            &fx.store,
            &fx.bus,
            &input,
            &[step("Review", EvaluationType::PassFail)],
        )
        .await
        .unwrap();
        let proposal_id = created.summary.id;
        publish_proposal(&fx.store, &fx.bus, proposal_id, fx.author)
            .await
            .unwrap();
        submit_evaluation_result(
            &fx.store,
            &fx.bus,
            proposal_id,
            created.evaluations[0].evaluation.id,
            DbId::new_v4(),
            &pass(),
        )
        .await
        .unwrap();

        let pending = get_proposal(&fx.store, proposal_id, fx.author).await.unwrap();
        assert_eq!(pending.summary.current_step.step, ProposalStepKind::Rewards);
        assert_eq!(pending.summary.current_step.index, 2);

        publish_rewards(&fx.store, &fx.bus, proposal_id, fx.author)
            .await
            .unwrap();
        let after = get_proposal(&fx.store, proposal_id, fx.author).await.unwrap();
        assert_eq!(after.summary.current_step.step, ProposalStepKind::Credentials);
        assert_eq!(after.summary.current_step.index, 3);
        assert_eq!(after.summary.evaluation_status, EvaluationStatus::NotIssued);
    }
}
