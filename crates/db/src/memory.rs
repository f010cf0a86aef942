//! In-process [`ProposalStore`] for tests and local runs.
//!
//! All state sits behind one `tokio::sync::RwLock`. Every mutating method
//! holds the write guard for its whole read-check-write sequence, which
//! gives the same serialisation the Postgres store gets from row locks.

use std::collections::HashMap;

use async_trait::async_trait;
use charm_core::aggregation::{appeal_required_reviews, ReviewTally};
use charm_core::evaluation::{EvaluationResult, ProposalStatus};
use charm_core::rubric::{CriteriaPlan, ValidatedAnswer, CRITERIA_TYPE_RANGE};
use charm_core::types::{DbId, Timestamp};
use charm_core::vote::VOTE_STATUS_IN_PROGRESS;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::decision::tally;
use crate::models::evaluation::{
    CreateEvaluation, EvaluationReview, NewReview, ProposalEvaluation, ReviewOutcome,
};
use crate::models::event::{Event, NewEvent};
use crate::models::proposal::{CreateProposal, Page, Proposal, ProposalFilter, PENDING_REWARDS_FIELD};
use crate::models::reward::{IssuedCredential, ProposalReward};
use crate::models::rubric::{AnswerScope, RubricAnswer, RubricCriteria};
use crate::models::vote::{CreateVote, Vote};
use crate::store::ProposalStore;

#[derive(Default)]
struct State {
    pages: HashMap<DbId, Page>,
    proposals: Vec<Proposal>,
    evaluations: HashMap<DbId, ProposalEvaluation>,
    reviews: Vec<EvaluationReview>,
    appeal_reviews: Vec<EvaluationReview>,
    criteria: HashMap<DbId, RubricCriteria>,
    answers: Vec<RubricAnswer>,
    draft_answers: Vec<RubricAnswer>,
    votes: Vec<Vote>,
    rewards: Vec<ProposalReward>,
    issued_credentials: Vec<IssuedCredential>,
    events: Vec<Event>,
}

impl State {
    fn proposal_mut(&mut self, id: DbId) -> Result<&mut Proposal, sqlx::Error> {
        self.proposals
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(sqlx::Error::RowNotFound)
    }

    fn evaluation(&self, id: DbId) -> Result<&ProposalEvaluation, sqlx::Error> {
        self.evaluations.get(&id).ok_or(sqlx::Error::RowNotFound)
    }

    fn evaluation_mut(&mut self, id: DbId) -> Result<&mut ProposalEvaluation, sqlx::Error> {
        self.evaluations.get_mut(&id).ok_or(sqlx::Error::RowNotFound)
    }

    fn review_table(&mut self, appeal: bool) -> &mut Vec<EvaluationReview> {
        if appeal {
            &mut self.appeal_reviews
        } else {
            &mut self.reviews
        }
    }

    fn reviews_for(&self, appeal: bool, evaluation_id: DbId) -> Vec<EvaluationReview> {
        let table = if appeal { &self.appeal_reviews } else { &self.reviews };
        table
            .iter()
            .filter(|r| r.evaluation_id == evaluation_id)
            .cloned()
            .collect()
    }

    /// Insert or replace the reviewer's review, keyed on (evaluation, reviewer).
    fn upsert_review(&mut self, appeal: bool, evaluation_id: DbId, review: &NewReview) {
        let table = self.review_table(appeal);
        table.retain(|r| !(r.evaluation_id == evaluation_id && r.reviewer_id == review.reviewer_id));
        table.push(EvaluationReview {
            id: DbId::new_v4(),
            evaluation_id,
            reviewer_id: review.reviewer_id,
            result: review.result.as_str().to_string(),
            decline_reasons: review.decline_reasons.clone(),
            completed_at: Utc::now(),
        });
    }

    fn write_decision(
        &mut self,
        evaluation_id: DbId,
        result: EvaluationResult,
        decided_by: Option<DbId>,
    ) -> Result<ProposalEvaluation, sqlx::Error> {
        let now = Utc::now();
        let evaluation = self.evaluation_mut(evaluation_id)?;
        evaluation.result = Some(result.as_str().to_string());
        evaluation.decided_by = decided_by;
        evaluation.completed_at = Some(now);
        evaluation.declined_at = (result == EvaluationResult::Fail).then_some(now);
        Ok(evaluation.clone())
    }

    /// Shared body of `record_review` and `record_appeal_review`.
    fn record(
        &mut self,
        appeal: bool,
        evaluation_id: DbId,
        review: &NewReview,
        required: i32,
    ) -> Result<ReviewOutcome, sqlx::Error> {
        self.upsert_review(appeal, evaluation_id, review);
        let counts: ReviewTally = tally(&self.reviews_for(appeal, evaluation_id))?;
        match counts.decide(required) {
            Some(result) => {
                let evaluation = self.write_decision(evaluation_id, result, Some(review.reviewer_id))?;
                Ok(ReviewOutcome::Decided { evaluation })
            }
            None => Ok(ReviewOutcome::Pending {
                evaluation: self.evaluation(evaluation_id)?.clone(),
                reviews: counts.total(),
            }),
        }
    }
}

/// [`ProposalStore`] holding everything in memory.
#[derive(Default)]
pub struct MemoryProposalStore {
    state: RwLock<State>,
}

impl MemoryProposalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a credential issued for a proposal.
    ///
    /// Issuance itself happens outside this service; this stands in for the
    /// rows the issuer writes.
    pub async fn issue_credential(
        &self,
        proposal_id: DbId,
        credential_template_id: &str,
        user_id: DbId,
    ) -> IssuedCredential {
        let credential = IssuedCredential {
            id: DbId::new_v4(),
            proposal_id,
            credential_template_id: credential_template_id.to_string(),
            user_id,
            created_at: Utc::now(),
        };
        self.state
            .write()
            .await
            .issued_credentials
            .push(credential.clone());
        credential
    }
}

#[async_trait]
impl ProposalStore for MemoryProposalStore {
    async fn create_proposal(&self, input: &CreateProposal) -> Result<Proposal, sqlx::Error> {
        let id = DbId::new_v4();
        let now = Utc::now();
        let page = Page {
            id,
            space_id: input.space_id,
            title: input.title.clone(),
            path: format!("page-{}", id.simple()),
            is_template: input.is_template,
            created_at: now,
            updated_at: now,
        };
        let proposal = Proposal {
            id,
            space_id: input.space_id,
            status: ProposalStatus::Draft.as_str().to_string(),
            published_at: None,
            workflow_id: input.workflow_id,
            fields: input.fields.clone(),
            selected_credential_template_ids: input.selected_credential_template_ids.clone(),
            authors: input.authors.clone(),
            created_by: input.created_by,
            created_at: now,
            updated_at: now,
        };

        let mut state = self.state.write().await;
        state.pages.insert(id, page);
        state.proposals.push(proposal.clone());
        Ok(proposal)
    }

    async fn find_proposal(&self, id: DbId) -> Result<Option<Proposal>, sqlx::Error> {
        let state = self.state.read().await;
        Ok(state.proposals.iter().find(|p| p.id == id).cloned())
    }

    async fn list_proposals(
        &self,
        space_id: DbId,
        filter: &ProposalFilter,
    ) -> Result<Vec<Proposal>, sqlx::Error> {
        let state = self.state.read().await;
        let mut proposals: Vec<Proposal> = state
            .proposals
            .iter()
            .filter(|p| p.space_id == space_id)
            .filter(|p| filter.status.map_or(true, |s| p.status == s.as_str()))
            .filter(|p| {
                filter.include_templates
                    || state.pages.get(&p.id).is_some_and(|page| !page.is_template)
            })
            .cloned()
            .collect();
        proposals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(proposals)
    }

    async fn set_proposal_status(
        &self,
        id: DbId,
        status: &str,
        published_at: Option<Timestamp>,
    ) -> Result<Proposal, sqlx::Error> {
        let mut state = self.state.write().await;
        let proposal = state.proposal_mut(id)?;
        proposal.status = status.to_string();
        if published_at.is_some() {
            proposal.published_at = published_at;
        }
        proposal.updated_at = Utc::now();
        Ok(proposal.clone())
    }

    async fn find_page(&self, id: DbId) -> Result<Option<Page>, sqlx::Error> {
        Ok(self.state.read().await.pages.get(&id).cloned())
    }

    async fn touch_page(&self, id: DbId) -> Result<(), sqlx::Error> {
        if let Some(page) = self.state.write().await.pages.get_mut(&id) {
            page.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn publish_pending_rewards(
        &self,
        proposal_id: DbId,
    ) -> Result<Vec<ProposalReward>, sqlx::Error> {
        let mut state = self.state.write().await;
        let proposal = state.proposal_mut(proposal_id)?;
        let pending = proposal.pending_rewards();
        if let Some(fields) = proposal.fields.as_object_mut() {
            fields.insert(PENDING_REWARDS_FIELD.to_string(), serde_json::json!([]));
        }
        proposal.updated_at = Utc::now();

        let published: Vec<ProposalReward> = pending
            .into_iter()
            .map(|reward| ProposalReward {
                id: DbId::new_v4(),
                proposal_id,
                reward,
                created_at: Utc::now(),
            })
            .collect();
        state.rewards.extend(published.iter().cloned());
        Ok(published)
    }

    async fn list_rewards(&self, proposal_id: DbId) -> Result<Vec<ProposalReward>, sqlx::Error> {
        let state = self.state.read().await;
        Ok(state
            .rewards
            .iter()
            .filter(|r| r.proposal_id == proposal_id)
            .cloned()
            .collect())
    }

    async fn list_issued_credentials(
        &self,
        proposal_id: DbId,
    ) -> Result<Vec<IssuedCredential>, sqlx::Error> {
        let state = self.state.read().await;
        Ok(state
            .issued_credentials
            .iter()
            .filter(|c| c.proposal_id == proposal_id)
            .cloned()
            .collect())
    }

    async fn create_evaluation(
        &self,
        proposal_id: DbId,
        input: &CreateEvaluation,
    ) -> Result<ProposalEvaluation, sqlx::Error> {
        let mut state = self.state.write().await;
        let index = state
            .evaluations
            .values()
            .filter(|e| e.proposal_id == proposal_id)
            .map(|e| e.index + 1)
            .max()
            .unwrap_or(0);
        let evaluation = ProposalEvaluation {
            id: DbId::new_v4(),
            proposal_id,
            index,
            evaluation_type: input.evaluation_type.as_str().to_string(),
            title: input.title.clone(),
            result: None,
            required_reviews: input.required_reviews,
            final_step: input.final_step,
            appealable: input.appealable,
            appeal_required_reviews: input.appeal_required_reviews,
            appealed_at: None,
            appealed_by: None,
            appeal_reason: None,
            decided_by: None,
            completed_at: None,
            declined_at: None,
            due_date: input.due_date,
            vote_settings: input.vote_settings.clone(),
            snapshot_proposal_id: None,
            created_at: Utc::now(),
        };
        state.evaluations.insert(evaluation.id, evaluation.clone());
        Ok(evaluation)
    }

    async fn find_evaluation(&self, id: DbId) -> Result<Option<ProposalEvaluation>, sqlx::Error> {
        Ok(self.state.read().await.evaluations.get(&id).cloned())
    }

    async fn list_evaluations(
        &self,
        proposal_id: DbId,
    ) -> Result<Vec<ProposalEvaluation>, sqlx::Error> {
        let state = self.state.read().await;
        let mut evaluations: Vec<ProposalEvaluation> = state
            .evaluations
            .values()
            .filter(|e| e.proposal_id == proposal_id)
            .cloned()
            .collect();
        evaluations.sort_by_key(|e| e.index);
        Ok(evaluations)
    }

    async fn list_reviews(&self, evaluation_id: DbId) -> Result<Vec<EvaluationReview>, sqlx::Error> {
        Ok(self.state.read().await.reviews_for(false, evaluation_id))
    }

    async fn list_appeal_reviews(
        &self,
        evaluation_id: DbId,
    ) -> Result<Vec<EvaluationReview>, sqlx::Error> {
        Ok(self.state.read().await.reviews_for(true, evaluation_id))
    }

    async fn record_review(
        &self,
        evaluation_id: DbId,
        review: &NewReview,
    ) -> Result<ReviewOutcome, sqlx::Error> {
        let mut state = self.state.write().await;
        let evaluation = state.evaluation(evaluation_id)?.clone();
        if evaluation.result.is_some() {
            return Ok(ReviewOutcome::AlreadyDecided { evaluation });
        }
        state.record(false, evaluation_id, review, evaluation.required_reviews)
    }

    async fn record_appeal_review(
        &self,
        evaluation_id: DbId,
        review: &NewReview,
    ) -> Result<ReviewOutcome, sqlx::Error> {
        let mut state = self.state.write().await;
        let evaluation = state.evaluation(evaluation_id)?.clone();
        let required = appeal_required_reviews(evaluation.appeal_required_reviews);

        let already_passed = evaluation.result.as_deref() == Some(EvaluationResult::Pass.as_str());
        let existing = tally(&state.reviews_for(true, evaluation_id))?;
        if already_passed || existing.decide(required).is_some() {
            return Ok(ReviewOutcome::AlreadyDecided { evaluation });
        }
        state.record(true, evaluation_id, review, required)
    }

    async fn decide_evaluation(
        &self,
        evaluation_id: DbId,
        result: EvaluationResult,
        decided_by: DbId,
    ) -> Result<ReviewOutcome, sqlx::Error> {
        let mut state = self.state.write().await;
        let evaluation = state.evaluation(evaluation_id)?.clone();
        if evaluation.result.is_some() {
            return Ok(ReviewOutcome::AlreadyDecided { evaluation });
        }
        let evaluation = state.write_decision(evaluation_id, result, Some(decided_by))?;
        Ok(ReviewOutcome::Decided { evaluation })
    }

    async fn recompute_result(
        &self,
        evaluation_id: DbId,
    ) -> Result<Option<ProposalEvaluation>, sqlx::Error> {
        let mut state = self.state.write().await;
        let evaluation = state.evaluation(evaluation_id)?.clone();
        if evaluation.result.is_some() {
            return Ok(None);
        }
        let reviews = state.reviews_for(false, evaluation_id);
        let Some(result) = tally(&reviews)?.decide(evaluation.required_reviews) else {
            return Ok(None);
        };
        let last_reviewer = reviews
            .iter()
            .max_by_key(|r| r.completed_at)
            .map(|r| r.reviewer_id);
        state
            .write_decision(evaluation_id, result, last_reviewer)
            .map(Some)
    }

    async fn set_required_reviews(
        &self,
        evaluation_id: DbId,
        required_reviews: i32,
    ) -> Result<ProposalEvaluation, sqlx::Error> {
        let mut state = self.state.write().await;
        let evaluation = state.evaluation_mut(evaluation_id)?;
        evaluation.required_reviews = required_reviews;
        Ok(evaluation.clone())
    }

    async fn appeal_evaluation(
        &self,
        evaluation_id: DbId,
        appealed_by: DbId,
        reason: Option<&str>,
    ) -> Result<Option<ProposalEvaluation>, sqlx::Error> {
        let mut state = self.state.write().await;
        let evaluation = state.evaluation_mut(evaluation_id)?;
        let declined = evaluation.result.as_deref() == Some(EvaluationResult::Fail.as_str());
        if !declined || evaluation.appealed_at.is_some() {
            return Ok(None);
        }
        evaluation.result = None;
        evaluation.decided_by = None;
        evaluation.completed_at = None;
        evaluation.declined_at = None;
        evaluation.appealed_at = Some(Utc::now());
        evaluation.appealed_by = Some(appealed_by);
        evaluation.appeal_reason = reason.map(str::to_string);
        Ok(Some(evaluation.clone()))
    }

    async fn list_rubric_criteria(
        &self,
        proposal_id: DbId,
        evaluation_id: DbId,
    ) -> Result<Vec<RubricCriteria>, sqlx::Error> {
        let state = self.state.read().await;
        let mut criteria: Vec<RubricCriteria> = state
            .criteria
            .values()
            .filter(|c| c.proposal_id == proposal_id && c.evaluation_id == evaluation_id)
            .cloned()
            .collect();
        criteria.sort_by_key(|c| c.index);
        Ok(criteria)
    }

    async fn list_proposal_rubric_criteria(
        &self,
        proposal_id: DbId,
    ) -> Result<Vec<RubricCriteria>, sqlx::Error> {
        let state = self.state.read().await;
        let mut criteria: Vec<RubricCriteria> = state
            .criteria
            .values()
            .filter(|c| c.proposal_id == proposal_id)
            .cloned()
            .collect();
        criteria.sort_by_key(|c| (c.evaluation_id, c.index));
        Ok(criteria)
    }

    async fn replace_rubric_criteria(
        &self,
        proposal_id: DbId,
        evaluation_id: DbId,
        plan: &CriteriaPlan,
    ) -> Result<Vec<RubricCriteria>, sqlx::Error> {
        {
            let mut state = self.state.write().await;
            for id in &plan.delete {
                let in_scope = state
                    .criteria
                    .get(id)
                    .is_some_and(|c| c.proposal_id == proposal_id && c.evaluation_id == evaluation_id);
                if in_scope {
                    state.criteria.remove(id);
                    state.answers.retain(|a| a.rubric_criteria_id != *id);
                    state.draft_answers.retain(|a| a.rubric_criteria_id != *id);
                }
            }
            for write in &plan.writes {
                state.criteria.insert(
                    write.id,
                    RubricCriteria {
                        id: write.id,
                        proposal_id,
                        evaluation_id,
                        index: write.index,
                        title: write.title.clone(),
                        description: write.description.clone(),
                        criteria_type: CRITERIA_TYPE_RANGE.to_string(),
                        parameters: write.parameters.to_json(),
                    },
                );
            }
        }
        self.list_rubric_criteria(proposal_id, evaluation_id).await
    }

    async fn replace_rubric_answers(
        &self,
        scope: AnswerScope,
        answers: &[ValidatedAnswer],
        is_draft: bool,
    ) -> Result<Vec<RubricAnswer>, sqlx::Error> {
        let mut state = self.state.write().await;
        let table = if is_draft {
            &mut state.draft_answers
        } else {
            &mut state.answers
        };
        table.retain(|a| {
            !(a.proposal_id == scope.proposal_id
                && a.evaluation_id == scope.evaluation_id
                && a.user_id == scope.user_id)
        });

        let now = Utc::now();
        let rows: Vec<RubricAnswer> = answers
            .iter()
            .map(|answer| RubricAnswer {
                proposal_id: scope.proposal_id,
                evaluation_id: scope.evaluation_id,
                user_id: scope.user_id,
                rubric_criteria_id: answer.rubric_criteria_id,
                response: answer.response(),
                comment: answer.comment.clone(),
                created_at: now,
            })
            .collect();
        table.extend(rows.iter().cloned());
        Ok(rows)
    }

    async fn list_rubric_answers(
        &self,
        proposal_id: DbId,
        evaluation_id: Option<DbId>,
        is_draft: bool,
    ) -> Result<Vec<RubricAnswer>, sqlx::Error> {
        let state = self.state.read().await;
        let table = if is_draft { &state.draft_answers } else { &state.answers };
        Ok(table
            .iter()
            .filter(|a| a.proposal_id == proposal_id)
            .filter(|a| evaluation_id.map_or(true, |id| a.evaluation_id == id))
            .cloned()
            .collect())
    }

    async fn find_vote_for_evaluation(
        &self,
        evaluation_id: DbId,
    ) -> Result<Option<Vote>, sqlx::Error> {
        let state = self.state.read().await;
        Ok(state
            .votes
            .iter()
            .find(|v| v.evaluation_id == evaluation_id)
            .cloned())
    }

    async fn create_vote(&self, input: &CreateVote) -> Result<Vote, sqlx::Error> {
        let mut state = self.state.write().await;
        if state.votes.iter().any(|v| v.evaluation_id == input.evaluation_id) {
            return Err(sqlx::Error::Protocol(format!(
                "vote already exists for evaluation {}",
                input.evaluation_id
            )));
        }
        let vote = Vote {
            id: DbId::new_v4(),
            proposal_id: input.proposal_id,
            evaluation_id: input.evaluation_id,
            space_id: input.space_id,
            title: input.title.clone(),
            vote_type: input.vote_type.clone(),
            options: input.options.clone(),
            threshold: input.threshold,
            max_choices: input.max_choices,
            deadline: input.deadline,
            status: VOTE_STATUS_IN_PROGRESS.to_string(),
            created_by: input.created_by,
            created_at: Utc::now(),
        };
        state.votes.push(vote.clone());
        Ok(vote)
    }

    async fn insert_event(&self, event: &NewEvent) -> Result<DbId, sqlx::Error> {
        let id = DbId::new_v4();
        self.state.write().await.events.push(Event {
            id,
            event_type: event.event_type.clone(),
            source_entity_type: event.source_entity_type.clone(),
            source_entity_id: event.source_entity_id,
            actor_user_id: event.actor_user_id,
            payload: event.payload.clone(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn list_recent_events(&self, limit: i64) -> Result<Vec<Event>, sqlx::Error> {
        let state = self.state.read().await;
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(state.events.iter().rev().take(limit).cloned().collect())
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        Ok(())
    }
}
