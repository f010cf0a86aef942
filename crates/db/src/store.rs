//! The storage seam services are written against.

use async_trait::async_trait;
use charm_core::evaluation::EvaluationResult;
use charm_core::rubric::{CriteriaPlan, ValidatedAnswer};
use charm_core::types::{DbId, Timestamp};

use crate::models::evaluation::{
    CreateEvaluation, EvaluationReview, NewReview, ProposalEvaluation, ReviewOutcome,
};
use crate::models::event::{Event, NewEvent};
use crate::models::proposal::{CreateProposal, Page, Proposal, ProposalFilter};
use crate::models::reward::{IssuedCredential, ProposalReward};
use crate::models::rubric::{AnswerScope, RubricAnswer, RubricCriteria};
use crate::models::vote::{CreateVote, Vote};
use crate::repositories::evaluation_repo::ReviewTable;
use crate::repositories::{
    EvaluationRepo, EventRepo, ProposalRepo, RewardRepo, RubricAnswerRepo, RubricCriteriaRepo,
    VoteRepo,
};
use crate::DbPool;

/// Persistence operations the proposal services need.
///
/// Methods that decide an evaluation (`record_review`,
/// `record_appeal_review`, `decide_evaluation`, `recompute_result`) must
/// serialise concurrent calls for the same evaluation and re-check its
/// state after acquiring exclusive access.
#[async_trait]
pub trait ProposalStore: Send + Sync {
    // -- proposals and pages ------------------------------------------------

    async fn create_proposal(&self, input: &CreateProposal) -> Result<Proposal, sqlx::Error>;

    async fn find_proposal(&self, id: DbId) -> Result<Option<Proposal>, sqlx::Error>;

    async fn list_proposals(
        &self,
        space_id: DbId,
        filter: &ProposalFilter,
    ) -> Result<Vec<Proposal>, sqlx::Error>;

    async fn set_proposal_status(
        &self,
        id: DbId,
        status: &str,
        published_at: Option<Timestamp>,
    ) -> Result<Proposal, sqlx::Error>;

    async fn find_page(&self, id: DbId) -> Result<Option<Page>, sqlx::Error>;

    async fn touch_page(&self, id: DbId) -> Result<(), sqlx::Error>;

    // -- rewards and credentials --------------------------------------------

    async fn publish_pending_rewards(
        &self,
        proposal_id: DbId,
    ) -> Result<Vec<ProposalReward>, sqlx::Error>;

    async fn list_rewards(&self, proposal_id: DbId) -> Result<Vec<ProposalReward>, sqlx::Error>;

    async fn list_issued_credentials(
        &self,
        proposal_id: DbId,
    ) -> Result<Vec<IssuedCredential>, sqlx::Error>;

    // -- evaluations --------------------------------------------------------

    async fn create_evaluation(
        &self,
        proposal_id: DbId,
        input: &CreateEvaluation,
    ) -> Result<ProposalEvaluation, sqlx::Error>;

    async fn find_evaluation(&self, id: DbId) -> Result<Option<ProposalEvaluation>, sqlx::Error>;

    async fn list_evaluations(
        &self,
        proposal_id: DbId,
    ) -> Result<Vec<ProposalEvaluation>, sqlx::Error>;

    async fn list_reviews(&self, evaluation_id: DbId) -> Result<Vec<EvaluationReview>, sqlx::Error>;

    async fn list_appeal_reviews(
        &self,
        evaluation_id: DbId,
    ) -> Result<Vec<EvaluationReview>, sqlx::Error>;

    async fn record_review(
        &self,
        evaluation_id: DbId,
        review: &NewReview,
    ) -> Result<ReviewOutcome, sqlx::Error>;

    async fn record_appeal_review(
        &self,
        evaluation_id: DbId,
        review: &NewReview,
    ) -> Result<ReviewOutcome, sqlx::Error>;

    async fn decide_evaluation(
        &self,
        evaluation_id: DbId,
        result: EvaluationResult,
        decided_by: DbId,
    ) -> Result<ReviewOutcome, sqlx::Error>;

    async fn recompute_result(
        &self,
        evaluation_id: DbId,
    ) -> Result<Option<ProposalEvaluation>, sqlx::Error>;

    async fn set_required_reviews(
        &self,
        evaluation_id: DbId,
        required_reviews: i32,
    ) -> Result<ProposalEvaluation, sqlx::Error>;

    async fn appeal_evaluation(
        &self,
        evaluation_id: DbId,
        appealed_by: DbId,
        reason: Option<&str>,
    ) -> Result<Option<ProposalEvaluation>, sqlx::Error>;

    // -- rubric -------------------------------------------------------------

    async fn list_rubric_criteria(
        &self,
        proposal_id: DbId,
        evaluation_id: DbId,
    ) -> Result<Vec<RubricCriteria>, sqlx::Error>;

    async fn list_proposal_rubric_criteria(
        &self,
        proposal_id: DbId,
    ) -> Result<Vec<RubricCriteria>, sqlx::Error>;

    async fn replace_rubric_criteria(
        &self,
        proposal_id: DbId,
        evaluation_id: DbId,
        plan: &CriteriaPlan,
    ) -> Result<Vec<RubricCriteria>, sqlx::Error>;

    async fn replace_rubric_answers(
        &self,
        scope: AnswerScope,
        answers: &[ValidatedAnswer],
        is_draft: bool,
    ) -> Result<Vec<RubricAnswer>, sqlx::Error>;

    async fn list_rubric_answers(
        &self,
        proposal_id: DbId,
        evaluation_id: Option<DbId>,
        is_draft: bool,
    ) -> Result<Vec<RubricAnswer>, sqlx::Error>;

    // -- votes --------------------------------------------------------------

    async fn find_vote_for_evaluation(
        &self,
        evaluation_id: DbId,
    ) -> Result<Option<Vote>, sqlx::Error>;

    async fn create_vote(&self, input: &CreateVote) -> Result<Vote, sqlx::Error>;

    // -- events -------------------------------------------------------------

    async fn insert_event(&self, event: &NewEvent) -> Result<DbId, sqlx::Error>;

    async fn list_recent_events(&self, limit: i64) -> Result<Vec<Event>, sqlx::Error>;

    /// Confirm the backing storage is reachable.
    async fn ping(&self) -> Result<(), sqlx::Error>;
}

/// Postgres-backed store delegating to the repositories.
#[derive(Clone)]
pub struct PgProposalStore {
    pool: DbPool,
}

impl PgProposalStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl ProposalStore for PgProposalStore {
    async fn create_proposal(&self, input: &CreateProposal) -> Result<Proposal, sqlx::Error> {
        ProposalRepo::create(&self.pool, input).await
    }

    async fn find_proposal(&self, id: DbId) -> Result<Option<Proposal>, sqlx::Error> {
        ProposalRepo::find_by_id(&self.pool, id).await
    }

    async fn list_proposals(
        &self,
        space_id: DbId,
        filter: &ProposalFilter,
    ) -> Result<Vec<Proposal>, sqlx::Error> {
        ProposalRepo::list_by_space(&self.pool, space_id, filter).await
    }

    async fn set_proposal_status(
        &self,
        id: DbId,
        status: &str,
        published_at: Option<Timestamp>,
    ) -> Result<Proposal, sqlx::Error> {
        ProposalRepo::set_status(&self.pool, id, status, published_at).await
    }

    async fn find_page(&self, id: DbId) -> Result<Option<Page>, sqlx::Error> {
        ProposalRepo::find_page(&self.pool, id).await
    }

    async fn touch_page(&self, id: DbId) -> Result<(), sqlx::Error> {
        ProposalRepo::touch_page(&self.pool, id).await
    }

    async fn publish_pending_rewards(
        &self,
        proposal_id: DbId,
    ) -> Result<Vec<ProposalReward>, sqlx::Error> {
        ProposalRepo::publish_pending_rewards(&self.pool, proposal_id).await
    }

    async fn list_rewards(&self, proposal_id: DbId) -> Result<Vec<ProposalReward>, sqlx::Error> {
        RewardRepo::list_rewards(&self.pool, proposal_id).await
    }

    async fn list_issued_credentials(
        &self,
        proposal_id: DbId,
    ) -> Result<Vec<IssuedCredential>, sqlx::Error> {
        RewardRepo::list_issued_credentials(&self.pool, proposal_id).await
    }

    async fn create_evaluation(
        &self,
        proposal_id: DbId,
        input: &CreateEvaluation,
    ) -> Result<ProposalEvaluation, sqlx::Error> {
        EvaluationRepo::create(&self.pool, proposal_id, input).await
    }

    async fn find_evaluation(&self, id: DbId) -> Result<Option<ProposalEvaluation>, sqlx::Error> {
        EvaluationRepo::find_by_id(&self.pool, id).await
    }

    async fn list_evaluations(
        &self,
        proposal_id: DbId,
    ) -> Result<Vec<ProposalEvaluation>, sqlx::Error> {
        EvaluationRepo::list_by_proposal(&self.pool, proposal_id).await
    }

    async fn list_reviews(&self, evaluation_id: DbId) -> Result<Vec<EvaluationReview>, sqlx::Error> {
        EvaluationRepo::list_reviews(&self.pool, ReviewTable::Reviews, evaluation_id).await
    }

    async fn list_appeal_reviews(
        &self,
        evaluation_id: DbId,
    ) -> Result<Vec<EvaluationReview>, sqlx::Error> {
        EvaluationRepo::list_reviews(&self.pool, ReviewTable::AppealReviews, evaluation_id).await
    }

    async fn record_review(
        &self,
        evaluation_id: DbId,
        review: &NewReview,
    ) -> Result<ReviewOutcome, sqlx::Error> {
        EvaluationRepo::record_review(&self.pool, evaluation_id, review).await
    }

    async fn record_appeal_review(
        &self,
        evaluation_id: DbId,
        review: &NewReview,
    ) -> Result<ReviewOutcome, sqlx::Error> {
        EvaluationRepo::record_appeal_review(&self.pool, evaluation_id, review).await
    }

    async fn decide_evaluation(
        &self,
        evaluation_id: DbId,
        result: EvaluationResult,
        decided_by: DbId,
    ) -> Result<ReviewOutcome, sqlx::Error> {
        EvaluationRepo::decide(&self.pool, evaluation_id, result, decided_by).await
    }

    async fn recompute_result(
        &self,
        evaluation_id: DbId,
    ) -> Result<Option<ProposalEvaluation>, sqlx::Error> {
        EvaluationRepo::recompute_result(&self.pool, evaluation_id).await
    }

    async fn set_required_reviews(
        &self,
        evaluation_id: DbId,
        required_reviews: i32,
    ) -> Result<ProposalEvaluation, sqlx::Error> {
        EvaluationRepo::set_required_reviews(&self.pool, evaluation_id, required_reviews).await
    }

    async fn appeal_evaluation(
        &self,
        evaluation_id: DbId,
        appealed_by: DbId,
        reason: Option<&str>,
    ) -> Result<Option<ProposalEvaluation>, sqlx::Error> {
        EvaluationRepo::appeal(&self.pool, evaluation_id, appealed_by, reason).await
    }

    async fn list_rubric_criteria(
        &self,
        proposal_id: DbId,
        evaluation_id: DbId,
    ) -> Result<Vec<RubricCriteria>, sqlx::Error> {
        RubricCriteriaRepo::list(&self.pool, proposal_id, evaluation_id).await
    }

    async fn list_proposal_rubric_criteria(
        &self,
        proposal_id: DbId,
    ) -> Result<Vec<RubricCriteria>, sqlx::Error> {
        RubricCriteriaRepo::list_by_proposal(&self.pool, proposal_id).await
    }

    async fn replace_rubric_criteria(
        &self,
        proposal_id: DbId,
        evaluation_id: DbId,
        plan: &CriteriaPlan,
    ) -> Result<Vec<RubricCriteria>, sqlx::Error> {
        RubricCriteriaRepo::replace(&self.pool, proposal_id, evaluation_id, plan).await
    }

    async fn replace_rubric_answers(
        &self,
        scope: AnswerScope,
        answers: &[ValidatedAnswer],
        is_draft: bool,
    ) -> Result<Vec<RubricAnswer>, sqlx::Error> {
        RubricAnswerRepo::replace(&self.pool, scope, answers, is_draft).await
    }

    async fn list_rubric_answers(
        &self,
        proposal_id: DbId,
        evaluation_id: Option<DbId>,
        is_draft: bool,
    ) -> Result<Vec<RubricAnswer>, sqlx::Error> {
        RubricAnswerRepo::list(&self.pool, proposal_id, evaluation_id, is_draft).await
    }

    async fn find_vote_for_evaluation(
        &self,
        evaluation_id: DbId,
    ) -> Result<Option<Vote>, sqlx::Error> {
        VoteRepo::find_by_evaluation(&self.pool, evaluation_id).await
    }

    async fn create_vote(&self, input: &CreateVote) -> Result<Vote, sqlx::Error> {
        VoteRepo::create(&self.pool, input).await
    }

    async fn insert_event(&self, event: &NewEvent) -> Result<DbId, sqlx::Error> {
        EventRepo::insert(&self.pool, event).await
    }

    async fn list_recent_events(&self, limit: i64) -> Result<Vec<Event>, sqlx::Error> {
        EventRepo::list_recent(&self.pool, limit).await
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        crate::health_check(&self.pool).await
    }
}
