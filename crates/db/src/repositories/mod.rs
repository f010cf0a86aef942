//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. Multi-row writes open their own
//! transaction.

pub mod evaluation_repo;
pub mod event_repo;
pub mod proposal_repo;
pub mod reward_repo;
pub mod rubric_answer_repo;
pub mod rubric_criteria_repo;
pub mod vote_repo;

pub use evaluation_repo::EvaluationRepo;
pub use event_repo::EventRepo;
pub use proposal_repo::ProposalRepo;
pub use reward_repo::RewardRepo;
pub use rubric_answer_repo::RubricAnswerRepo;
pub use rubric_criteria_repo::RubricCriteriaRepo;
pub use vote_repo::VoteRepo;
