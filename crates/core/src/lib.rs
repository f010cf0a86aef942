//! Proposal evaluation domain logic.
//!
//! Pure types and functions shared by the store, event and API crates:
//!
//! - [`evaluation`] and [`status`]: step types, results and the status table.
//! - [`current_step`]: which step a proposal is on, including the Draft,
//!   Rewards and Credentials pseudo-steps.
//! - [`aggregation`]: majority decisions over reviewer submissions.
//! - [`rubric`]: criteria reconciliation and answer validation.
//! - [`projection`]: flag derivation feeding the resolver.
//! - [`card`]: board card mapping for table views.

pub mod aggregation;
pub mod card;
pub mod current_step;
pub mod error;
pub mod evaluation;
pub mod projection;
pub mod publish;
pub mod rubric;
pub mod status;
pub mod types;
pub mod vote;
