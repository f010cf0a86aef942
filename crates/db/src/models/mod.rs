//! Row models and insert DTOs.

pub mod evaluation;
pub mod event;
pub mod proposal;
pub mod reward;
pub mod rubric;
pub mod vote;
