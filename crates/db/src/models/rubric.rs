//! Rubric criteria and answer models.

use charm_core::card::ScoredAnswer;
use charm_core::error::CoreError;
use charm_core::rubric::{parse_range_parameters, RubricCriterion};
use charm_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `proposal_rubric_criteria` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RubricCriteria {
    pub id: DbId,
    pub proposal_id: DbId,
    pub evaluation_id: DbId,
    pub index: i32,
    pub title: String,
    pub description: Option<String>,
    pub criteria_type: String,
    pub parameters: serde_json::Value,
}

impl RubricCriteria {
    pub fn to_criterion(&self) -> Result<RubricCriterion, CoreError> {
        Ok(RubricCriterion {
            id: self.id,
            index: self.index,
            title: self.title.clone(),
            description: self.description.clone(),
            parameters: parse_range_parameters(&self.parameters, &self.title)?,
        })
    }
}

/// A row from `proposal_rubric_criteria_answers` or its draft twin.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RubricAnswer {
    pub proposal_id: DbId,
    pub evaluation_id: DbId,
    pub user_id: DbId,
    pub rubric_criteria_id: DbId,
    pub response: serde_json::Value,
    pub comment: Option<String>,
    pub created_at: Timestamp,
}

impl RubricAnswer {
    /// Stored answers always hold an integer score; anything else is skipped.
    pub fn to_scored(&self) -> Option<ScoredAnswer> {
        let score = self.response.get("score")?.as_i64()?;
        Some(ScoredAnswer {
            user_id: self.user_id,
            rubric_criteria_id: self.rubric_criteria_id,
            score,
            comment: self.comment.clone(),
        })
    }
}

/// The (proposal, evaluation, reviewer) an answer set belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerScope {
    pub proposal_id: DbId,
    pub evaluation_id: DbId,
    pub user_id: DbId,
}
