//! Vote step settings and in-app vote creation parameters.

use std::collections::HashSet;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

/// Status every in-app vote starts in.
pub const VOTE_STATUS_IN_PROGRESS: &str = "InProgress";

/// Longest allowed voting window.
pub const MAX_DURATION_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteType {
    Approval,
    SingleChoice,
    MultiChoice,
}

impl VoteType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approval => "Approval",
            Self::SingleChoice => "SingleChoice",
            Self::MultiChoice => "MultiChoice",
        }
    }
}

/// Where the vote is held. Snapshot votes are published externally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteStrategy {
    #[default]
    Regular,
    Token,
    Snapshot,
}

/// Settings stored on a vote evaluation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteSettings {
    #[serde(rename = "type")]
    pub vote_type: VoteType,
    /// Percentage of the vote an option needs to pass.
    pub threshold: f64,
    pub options: Vec<String>,
    pub max_choices: i32,
    pub duration_days: i64,
    #[serde(default)]
    pub strategy: VoteStrategy,
}

impl VoteSettings {
    /// Parse settings from a stored JSON document.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, CoreError> {
        serde_json::from_value(value.clone())
            .map_err(|e| CoreError::InvalidInput(format!("Invalid vote settings: {e}")))
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if !(self.threshold > 0.0 && self.threshold <= 100.0) {
            return Err(CoreError::InvalidInput(format!(
                "Vote threshold must be within (0, 100], got {}",
                self.threshold
            )));
        }
        if self.options.is_empty() {
            return Err(CoreError::InvalidInput(
                "Vote must have at least one option".into(),
            ));
        }
        let mut seen = HashSet::new();
        for option in &self.options {
            let trimmed = option.trim();
            if trimmed.is_empty() {
                return Err(CoreError::InvalidInput("Vote options must not be empty".into()));
            }
            if !seen.insert(trimmed) {
                return Err(CoreError::InvalidInput(format!(
                    "Duplicate vote option '{trimmed}'"
                )));
            }
        }
        if self.max_choices < 1 {
            return Err(CoreError::InvalidInput(
                "Vote max choices must be at least 1".into(),
            ));
        }
        if !(1..=MAX_DURATION_DAYS).contains(&self.duration_days) {
            return Err(CoreError::InvalidInput(format!(
                "Vote duration must be between 1 and {MAX_DURATION_DAYS} days, got {}",
                self.duration_days
            )));
        }
        Ok(())
    }

    /// Whether reaching this step creates a vote inside the platform.
    pub fn creates_in_app_vote(&self) -> bool {
        self.strategy != VoteStrategy::Snapshot
    }

    /// Vote closing time for a vote opened at `now`.
    pub fn deadline(&self, now: Timestamp) -> Timestamp {
        now + Duration::days(self.duration_days)
    }
}
