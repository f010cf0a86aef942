//! Rubric criteria and answer validation.
//!
//! Criteria define scored ranges on a rubric step; answers carry one score
//! per criteria per reviewer. Everything here runs before any write, so a
//! validation error leaves the stored answer and criteria sets untouched.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::types::DbId;

/// The only supported criteria type.
pub const CRITERIA_TYPE_RANGE: &str = "range";

/// Index value clients send to mean "not positioned yet".
pub const UNSET_INDEX: i32 = -1;

/// Inclusive score bounds of a range criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeParameters {
    pub min: i64,
    pub max: i64,
}

impl RangeParameters {
    pub fn contains(&self, score: i64) -> bool {
        self.min <= score && score <= self.max
    }

    pub fn to_json(self) -> Value {
        serde_json::json!({ "min": self.min, "max": self.max })
    }
}

/// A stored criteria as validation and card mapping see it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RubricCriterion {
    pub id: DbId,
    pub index: i32,
    pub title: String,
    pub description: Option<String>,
    pub parameters: RangeParameters,
}

/// One criteria as submitted for upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RubricCriteriaInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub index: Option<i32>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub criteria_type: String,
    #[serde(default)]
    pub parameters: Value,
}

/// One answer as submitted for upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RubricAnswerInput {
    pub rubric_criteria_id: String,
    #[serde(default)]
    pub response: Value,
    #[serde(default)]
    pub comment: Option<String>,
}

/// An answer that passed validation, ready to insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedAnswer {
    pub rubric_criteria_id: DbId,
    pub score: i64,
    pub comment: Option<String>,
}

impl ValidatedAnswer {
    /// The stored `response` document.
    pub fn response(&self) -> Value {
        serde_json::json!({ "score": self.score })
    }
}

/// A criteria row to insert or update after reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriteriaWrite {
    pub id: DbId,
    pub index: i32,
    pub title: String,
    pub description: Option<String>,
    pub parameters: RangeParameters,
    /// True when `id` matched an existing row.
    pub existing: bool,
}

/// The writes needed to replace a step's criteria set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CriteriaPlan {
    pub delete: Vec<DbId>,
    pub writes: Vec<CriteriaWrite>,
}

// ---------------------------------------------------------------------------
// Criteria
// ---------------------------------------------------------------------------

/// Read an integer bound that may be sent as a number or an integer string.
fn integer_bound(value: Option<&Value>, name: &str, title: &str) -> Result<i64, CoreError> {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        CoreError::InvalidInput(format!(
            "Criteria \"{title}\" must have an integer {name} value"
        ))
    })
}

/// Parse and check `{min, max}` range parameters.
pub fn parse_range_parameters(parameters: &Value, title: &str) -> Result<RangeParameters, CoreError> {
    let min = integer_bound(parameters.get("min"), "min", title)?;
    let max = integer_bound(parameters.get("max"), "max", title)?;
    if min >= max {
        return Err(CoreError::InvalidInput(format!(
            "Criteria \"{title}\" must have a min value ({min}) lower than its max value ({max})"
        )));
    }
    Ok(RangeParameters { min, max })
}

/// Validate submitted criteria and plan the writes that replace `existing`.
///
/// Rows whose id is absent from `inputs` are deleted, matching ids are
/// updated in place, and everything else receives a fresh id. An unset or
/// `-1` index falls back to the array position.
pub fn plan_criteria_upsert(
    existing: &[DbId],
    inputs: &[RubricCriteriaInput],
) -> Result<CriteriaPlan, CoreError> {
    let existing: HashSet<DbId> = existing.iter().copied().collect();
    let mut writes = Vec::with_capacity(inputs.len());
    let mut kept = HashSet::new();

    for (position, input) in inputs.iter().enumerate() {
        if input.criteria_type != CRITERIA_TYPE_RANGE {
            return Err(CoreError::InvalidInput(format!(
                "Unsupported criteria type '{}'. Must be '{CRITERIA_TYPE_RANGE}'",
                input.criteria_type
            )));
        }
        let parameters = parse_range_parameters(&input.parameters, &input.title)?;

        let requested = match input.id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(crate::types::parse_id(raw, "rubricCriteriaId")?),
        };
        let matched = requested.filter(|id| existing.contains(id) && !kept.contains(id));
        let id = match matched {
            Some(id) => {
                kept.insert(id);
                id
            }
            None => DbId::new_v4(),
        };

        let index = match input.index {
            Some(i) if i != UNSET_INDEX => i,
            _ => position as i32,
        };

        writes.push(CriteriaWrite {
            id,
            index,
            title: input.title.clone(),
            description: input.description.clone(),
            parameters,
            existing: matched.is_some(),
        });
    }

    let mut delete: Vec<DbId> = existing.difference(&kept).copied().collect();
    delete.sort();

    Ok(CriteriaPlan { delete, writes })
}

// ---------------------------------------------------------------------------
// Answers
// ---------------------------------------------------------------------------

/// Coerce a JSON score to an integer, truncating toward zero.
fn integer_score(response: &Value) -> Option<i64> {
    match response.get("score") {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        _ => None,
    }
}

/// Validate answers against the criteria of one (proposal, evaluation).
///
/// `criteria` must already be scoped to the evaluation the answers are for;
/// any answer pointing elsewhere is rejected.
pub fn validate_answers(
    answers: &[RubricAnswerInput],
    criteria: &[RubricCriterion],
) -> Result<Vec<ValidatedAnswer>, CoreError> {
    let by_id: HashMap<DbId, &RubricCriterion> = criteria.iter().map(|c| (c.id, c)).collect();

    let mut parsed = Vec::with_capacity(answers.len());
    let mut invalid_scores = Vec::new();
    for answer in answers {
        let criteria_id = crate::types::parse_id(&answer.rubric_criteria_id, "rubricCriteriaId")?;
        match integer_score(&answer.response) {
            Some(score) => parsed.push((criteria_id, score, answer.comment.clone())),
            None => invalid_scores.push(
                by_id
                    .get(&criteria_id)
                    .map(|c| c.title.clone())
                    .unwrap_or_else(|| criteria_id.to_string()),
            ),
        }
    }
    if !invalid_scores.is_empty() {
        return Err(CoreError::InvalidInput(format!(
            "Scores must be numeric for criteria: {}",
            invalid_scores.join(", ")
        )));
    }

    let mut seen = HashSet::new();
    let mut validated = Vec::with_capacity(parsed.len());
    for (criteria_id, score, comment) in parsed {
        let Some(criterion) = by_id.get(&criteria_id) else {
            return Err(CoreError::InvalidInput(format!(
                "Rubric criteria {criteria_id} does not belong to this evaluation"
            )));
        };
        if !seen.insert(criteria_id) {
            return Err(CoreError::InvalidInput(format!(
                "Criteria \"{}\" was answered more than once",
                criterion.title
            )));
        }
        if !criterion.parameters.contains(score) {
            return Err(CoreError::InvalidInput(format!(
                "Score {score} for criteria \"{}\" must be between {} and {}",
                criterion.title, criterion.parameters.min, criterion.parameters.max
            )));
        }
        validated.push(ValidatedAnswer {
            rubric_criteria_id: criteria_id,
            score,
            comment,
        });
    }

    Ok(validated)
}
