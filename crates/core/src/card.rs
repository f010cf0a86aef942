//! Board card mapping for proposals.
//!
//! Proposals render as rows of a generic table. Each card carries a flat
//! property map whose keys name the property kind, scoped by evaluation or
//! criteria id where one proposal has several of them.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::{json, Value};

use crate::current_step::ProposalStep;
use crate::evaluation::ProposalStatus;
use crate::rubric::RubricCriterion;
use crate::status::StepResult;
use crate::types::DbId;

pub const PROP_STATUS: &str = "proposalStatus";
pub const PROP_EVALUATION_TYPE: &str = "proposalEvaluationType";
pub const PROP_STEP: &str = "proposalStep";
pub const PROP_URL: &str = "proposalUrl";
pub const PROP_AUTHOR: &str = "proposalAuthor";
pub const PROP_EVALUATED_BY: &str = "proposalEvaluatedBy";
pub const PROP_EVALUATION_TOTAL: &str = "proposalEvaluationTotal";
pub const PROP_EVALUATION_AVERAGE: &str = "proposalEvaluationAverage";
pub const PROP_CRITERIA_TOTAL: &str = "proposalRubricCriteriaTotal";
pub const PROP_CRITERIA_AVERAGE: &str = "proposalRubricCriteriaAverage";
pub const PROP_REVIEWER_SCORE: &str = "proposalRubricCriteriaReviewerScore";
pub const PROP_REVIEWER_COMMENT: &str = "proposalRubricCriteriaReviewerComment";

/// One stored rubric answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredAnswer {
    pub user_id: DbId,
    pub rubric_criteria_id: DbId,
    pub score: i64,
    pub comment: Option<String>,
}

/// A rubric step with its criteria and final answers.
#[derive(Debug, Clone)]
pub struct RubricScores {
    pub evaluation_id: DbId,
    pub title: String,
    pub criteria: Vec<RubricCriterion>,
    pub answers: Vec<ScoredAnswer>,
}

/// Inputs for mapping one proposal.
#[derive(Debug, Clone)]
pub struct CardSource<'a> {
    pub proposal_id: DbId,
    pub title: &'a str,
    pub path: &'a str,
    pub status: ProposalStatus,
    pub authors: &'a [DbId],
    pub current_step: &'a ProposalStep,
    pub rubrics: &'a [RubricScores],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposalCard {
    pub id: DbId,
    pub title: String,
    pub properties: BTreeMap<String, Value>,
}

fn scoped(kind: &str, id: DbId) -> String {
    format!("{kind}:{id}")
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn sum_and_average(scores: impl Iterator<Item = i64>) -> (i64, Option<f64>) {
    let (total, count) = scores.fold((0i64, 0i64), |(t, c), s| (t + s, c + 1));
    let average = (count > 0).then(|| round2(total as f64 / count as f64));
    (total, average)
}

/// Adapt a proposal into a board card.
pub fn map_proposal_to_card(source: &CardSource<'_>) -> ProposalCard {
    let mut properties = BTreeMap::new();

    let result = if source.status == ProposalStatus::Archived {
        StepResult::Archived
    } else {
        source.current_step.result
    };
    properties.insert(PROP_STATUS.to_string(), json!(result.as_str()));
    properties.insert(
        PROP_EVALUATION_TYPE.to_string(),
        json!(source.current_step.step.as_str()),
    );
    properties.insert(PROP_STEP.to_string(), json!(source.current_step.title));
    properties.insert(PROP_URL.to_string(), json!(source.path));
    properties.insert(PROP_AUTHOR.to_string(), json!(source.authors));

    for rubric in source.rubrics {
        let evaluated_by: BTreeSet<DbId> = rubric.answers.iter().map(|a| a.user_id).collect();
        properties.insert(
            scoped(PROP_EVALUATED_BY, rubric.evaluation_id),
            json!(evaluated_by),
        );

        let (total, average) = sum_and_average(rubric.answers.iter().map(|a| a.score));
        properties.insert(scoped(PROP_EVALUATION_TOTAL, rubric.evaluation_id), json!(total));
        properties.insert(
            scoped(PROP_EVALUATION_AVERAGE, rubric.evaluation_id),
            json!(average),
        );

        for criterion in &rubric.criteria {
            let answers: Vec<&ScoredAnswer> = rubric
                .answers
                .iter()
                .filter(|a| a.rubric_criteria_id == criterion.id)
                .collect();

            let (total, average) = sum_and_average(answers.iter().map(|a| a.score));
            properties.insert(scoped(PROP_CRITERIA_TOTAL, criterion.id), json!(total));
            properties.insert(scoped(PROP_CRITERIA_AVERAGE, criterion.id), json!(average));

            for answer in answers {
                let key = format!("{}:{}", criterion.id, answer.user_id);
                properties.insert(format!("{PROP_REVIEWER_SCORE}:{key}"), json!(answer.score));
                if let Some(comment) = &answer.comment {
                    properties.insert(format!("{PROP_REVIEWER_COMMENT}:{key}"), json!(comment));
                }
            }
        }
    }

    ProposalCard {
        id: source.proposal_id,
        title: source.title.to_string(),
        properties,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::current_step::ProposalStep;
    use crate::rubric::RangeParameters;
    use crate::status::ProposalStepKind;

    fn criterion(title: &str) -> RubricCriterion {
        RubricCriterion {
            id: DbId::new_v4(),
            index: 0,
            title: title.into(),
            description: None,
            parameters: RangeParameters { min: 1, max: 10 },
        }
    }

    fn step(title: &str, result: StepResult) -> ProposalStep {
        ProposalStep {
            title: title.into(),
            step: ProposalStepKind::Rubric,
            result,
            id: Some(DbId::new_v4()),
            index: 2,
            required_reviews: 1,
            final_step: None,
            appealed_at: None,
            due_date: None,
        }
    }

    #[test]
    fn maps_rubric_totals_and_averages() {
        let admin = DbId::new_v4();
        let reviewer = DbId::new_v4();
        let first = criterion("Impact");
        let second = criterion("Clarity");
        let rubric = RubricScores {
            evaluation_id: DbId::new_v4(),
            title: "Rubric evaluation 1".into(),
            criteria: vec![first.clone(), second.clone()],
            answers: vec![
                ScoredAnswer { user_id: admin, rubric_criteria_id: first.id, score: 5, comment: None },
                ScoredAnswer { user_id: admin, rubric_criteria_id: second.id, score: 4, comment: None },
                ScoredAnswer {
                    user_id: reviewer,
                    rubric_criteria_id: first.id,
                    score: 7,
                    comment: Some("solid".into()),
                },
                ScoredAnswer { user_id: reviewer, rubric_criteria_id: second.id, score: 7, comment: None },
            ],
        };
        let current = step("Rubric evaluation 2", StepResult::Pass);
        let authors = [admin];
        let rubrics = [rubric.clone()];
        let card = map_proposal_to_card(&CardSource {
            proposal_id: DbId::new_v4(),
            title: "Grant",
            path: "page-123",
            status: ProposalStatus::Published,
            authors: &authors,
            current_step: &current,
            rubrics: &rubrics,
        });

        let p = &card.properties;
        assert_eq!(p[PROP_STATUS], json!("pass"));
        assert_eq!(p[PROP_EVALUATION_TYPE], json!("rubric"));
        assert_eq!(p[PROP_STEP], json!("Rubric evaluation 2"));
        assert_eq!(p[PROP_URL], json!("page-123"));
        assert_eq!(p[&scoped(PROP_EVALUATION_TOTAL, rubric.evaluation_id)], json!(23));
        assert_eq!(p[&scoped(PROP_EVALUATION_AVERAGE, rubric.evaluation_id)], json!(5.75));
        assert_eq!(p[&scoped(PROP_CRITERIA_TOTAL, first.id)], json!(12));
        assert_eq!(p[&scoped(PROP_CRITERIA_AVERAGE, second.id)], json!(5.5));

        let evaluated_by = p[&scoped(PROP_EVALUATED_BY, rubric.evaluation_id)]
            .as_array()
            .unwrap()
            .len();
        assert_eq!(evaluated_by, 2);

        let comment_key = format!("{PROP_REVIEWER_COMMENT}:{}:{reviewer}", first.id);
        assert_eq!(p[&comment_key], json!("solid"));
        let score_key = format!("{PROP_REVIEWER_SCORE}:{}:{admin}", second.id);
        assert_eq!(p[&score_key], json!(4));
    }

    #[test]
    fn average_rounds_to_two_decimals() {
        let (total, average) = sum_and_average([1, 1, 2].into_iter());
        assert_eq!(total, 4);
        assert_eq!(average, Some(1.33));
    }

    #[test]
    fn unanswered_criteria_has_no_average() {
        let c = criterion("Impact");
        let rubric = RubricScores {
            evaluation_id: DbId::new_v4(),
            title: "Rubric".into(),
            criteria: vec![c.clone()],
            answers: vec![],
        };
        let current = step("Rubric", StepResult::InProgress);
        let rubrics = [rubric];
        let card = map_proposal_to_card(&CardSource {
            proposal_id: DbId::new_v4(),
            title: "Grant",
            path: "p",
            status: ProposalStatus::Published,
            authors: &[],
            current_step: &current,
            rubrics: &rubrics,
        });
        assert_eq!(card.properties[&scoped(PROP_CRITERIA_TOTAL, c.id)], json!(0));
        assert_eq!(card.properties[&scoped(PROP_CRITERIA_AVERAGE, c.id)], Value::Null);
    }

    #[test]
    fn archived_proposal_reports_archived_status() {
        let current = step("Rubric", StepResult::InProgress);
        let card = map_proposal_to_card(&CardSource {
            proposal_id: DbId::new_v4(),
            title: "Old",
            path: "p",
            status: ProposalStatus::Archived,
            authors: &[],
            current_step: &current,
            rubrics: &[],
        });
        assert_eq!(card.properties[PROP_STATUS], json!("archived"));
    }
}
