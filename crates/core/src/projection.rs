//! Proposal projection: derives the resolver's flags from the full aggregate.

use std::collections::HashSet;

use serde::Serialize;

use crate::current_step::{get_current_step, ProposalStep, StepFlags};
use crate::evaluation::{EvaluationStep, ProposalStatus};
use crate::status::{get_proposal_evaluation_status, EvaluationStatus, StepResult};
use crate::types::DbId;

/// Everything needed to resolve a proposal's current step.
#[derive(Debug, Clone)]
pub struct ProposalProjection {
    status: ProposalStatus,
    evaluations: Vec<EvaluationStep>,
    pending_rewards: usize,
    published_rewards: usize,
    selected_credential_templates: Vec<String>,
    issued_credential_templates: HashSet<String>,
}

/// Resolved display state of a proposal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedStep {
    pub current_step: ProposalStep,
    pub evaluation_status: EvaluationStatus,
}

impl ProposalProjection {
    pub fn new(status: ProposalStatus, evaluations: Vec<EvaluationStep>) -> Self {
        Self {
            status,
            evaluations,
            pending_rewards: 0,
            published_rewards: 0,
            selected_credential_templates: Vec::new(),
            issued_credential_templates: HashSet::new(),
        }
    }

    pub fn with_pending_rewards(mut self, count: usize) -> Self {
        self.pending_rewards = count;
        self
    }

    pub fn with_published_rewards(mut self, count: usize) -> Self {
        self.published_rewards = count;
        self
    }

    pub fn with_selected_credentials(mut self, template_ids: Vec<String>) -> Self {
        self.selected_credential_templates = template_ids;
        self
    }

    pub fn with_issued_credentials<I>(mut self, template_ids: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        self.issued_credential_templates = template_ids.into_iter().collect();
        self
    }

    pub fn flags(&self) -> StepFlags {
        StepFlags {
            has_pending_rewards: self.pending_rewards > 0,
            has_published_rewards: self.published_rewards > 0,
            credentials_enabled: !self.selected_credential_templates.is_empty(),
            has_pending_credentials: self
                .selected_credential_templates
                .iter()
                .any(|id| !self.issued_credential_templates.contains(id)),
        }
    }

    pub fn current_step(&self) -> ProposalStep {
        get_current_step(&self.evaluations, self.status, self.flags())
    }

    /// Resolve the current step and its status. Archived proposals report
    /// `archived` whatever step they stopped on.
    pub fn resolve(&self) -> ResolvedStep {
        let current_step = self.current_step();
        let result = if self.status == ProposalStatus::Archived {
            StepResult::Archived
        } else {
            current_step.result
        };
        ResolvedStep {
            evaluation_status: get_proposal_evaluation_status(current_step.step, result),
            current_step,
        }
    }
}

/// Look up an evaluation id among a proposal's steps.
pub fn find_evaluation(evaluations: &[EvaluationStep], id: DbId) -> Option<&EvaluationStep> {
    evaluations.iter().find(|e| e.id == id)
}
