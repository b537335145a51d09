//! Per-item results of a bulk approval run.

use serde::Serialize;

use crate::models::approval::ApprovalForm;
use crate::models::family::EntityFamily;

/// The groups a batch is processed in, in processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessGroup {
    InReview,
    Registration,
    Modification,
    Deletion,
}

impl ProcessGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessGroup::InReview => "in_review",
            ProcessGroup::Registration => "registration",
            ProcessGroup::Modification => "modification",
            ProcessGroup::Deletion => "deletion",
        }
    }
}

/// Where a failed item stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    DetailFetch,
    EmptyList,
    /// A snapshot carries no usable entity id, so the mutation could not address it.
    MissingEntityId,
    StatusWrite,
    EntityMutation,
    /// An earlier item failed and the batch halted before reaching this one.
    NotAttempted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    Succeeded,
    Failed { stage: FailureStage, reason: String },
}

impl Outcome {
    pub fn failed(stage: FailureStage, reason: impl Into<String>) -> Self {
        Outcome::Failed {
            stage,
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemOutcome {
    pub request_id: String,
    pub group: ProcessGroup,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<ApprovalForm>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// One aggregate line per group that ran to completion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupNotice {
    pub group: ProcessGroup,
    pub count: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub family: EntityFamily,
    pub items: Vec<ItemOutcome>,
    pub notices: Vec<GroupNotice>,
    /// Ids of `in_review` requests left untouched because confirmation was declined.
    pub skipped_in_review: Vec<String>,
    pub halted: bool,
    /// The review queue must be re-fetched by anyone holding a copy.
    pub refresh: bool,
}

impl BatchReport {
    pub fn new(family: EntityFamily) -> Self {
        Self {
            family,
            items: Vec::new(),
            notices: Vec::new(),
            skipped_in_review: Vec::new(),
            halted: false,
            refresh: true,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| i.outcome.is_success()).count()
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter(|i| !i.outcome.is_success())
            .map(|i| i.request_id.as_str())
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        !self.halted && self.items.iter().all(|i| i.outcome.is_success())
    }
}
