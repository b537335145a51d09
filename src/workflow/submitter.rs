use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::errors::AppError;
use crate::models::approval::{ApprovalForm, NewApprovalRequest};
use crate::models::family::{ApplyPolicy, RequestGrouping};
use crate::models::timestamp::Clock;

use super::intent::MutationIntentBuilder;
use super::registry::FamilyBundle;

/// What a submission left behind.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Submission {
    /// Ids of the requests the repository accepted.
    pub request_ids: Vec<String>,
    /// Records whose write failed and was only logged.
    pub dropped: usize,
    /// The entity mutation was applied at submission time.
    pub applied: bool,
}

/// The only producer of approval requests.
pub struct ApprovalSubmitter {
    bundle: FamilyBundle,
    intents: MutationIntentBuilder,
    clock: Arc<dyn Clock>,
}

impl ApprovalSubmitter {
    pub fn new(bundle: FamilyBundle, intents: MutationIntentBuilder, clock: Arc<dyn Clock>) -> Self {
        Self {
            bundle,
            intents,
            clock,
        }
    }

    /// Records `items` for review under `form`.
    ///
    /// A failed request write is logged and dropped. Under the immediate
    /// policy the mutation is then applied directly, and its errors do
    /// propagate.
    pub async fn submit(&self, form: ApprovalForm, items: Vec<Value>) -> Result<Submission, AppError> {
        if items.is_empty() {
            return Err(AppError::InvalidInput("no entities to submit".into()));
        }
        let descriptor = &self.bundle.descriptor;
        let now = self.clock.now();

        let record = |list: Vec<Value>| {
            let target_id = list
                .iter()
                .filter_map(|item| descriptor.entity_id(item))
                .collect::<Vec<_>>()
                .join(",");
            NewApprovalRequest {
                approval_form: form,
                title: form.title().to_string(),
                content: form.content(descriptor.label),
                request_date: now,
                status: form.initial_status(),
                target_type: descriptor.target_type.to_string(),
                target_id,
                list,
            }
        };

        let records: Vec<NewApprovalRequest> = match descriptor.grouping {
            RequestGrouping::PerEntity => items.iter().map(|item| record(vec![item.clone()])).collect(),
            RequestGrouping::SingleRequest => vec![record(items.clone())],
        };

        let mut submission = Submission::default();
        for request in &records {
            match self.bundle.repository.create(request).await {
                Ok(id) => {
                    info!(
                        family = %descriptor.family,
                        request_id = %id,
                        form = %form,
                        entities = request.list.len(),
                        "approval request submitted"
                    );
                    submission.request_ids.push(id);
                }
                Err(e) => {
                    error!(
                        family = %descriptor.family,
                        form = %form,
                        target_id = %request.target_id,
                        error = %e,
                        "approval request submission failed"
                    );
                    submission.dropped += 1;
                }
            }
        }

        if self.bundle.policy == ApplyPolicy::Immediate {
            let mutator = &self.bundle.mutator;
            match form {
                ApprovalForm::DataRegistration => mutator.create_many(&items).await?,
                ApprovalForm::DataModification => mutator.update_many(&items).await?,
                ApprovalForm::DataDeletion => mutator.delete_many(&items).await?,
            }
            info!(family = %descriptor.family, form = %form, count = items.len(), "mutation applied at submission");
            submission.applied = true;
        }

        Ok(submission)
    }

    /// Normalizes new rows, gives each a provisional id and submits them
    /// for registration.
    pub async fn propose_create(&self, rows: &[Value]) -> Result<Submission, AppError> {
        let items = self
            .intents
            .for_registration(self.bundle.descriptor.family, rows)?;
        self.submit(ApprovalForm::DataRegistration, items).await
    }

    pub async fn propose_update(&self, id: &str, row: &Value) -> Result<Submission, AppError> {
        let item = self
            .intents
            .for_modification(self.bundle.descriptor.family, id, row)?;
        self.submit(ApprovalForm::DataModification, vec![item]).await
    }

    /// Snapshots the live records and submits them for deletion. Ids that
    /// cannot be fetched are left out.
    pub async fn propose_delete(&self, ids: &[String]) -> Result<Submission, AppError> {
        let mut snapshots = Vec::with_capacity(ids.len());
        for id in ids {
            match self.bundle.mutator.fetch_one(id).await {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => {
                    warn!(family = %self.bundle.descriptor.family, id = %id, error = %e, "entity skipped from deletion proposal");
                }
            }
        }
        if snapshots.is_empty() {
            return Err(AppError::EntityNotFound(ids.join(",")));
        }
        self.submit(ApprovalForm::DataDeletion, snapshots).await
    }
}
