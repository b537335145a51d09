use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::cache::ReviewQueueCache;
use crate::errors::AppError;
use crate::models::approval::{ApprovalForm, ApprovalRequest, ApprovalStatus};
use crate::models::family::EntityFamily;
use crate::models::timestamp::Clock;
use crate::notification::webhook::{WebhookEvent, WebhookNotifier};

use super::intent::MutationIntentBuilder;
use super::outcome::BatchReport;
use super::processor::{BulkApprovalProcessor, ProcessOptions, SelectionError};
use super::registry::{FamilyBundle, FamilyRegistry};
use super::submitter::{ApprovalSubmitter, Submission};

/// Caller-facing API over every registered family.
#[derive(Clone)]
pub struct ApprovalService {
    registry: Arc<FamilyRegistry>,
    cache: ReviewQueueCache,
    notifier: WebhookNotifier,
    intents: MutationIntentBuilder,
    clock: Arc<dyn Clock>,
}

impl ApprovalService {
    pub fn new(
        registry: FamilyRegistry,
        cache: ReviewQueueCache,
        notifier: WebhookNotifier,
        intents: MutationIntentBuilder,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            cache,
            notifier,
            intents,
            clock,
        }
    }

    fn bundle(&self, family: EntityFamily) -> Result<&FamilyBundle, AppError> {
        self.registry.get(family)
    }

    fn submitter(&self, family: EntityFamily) -> Result<ApprovalSubmitter, AppError> {
        Ok(ApprovalSubmitter::new(
            self.bundle(family)?.clone(),
            self.intents.clone(),
            self.clock.clone(),
        ))
    }

    fn after_submission(&self, family: EntityFamily, form: ApprovalForm, submission: &Submission) {
        self.cache.invalidate(family);
        if !submission.request_ids.is_empty() {
            self.notifier
                .dispatch(WebhookEvent::approval_submitted(family, form, &submission.request_ids));
        }
    }

    /// Submits already-shaped entities. Each row is normalized and keeps its
    /// own id; rows without one get a provisional id.
    pub async fn submit_approval(
        &self,
        family: EntityFamily,
        form: ApprovalForm,
        items: &[Value],
    ) -> Result<Submission, AppError> {
        let items = items
            .iter()
            .map(|row| self.intents.normalize(family, row, None))
            .collect::<Result<Vec<_>, _>>()?;
        let submission = self.submitter(family)?.submit(form, items).await?;
        self.after_submission(family, form, &submission);
        Ok(submission)
    }

    pub async fn propose_create(&self, family: EntityFamily, rows: &[Value]) -> Result<Submission, AppError> {
        let submission = self.submitter(family)?.propose_create(rows).await?;
        self.after_submission(family, ApprovalForm::DataRegistration, &submission);
        Ok(submission)
    }

    pub async fn propose_update(
        &self,
        family: EntityFamily,
        id: &str,
        row: &Value,
    ) -> Result<Submission, AppError> {
        let submission = self.submitter(family)?.propose_update(id, row).await?;
        self.after_submission(family, ApprovalForm::DataModification, &submission);
        Ok(submission)
    }

    pub async fn propose_delete(&self, family: EntityFamily, ids: &[String]) -> Result<Submission, AppError> {
        let submission = self.submitter(family)?.propose_delete(ids).await?;
        self.after_submission(family, ApprovalForm::DataDeletion, &submission);
        Ok(submission)
    }

    /// The review queue, served from cache while fresh.
    pub async fn list_approval_requests(
        &self,
        family: EntityFamily,
    ) -> Result<Arc<Vec<ApprovalRequest>>, AppError> {
        if let Some(hit) = self.cache.get(family) {
            return Ok(hit);
        }
        let requests = self.bundle(family)?.repository.list().await?;
        Ok(self.cache.put(family, requests))
    }

    pub async fn fetch_approval_request(
        &self,
        family: EntityFamily,
        id: &str,
    ) -> Result<ApprovalRequest, AppError> {
        self.bundle(family)?.repository.get(id).await
    }

    pub async fn fetch_approval_detail(&self, family: EntityFamily, id: &str) -> Result<Vec<Value>, AppError> {
        self.bundle(family)?.repository.detail_list(id).await
    }

    /// Live entities of a family, straight from the store.
    pub async fn list_entities(&self, family: EntityFamily) -> Result<Vec<Value>, AppError> {
        self.bundle(family)?.mutator.list().await
    }

    /// Escalates one first-pass request to `in_review` without touching entities.
    pub async fn request_final_approval(&self, family: EntityFamily, id: &str) -> Result<(), AppError> {
        let bundle = self.bundle(family)?;
        let request = bundle.repository.get(id).await?;
        bundle
            .transitioner()
            .advance(&request, ApprovalStatus::InReview, self.clock.now())
            .await?;
        self.cache.invalidate(family);
        info!(%family, request_id = id, "request escalated to final approval");
        Ok(())
    }

    /// Processes `ids` against the review queue as last listed. A rejected
    /// selection costs no store call once the queue is cached.
    pub async fn process_approvals(
        &self,
        family: EntityFamily,
        ids: &[String],
        options: ProcessOptions,
    ) -> Result<BatchReport, AppError> {
        if ids.is_empty() {
            return Err(SelectionError::EmptySelection.into());
        }
        let queue = self.list_approval_requests(family).await?;
        self.process_with_queue(family, ids, &queue, options).await
    }

    /// Processes `ids` against the queue snapshot the caller already holds.
    pub async fn process_with_queue(
        &self,
        family: EntityFamily,
        ids: &[String],
        queue: &[ApprovalRequest],
        options: ProcessOptions,
    ) -> Result<BatchReport, AppError> {
        let processor = BulkApprovalProcessor::new(self.bundle(family)?.clone(), self.clock.clone());
        let report = processor.process(ids, queue, options).await?;
        self.cache.invalidate(family);
        if !report.items.is_empty() {
            self.notifier.dispatch(WebhookEvent::batch_processed(&report));
        }
        Ok(report)
    }

    /// Waits for outstanding webhook deliveries.
    pub async fn flush_notifications(&self) {
        self.notifier.flush().await;
    }
}
