//! Review-time orchestrator: validates an operator's selection, applies each
//! approved request and reports the result item by item.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::errors::AppError;
use crate::models::approval::{ApprovalForm, ApprovalRequest, ApprovalStatus};
use crate::models::timestamp::{Clock, CompactTimestamp};

use super::outcome::{BatchReport, FailureStage, GroupNotice, ItemOutcome, Outcome, ProcessGroup};
use super::registry::FamilyBundle;

/// Selection problems. Each one stops the batch before any store call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("no approval requests selected")]
    EmptySelection,

    #[error("already completed requests cannot be selected again: {}", .0.join(", "))]
    AlreadyCompleted(Vec<String>),

    #[error("nothing to process in the selection")]
    NothingToProcess,

    #[error("no selected request has an eligible approval_form")]
    NoEligibleForm,
}

impl SelectionError {
    pub fn code(&self) -> &'static str {
        match self {
            SelectionError::EmptySelection => "empty_selection",
            SelectionError::AlreadyCompleted(_) => "already_completed",
            SelectionError::NothingToProcess => "nothing_to_process",
            SelectionError::NoEligibleForm => "no_eligible_form",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ProcessOptions {
    /// The operator agreed to close the `in_review` requests in the selection.
    #[serde(default)]
    pub confirm_in_review: bool,
}

/// A validated selection, split into processing groups.
#[derive(Debug, Default)]
struct Plan<'a> {
    in_review: Vec<&'a ApprovalRequest>,
    registration: Vec<&'a ApprovalRequest>,
    modification: Vec<&'a ApprovalRequest>,
    deletion: Vec<&'a ApprovalRequest>,
}

fn plan<'a>(selected: &[String], queue: &'a [ApprovalRequest]) -> Result<Plan<'a>, SelectionError> {
    if selected.is_empty() {
        return Err(SelectionError::EmptySelection);
    }
    let wanted: HashSet<&str> = selected.iter().map(String::as_str).collect();
    let chosen: Vec<&ApprovalRequest> = queue
        .iter()
        .filter(|r| wanted.contains(r.id.as_str()))
        .collect();

    let completed: Vec<String> = chosen
        .iter()
        .filter(|r| r.status == Some(ApprovalStatus::DoneReview))
        .map(|r| r.id.clone())
        .collect();
    if !completed.is_empty() {
        return Err(SelectionError::AlreadyCompleted(completed));
    }

    let mut plan = Plan::default();
    let mut requested = 0usize;
    for request in chosen {
        match request.status {
            Some(ApprovalStatus::InReview) => plan.in_review.push(request),
            Some(s) if s.is_requested() => {
                requested += 1;
                match request.approval_form {
                    Some(ApprovalForm::DataRegistration) => plan.registration.push(request),
                    Some(ApprovalForm::DataModification) => plan.modification.push(request),
                    Some(ApprovalForm::DataDeletion) => plan.deletion.push(request),
                    None => debug!(request_id = %request.id, "request without recognized approval_form ignored"),
                }
            }
            _ => debug!(request_id = %request.id, "request without recognized status ignored"),
        }
    }

    if plan.in_review.is_empty() && requested == 0 {
        return Err(SelectionError::NothingToProcess);
    }
    if requested > 0
        && plan.registration.is_empty()
        && plan.modification.is_empty()
        && plan.deletion.is_empty()
    {
        return Err(SelectionError::NoEligibleForm);
    }
    Ok(plan)
}

pub struct BulkApprovalProcessor {
    bundle: FamilyBundle,
    clock: Arc<dyn Clock>,
}

impl BulkApprovalProcessor {
    pub fn new(bundle: FamilyBundle, clock: Arc<dyn Clock>) -> Self {
        Self { bundle, clock }
    }

    /// Processes the selected requests out of `queue`, the review queue as the
    /// operator last saw it.
    ///
    /// Items run sequentially in queue order: `in_review` first, then
    /// registrations, modifications and deletions. The first failed item halts
    /// the batch; nothing already written is rolled back.
    pub async fn process(
        &self,
        selected: &[String],
        queue: &[ApprovalRequest],
        options: ProcessOptions,
    ) -> Result<BatchReport, SelectionError> {
        let plan = plan(selected, queue).map_err(|e| {
            warn!(family = %self.bundle.descriptor.family, code = e.code(), "selection rejected: {}", e);
            e
        })?;
        let family = self.bundle.descriptor.family;
        let now = self.clock.now();
        let mut report = BatchReport::new(family);

        info!(
            %family,
            in_review = plan.in_review.len(),
            registration = plan.registration.len(),
            modification = plan.modification.len(),
            deletion = plan.deletion.len(),
            audit_only = self.bundle.is_audit_only(),
            "processing approval batch"
        );

        if !plan.in_review.is_empty() {
            if options.confirm_in_review {
                self.run_group(ProcessGroup::InReview, &plan.in_review, now, &mut report)
                    .await;
            } else {
                info!(%family, count = plan.in_review.len(), "in_review requests skipped without confirmation");
                report.skipped_in_review = plan.in_review.iter().map(|r| r.id.clone()).collect();
            }
        }

        for (group, requests) in [
            (ProcessGroup::Registration, &plan.registration),
            (ProcessGroup::Modification, &plan.modification),
            (ProcessGroup::Deletion, &plan.deletion),
        ] {
            if !requests.is_empty() {
                self.run_group(group, requests, now, &mut report).await;
            }
        }

        info!(
            %family,
            succeeded = report.succeeded(),
            failed = report.failed_ids().len(),
            halted = report.halted,
            "approval batch finished"
        );
        Ok(report)
    }

    async fn run_group(
        &self,
        group: ProcessGroup,
        requests: &[&ApprovalRequest],
        now: CompactTimestamp,
        report: &mut BatchReport,
    ) {
        let mut done = 0usize;
        for request in requests {
            let outcome = if report.halted {
                Outcome::failed(FailureStage::NotAttempted, "batch halted after an earlier failure")
            } else {
                match self.apply(group, request, now).await {
                    Ok(()) => {
                        done += 1;
                        Outcome::Succeeded
                    }
                    Err((stage, e)) => {
                        error!(
                            family = %self.bundle.descriptor.family,
                            request_id = %request.id,
                            group = group.as_str(),
                            ?stage,
                            error = %e,
                            "approval item failed, halting batch"
                        );
                        report.halted = true;
                        Outcome::failed(stage, e.to_string())
                    }
                }
            };
            report.items.push(ItemOutcome {
                request_id: request.id.clone(),
                group,
                form: request.approval_form,
                outcome,
            });
        }

        if done == requests.len() {
            report.notices.push(GroupNotice {
                group,
                count: done,
                message: self.notice(group, done),
            });
        }
    }

    /// One request: read its snapshots, close it, then mutate.
    async fn apply(
        &self,
        group: ProcessGroup,
        request: &ApprovalRequest,
        now: CompactTimestamp,
    ) -> Result<(), (FailureStage, AppError)> {
        let transitioner = self.bundle.transitioner();

        if group == ProcessGroup::InReview {
            return transitioner
                .advance(request, ApprovalStatus::DoneReview, now)
                .await
                .map_err(|e| (FailureStage::StatusWrite, e));
        }

        let list = self
            .bundle
            .repository
            .detail_list(&request.id)
            .await
            .map_err(|e| (FailureStage::DetailFetch, e))?;
        if list.is_empty() {
            return Err((
                FailureStage::EmptyList,
                AppError::InvalidInput(format!("request {} has no entity snapshots", request.id)),
            ));
        }

        let descriptor = &self.bundle.descriptor;
        if !self.bundle.is_audit_only() {
            let missing = list
                .iter()
                .filter(|item| descriptor.entity_id(item).is_none())
                .count();
            if missing > 0 {
                return Err((
                    FailureStage::MissingEntityId,
                    AppError::InvalidInput(format!(
                        "request {}: {} of {} snapshot(s) have no '{}'",
                        request.id,
                        missing,
                        list.len(),
                        descriptor.id_field
                    )),
                ));
            }
        }

        transitioner
            .advance(request, ApprovalStatus::DoneReview, now)
            .await
            .map_err(|e| (FailureStage::StatusWrite, e))?;

        if self.bundle.is_audit_only() {
            debug!(request_id = %request.id, "audit-only family, entity mutation skipped");
            return Ok(());
        }

        let mutator = &self.bundle.mutator;
        let result = match group {
            ProcessGroup::Registration => mutator.create_many(&list).await,
            ProcessGroup::Modification => mutator.update_many(&list).await,
            ProcessGroup::Deletion => mutator.delete_many(&list).await,
            ProcessGroup::InReview => Ok(()),
        };
        result.map_err(|e| (FailureStage::EntityMutation, e))
    }

    fn notice(&self, group: ProcessGroup, count: usize) -> String {
        let label = self.bundle.descriptor.label;
        match group {
            ProcessGroup::InReview => format!("{} in-review request(s) approved", count),
            ProcessGroup::Registration => format!("{} {} registration request(s) approved", count, label),
            ProcessGroup::Modification => format!("{} {} modification request(s) approved", count, label),
            ProcessGroup::Deletion => format!("{} {} deletion request(s) approved", count, label),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::approval::StatusPatch;
    use crate::models::family::{ApplyPolicy, EntityFamily};
    use crate::models::timestamp::FixedClock;
    use crate::workflow::fake::{request, Call, FakeStore};
    use serde_json::json;

    const NOW: &str = "20250618093000";

    fn processor(store: &Arc<FakeStore>, policy: ApplyPolicy) -> BulkApprovalProcessor {
        BulkApprovalProcessor::new(
            store.bundle(EntityFamily::AppScheme, policy),
            Arc::new(FixedClock(NOW.parse().unwrap())),
        )
    }

    fn done_patch() -> StatusPatch {
        StatusPatch {
            status: ApprovalStatus::DoneReview,
            process_date: Some(NOW.parse().unwrap()),
        }
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn seed(store: &FakeStore, queue: &[ApprovalRequest]) {
        for r in queue {
            store.with_request(r.clone());
        }
    }

    #[tokio::test]
    async fn test_registration_creates_listed_entities() {
        let store = FakeStore::new();
        let e1 = json!({"id": "e1"});
        let e2 = json!({"id": "e2"});
        let queue = vec![request(
            "r1",
            Some(ApprovalForm::DataRegistration),
            Some(ApprovalStatus::CreateRequested),
            vec![e1.clone(), e2.clone()],
        )];
        seed(&store, &queue);

        let report = processor(&store, ApplyPolicy::Deferred)
            .process(&ids(&["r1"]), &queue, ProcessOptions::default())
            .await
            .unwrap();

        assert!(report.is_clean());
        assert_eq!(
            store.calls(),
            vec![
                Call::DetailList("r1".into()),
                Call::PatchStatus("r1".into(), done_patch()),
                Call::CreateMany(vec![e1, e2]),
            ]
        );
        assert_eq!(report.notices.len(), 1);
        assert_eq!(report.notices[0].message, "1 App scheme registration request(s) approved");
    }

    #[tokio::test]
    async fn test_done_review_in_selection_rejects_batch() {
        let store = FakeStore::new();
        let queue = vec![
            request("r1", Some(ApprovalForm::DataRegistration), Some(ApprovalStatus::DoneReview), vec![]),
            request(
                "r2",
                Some(ApprovalForm::DataRegistration),
                Some(ApprovalStatus::CreateRequested),
                vec![json!({"id": "e1"})],
            ),
        ];

        let err = processor(&store, ApplyPolicy::Deferred)
            .process(&ids(&["r1", "r2"]), &queue, ProcessOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, SelectionError::AlreadyCompleted(vec!["r1".into()]));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_reprocessing_completed_batch_is_noop() {
        let store = FakeStore::new();
        let queue = vec![
            request("r1", Some(ApprovalForm::DataDeletion), Some(ApprovalStatus::DoneReview), vec![]),
            request("r2", Some(ApprovalForm::DataModification), Some(ApprovalStatus::DoneReview), vec![]),
        ];
        let err = processor(&store, ApplyPolicy::Deferred)
            .process(&ids(&["r1", "r2"]), &queue, ProcessOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "already_completed");
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_deletion_removes_entity() {
        let store = FakeStore::new();
        let e1 = json!({"id": "e1", "description": "old"});
        let queue = vec![request(
            "r9",
            Some(ApprovalForm::DataDeletion),
            Some(ApprovalStatus::DeleteRequested),
            vec![e1.clone()],
        )];
        seed(&store, &queue);

        processor(&store, ApplyPolicy::Deferred)
            .process(&ids(&["r9"]), &queue, ProcessOptions::default())
            .await
            .unwrap();

        assert_eq!(store.mutation_calls(), vec![Call::DeleteMany(vec![e1])]);
        assert!(store.calls().contains(&Call::PatchStatus("r9".into(), done_patch())));
    }

    #[tokio::test]
    async fn test_empty_selection() {
        let store = FakeStore::new();
        let err = processor(&store, ApplyPolicy::Deferred)
            .process(&[], &[], ProcessOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, SelectionError::EmptySelection);
    }

    #[tokio::test]
    async fn test_unknown_ids_and_statuses_are_nothing_to_process() {
        let store = FakeStore::new();
        let queue = vec![request("r1", Some(ApprovalForm::DataRegistration), None, vec![])];
        let err = processor(&store, ApplyPolicy::Deferred)
            .process(&ids(&["r1", "missing"]), &queue, ProcessOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, SelectionError::NothingToProcess);
    }

    #[tokio::test]
    async fn test_requested_without_form_is_not_eligible() {
        let store = FakeStore::new();
        let queue = vec![
            request("r1", None, Some(ApprovalStatus::CreateRequested), vec![json!({"id": "e1"})]),
            request("r2", None, Some(ApprovalStatus::InReview), vec![]),
        ];
        let err = processor(&store, ApplyPolicy::Deferred)
            .process(&ids(&["r1", "r2"]), &queue, ProcessOptions { confirm_in_review: true })
            .await
            .unwrap_err();
        assert_eq!(err, SelectionError::NoEligibleForm);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_confirmed_in_review_only_writes_status() {
        let store = FakeStore::new();
        let queue = vec![request(
            "r1",
            Some(ApprovalForm::DataRegistration),
            Some(ApprovalStatus::InReview),
            vec![json!({"id": "e1"})],
        )];
        seed(&store, &queue);

        let report = processor(&store, ApplyPolicy::Deferred)
            .process(&ids(&["r1"]), &queue, ProcessOptions { confirm_in_review: true })
            .await
            .unwrap();

        assert_eq!(store.calls(), vec![Call::PatchStatus("r1".into(), done_patch())]);
        assert_eq!(report.items[0].group, ProcessGroup::InReview);
        assert_eq!(report.notices[0].message, "1 in-review request(s) approved");
    }

    #[tokio::test]
    async fn test_declined_in_review_is_skipped_rest_proceeds() {
        let store = FakeStore::new();
        let queue = vec![
            request("r1", Some(ApprovalForm::DataRegistration), Some(ApprovalStatus::InReview), vec![]),
            request(
                "r2",
                Some(ApprovalForm::DataModification),
                Some(ApprovalStatus::UpdateRequested),
                vec![json!({"id": "e2"})],
            ),
        ];
        seed(&store, &queue);

        let report = processor(&store, ApplyPolicy::Deferred)
            .process(&ids(&["r1", "r2"]), &queue, ProcessOptions::default())
            .await
            .unwrap();

        assert_eq!(report.skipped_in_review, vec!["r1".to_string()]);
        assert_eq!(report.items.len(), 1);
        assert_eq!(report.items[0].request_id, "r2");
        assert!(!store.calls().iter().any(|c| matches!(c, Call::PatchStatus(id, _) if id == "r1")));
        assert_eq!(store.mutation_calls(), vec![Call::UpdateMany(vec![json!({"id": "e2"})])]);
    }

    #[tokio::test]
    async fn test_groups_run_in_form_order() {
        let store = FakeStore::new();
        let queue = vec![
            request("d", Some(ApprovalForm::DataDeletion), Some(ApprovalStatus::DeleteRequested), vec![json!({"id": "x"})]),
            request("m", Some(ApprovalForm::DataModification), Some(ApprovalStatus::UpdateRequested), vec![json!({"id": "y"})]),
            request("c", Some(ApprovalForm::DataRegistration), Some(ApprovalStatus::CreateRequested), vec![json!({"id": "z"})]),
        ];
        seed(&store, &queue);

        let report = processor(&store, ApplyPolicy::Deferred)
            .process(&ids(&["d", "m", "c"]), &queue, ProcessOptions::default())
            .await
            .unwrap();

        let order: Vec<&str> = report.items.iter().map(|i| i.request_id.as_str()).collect();
        assert_eq!(order, vec!["c", "m", "d"]);
        assert_eq!(report.notices.len(), 3);
    }

    #[tokio::test]
    async fn test_failure_halts_remaining_items() {
        let store = FakeStore::new();
        store.fail_patch_for("r1");
        let queue = vec![
            request("r1", Some(ApprovalForm::DataRegistration), Some(ApprovalStatus::CreateRequested), vec![json!({"id": "a"})]),
            request("r2", Some(ApprovalForm::DataRegistration), Some(ApprovalStatus::CreateRequested), vec![json!({"id": "b"})]),
            request("r3", Some(ApprovalForm::DataDeletion), Some(ApprovalStatus::DeleteRequested), vec![json!({"id": "c"})]),
        ];
        seed(&store, &queue);

        let report = processor(&store, ApplyPolicy::Deferred)
            .process(&ids(&["r1", "r2", "r3"]), &queue, ProcessOptions::default())
            .await
            .unwrap();

        assert!(report.halted);
        assert_eq!(report.failed_ids(), vec!["r1", "r2", "r3"]);
        assert!(matches!(
            report.items[0].outcome,
            Outcome::Failed { stage: FailureStage::StatusWrite, .. }
        ));
        assert!(matches!(
            report.items[2].outcome,
            Outcome::Failed { stage: FailureStage::NotAttempted, .. }
        ));
        assert!(store.mutation_calls().is_empty());
        assert!(report.notices.is_empty());
    }

    #[tokio::test]
    async fn test_mutation_failure_keeps_written_status() {
        let store = FakeStore::new();
        store.fail_mutations();
        let queue = vec![request(
            "r1",
            Some(ApprovalForm::DataRegistration),
            Some(ApprovalStatus::CreateRequested),
            vec![json!({"id": "a"})],
        )];
        seed(&store, &queue);

        let report = processor(&store, ApplyPolicy::Deferred)
            .process(&ids(&["r1"]), &queue, ProcessOptions::default())
            .await
            .unwrap();

        assert!(matches!(
            report.items[0].outcome,
            Outcome::Failed { stage: FailureStage::EntityMutation, .. }
        ));
        assert!(store.calls().contains(&Call::PatchStatus("r1".into(), done_patch())));
    }

    #[tokio::test]
    async fn test_empty_detail_list_fails_before_status_write() {
        let store = FakeStore::new();
        let queue = vec![request(
            "r1",
            Some(ApprovalForm::DataDeletion),
            Some(ApprovalStatus::DeleteRequested),
            vec![],
        )];
        seed(&store, &queue);

        let report = processor(&store, ApplyPolicy::Deferred)
            .process(&ids(&["r1"]), &queue, ProcessOptions::default())
            .await
            .unwrap();

        assert!(matches!(
            report.items[0].outcome,
            Outcome::Failed { stage: FailureStage::EmptyList, .. }
        ));
        assert_eq!(store.calls(), vec![Call::DetailList("r1".into())]);
    }

    #[tokio::test]
    async fn test_snapshot_without_id_fails_before_status_write() {
        let store = FakeStore::new();
        let queue = vec![request(
            "r1",
            Some(ApprovalForm::DataDeletion),
            Some(ApprovalStatus::DeleteRequested),
            vec![json!({"description": "no key"})],
        )];
        seed(&store, &queue);

        let report = processor(&store, ApplyPolicy::Deferred)
            .process(&ids(&["r1"]), &queue, ProcessOptions::default())
            .await
            .unwrap();

        assert!(report.halted);
        assert!(matches!(
            report.items[0].outcome,
            Outcome::Failed { stage: FailureStage::MissingEntityId, .. }
        ));
        assert_eq!(store.calls(), vec![Call::DetailList("r1".into())]);
    }

    #[tokio::test]
    async fn test_legacy_id_key_is_deleted() {
        let store = FakeStore::new();
        let snapshot = json!({"appSchemeId": "a1"});
        let queue = vec![request(
            "r1",
            Some(ApprovalForm::DataDeletion),
            Some(ApprovalStatus::DeleteRequested),
            vec![snapshot.clone()],
        )];
        seed(&store, &queue);

        let report = processor(&store, ApplyPolicy::Deferred)
            .process(&ids(&["r1"]), &queue, ProcessOptions::default())
            .await
            .unwrap();

        assert!(report.is_clean());
        assert_eq!(store.mutation_calls(), vec![Call::DeleteMany(vec![snapshot])]);
    }

    #[tokio::test]
    async fn test_audit_only_family_never_mutates() {
        let store = FakeStore::new();
        let queue = vec![request(
            "r1",
            Some(ApprovalForm::DataRegistration),
            Some(ApprovalStatus::CreateRequested),
            vec![json!({"id": "a"})],
        )];
        seed(&store, &queue);

        let report = processor(&store, ApplyPolicy::Immediate)
            .process(&ids(&["r1"]), &queue, ProcessOptions::default())
            .await
            .unwrap();

        assert!(report.is_clean());
        assert!(store.mutation_calls().is_empty());
        assert!(store.calls().contains(&Call::PatchStatus("r1".into(), done_patch())));
    }
}
