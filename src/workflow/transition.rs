use std::sync::Arc;

use tracing::info;

use crate::errors::AppError;
use crate::models::approval::{ApprovalRequest, ApprovalStatus, StatusPatch};
use crate::models::timestamp::CompactTimestamp;
use crate::store::ApprovalRepository;

/// The only writer of request status.
#[derive(Clone)]
pub struct StatusTransitioner {
    repo: Arc<dyn ApprovalRepository>,
}

impl StatusTransitioner {
    pub fn new(repo: Arc<dyn ApprovalRepository>) -> Self {
        Self { repo }
    }

    /// Raw write. `process_date` is only sent with `done_review`.
    pub async fn set_status(
        &self,
        id: &str,
        status: ApprovalStatus,
        now: Option<CompactTimestamp>,
    ) -> Result<(), AppError> {
        let patch = StatusPatch {
            status,
            process_date: if status == ApprovalStatus::DoneReview {
                now
            } else {
                None
            },
        };
        self.repo.patch_status(id, &patch).await?;
        info!(request_id = id, status = %status, "approval status written");
        Ok(())
    }

    /// Checked write: refuses edges outside the lifecycle table.
    pub async fn advance(
        &self,
        request: &ApprovalRequest,
        next: ApprovalStatus,
        now: CompactTimestamp,
    ) -> Result<(), AppError> {
        match request.status {
            Some(current) if current.can_transition_to(next) => {
                self.set_status(&request.id, next, Some(now)).await
            }
            current => Err(AppError::InvalidTransition {
                id: request.id.clone(),
                from: current
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "unrecognized".to_string()),
                to: next,
            }),
        }
    }
}
