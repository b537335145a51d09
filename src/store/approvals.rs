use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::http::StoreClient;
use super::ApprovalRepository;
use crate::errors::AppError;
use crate::models::approval::{ApprovalRequest, NewApprovalRequest, StatusPatch};
use crate::models::collection;
use crate::models::family::FamilyDescriptor;

/// Approval requests of one family, stored under `approval/<family>`.
pub struct HttpApprovalRepository {
    store: StoreClient,
    family: FamilyDescriptor,
}

impl HttpApprovalRepository {
    pub fn new(store: StoreClient, family: FamilyDescriptor) -> Self {
        Self { store, family }
    }

    fn request_path(&self, id: &str) -> String {
        format!("{}/{}", self.family.approval_path, id)
    }
}

#[async_trait]
impl ApprovalRepository for HttpApprovalRepository {
    async fn create(&self, request: &NewApprovalRequest) -> Result<String, AppError> {
        let id = self.store.post_json(self.family.approval_path, request).await?;
        debug!(family = %self.family.family, id = %id, form = %request.approval_form, "approval request stored");
        Ok(id)
    }

    async fn list(&self) -> Result<Vec<ApprovalRequest>, AppError> {
        let raw = self.store.get_json(self.family.approval_path).await?;
        let mut out = Vec::new();
        for entry in collection::entries(raw) {
            let mut request: ApprovalRequest = match serde_json::from_value(entry.value) {
                Ok(r) => r,
                Err(e) => {
                    warn!(family = %self.family.family, key = %entry.key, error = %e, "unreadable approval request skipped");
                    continue;
                }
            };
            // Status writes address the request by its store key.
            request.id = entry.key;
            out.push(request);
        }
        Ok(out)
    }

    async fn get(&self, id: &str) -> Result<ApprovalRequest, AppError> {
        let raw = self.store.get_json(&self.request_path(id)).await?;
        if raw.is_null() {
            return Err(AppError::ApprovalNotFound(id.to_string()));
        }
        let mut request: ApprovalRequest = serde_json::from_value(raw)
            .map_err(|e| AppError::Store(format!("unreadable approval request {}: {}", id, e)))?;
        request.id = id.to_string();
        Ok(request)
    }

    async fn detail_list(&self, id: &str) -> Result<Vec<Value>, AppError> {
        let raw = self
            .store
            .get_json(&format!("{}/list", self.request_path(id)))
            .await?;
        Ok(collection::values(raw))
    }

    async fn patch_status(&self, id: &str, patch: &StatusPatch) -> Result<(), AppError> {
        self.store.patch_json(&self.request_path(id), patch).await
    }
}
