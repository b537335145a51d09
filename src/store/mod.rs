//! Seams to the backing store: entity mutations and approval-request records.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::AppError;
use crate::models::approval::{ApprovalRequest, NewApprovalRequest, StatusPatch};

pub mod approvals;
pub mod entities;
pub mod http;

/// Create/update/delete of canonical entity snapshots for one family.
///
/// Calls are not transactional across a batch: a failure partway through
/// leaves earlier entities mutated and surfaces as a single error.
#[async_trait]
pub trait EntityMutator: Send + Sync {
    /// Stores every snapshot under the id it already carries.
    async fn create_many(&self, items: &[Value]) -> Result<(), AppError>;
    /// One update per snapshot, keyed by its id.
    async fn update_many(&self, items: &[Value]) -> Result<(), AppError>;
    /// Removes every entity whose id appears in the snapshots.
    async fn delete_many(&self, items: &[Value]) -> Result<(), AppError>;
    /// Current live record, used to snapshot entities before proposing deletion.
    async fn fetch_one(&self, id: &str) -> Result<Value, AppError>;
    async fn list(&self) -> Result<Vec<Value>, AppError>;
}

/// Persistence for approval requests of one family.
#[async_trait]
pub trait ApprovalRepository: Send + Sync {
    /// Persists a new request and returns the id the store assigned.
    async fn create(&self, request: &NewApprovalRequest) -> Result<String, AppError>;
    async fn list(&self) -> Result<Vec<ApprovalRequest>, AppError>;
    async fn get(&self, id: &str) -> Result<ApprovalRequest, AppError>;
    /// The entity snapshots embedded in a request.
    async fn detail_list(&self, id: &str) -> Result<Vec<Value>, AppError>;
    async fn patch_status(&self, id: &str, patch: &StatusPatch) -> Result<(), AppError>;
}
