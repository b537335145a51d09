//! In-memory store that records every call, for workflow unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::AppError;
use crate::models::approval::{ApprovalRequest, NewApprovalRequest, StatusPatch};
use crate::models::family::{ApplyPolicy, EntityFamily};
use crate::store::{ApprovalRepository, EntityMutator};

use super::registry::FamilyBundle;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateMany(Vec<Value>),
    UpdateMany(Vec<Value>),
    DeleteMany(Vec<Value>),
    FetchOne(String),
    ListEntities,
    CreateRequest(NewApprovalRequest),
    ListRequests,
    GetRequest(String),
    DetailList(String),
    PatchStatus(String, StatusPatch),
}

#[derive(Default)]
pub struct FakeStore {
    calls: Mutex<Vec<Call>>,
    requests: Mutex<Vec<ApprovalRequest>>,
    details: Mutex<HashMap<String, Vec<Value>>>,
    entities: Mutex<HashMap<String, Value>>,
    failing_patches: Mutex<HashSet<String>>,
    fail_mutations: AtomicBool,
    fail_request_writes: AtomicBool,
    next_id: AtomicUsize,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn with_request(&self, request: ApprovalRequest) {
        self.details
            .lock()
            .unwrap()
            .insert(request.id.clone(), request.list.clone());
        self.requests.lock().unwrap().push(request);
    }

    pub fn with_entity(&self, id: &str, value: Value) {
        self.entities.lock().unwrap().insert(id.to_string(), value);
    }

    pub fn fail_patch_for(&self, id: &str) {
        self.failing_patches.lock().unwrap().insert(id.to_string());
    }

    pub fn fail_mutations(&self) {
        self.fail_mutations.store(true, Ordering::SeqCst);
    }

    pub fn fail_request_writes(&self) {
        self.fail_request_writes.store(true, Ordering::SeqCst);
    }

    pub fn mutation_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| {
                matches!(
                    c,
                    Call::CreateMany(_) | Call::UpdateMany(_) | Call::DeleteMany(_)
                )
            })
            .collect()
    }

    pub fn created_requests(&self) -> Vec<NewApprovalRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::CreateRequest(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn bundle(self: &Arc<Self>, family: EntityFamily, policy: ApplyPolicy) -> FamilyBundle {
        FamilyBundle {
            descriptor: family.descriptor(),
            policy,
            mutator: self.clone(),
            repository: self.clone(),
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn mutation(&self, call: Call) -> Result<(), AppError> {
        self.record(call);
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(AppError::StoreStatus {
                status: 500,
                body: "mutation refused".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl EntityMutator for FakeStore {
    async fn create_many(&self, items: &[Value]) -> Result<(), AppError> {
        self.mutation(Call::CreateMany(items.to_vec()))
    }

    async fn update_many(&self, items: &[Value]) -> Result<(), AppError> {
        self.mutation(Call::UpdateMany(items.to_vec()))
    }

    async fn delete_many(&self, items: &[Value]) -> Result<(), AppError> {
        self.mutation(Call::DeleteMany(items.to_vec()))
    }

    async fn fetch_one(&self, id: &str) -> Result<Value, AppError> {
        self.record(Call::FetchOne(id.to_string()));
        self.entities
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::EntityNotFound(id.to_string()))
    }

    async fn list(&self) -> Result<Vec<Value>, AppError> {
        self.record(Call::ListEntities);
        Ok(self.entities.lock().unwrap().values().cloned().collect())
    }
}

#[async_trait]
impl ApprovalRepository for FakeStore {
    async fn create(&self, request: &NewApprovalRequest) -> Result<String, AppError> {
        self.record(Call::CreateRequest(request.clone()));
        if self.fail_request_writes.load(Ordering::SeqCst) {
            return Err(AppError::Store("connection reset".into()));
        }
        let id = format!("-N{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let stored = ApprovalRequest {
            id: id.clone(),
            approval_form: Some(request.approval_form),
            title: request.title.clone(),
            content: request.content.clone(),
            request_date: Some(request.request_date),
            status: Some(request.status),
            process_date: None,
            target_type: Some(request.target_type.clone()),
            target_id: Some(request.target_id.clone()),
            list: request.list.clone(),
        };
        self.with_request(stored);
        Ok(id)
    }

    async fn list(&self) -> Result<Vec<ApprovalRequest>, AppError> {
        self.record(Call::ListRequests);
        Ok(self.requests.lock().unwrap().clone())
    }

    async fn get(&self, id: &str) -> Result<ApprovalRequest, AppError> {
        self.record(Call::GetRequest(id.to_string()));
        self.requests
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| AppError::ApprovalNotFound(id.to_string()))
    }

    async fn detail_list(&self, id: &str) -> Result<Vec<Value>, AppError> {
        self.record(Call::DetailList(id.to_string()));
        Ok(self
            .details
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or_default())
    }

    async fn patch_status(&self, id: &str, patch: &StatusPatch) -> Result<(), AppError> {
        self.record(Call::PatchStatus(id.to_string(), patch.clone()));
        if self.failing_patches.lock().unwrap().contains(id) {
            return Err(AppError::StoreStatus {
                status: 503,
                body: "unavailable".into(),
            });
        }
        let mut requests = self.requests.lock().unwrap();
        if let Some(r) = requests.iter_mut().find(|r| r.id == id) {
            r.status = Some(patch.status);
            if patch.process_date.is_some() {
                r.process_date = patch.process_date;
            }
        }
        Ok(())
    }
}

/// A queue row as the review screen would hold it.
pub fn request(
    id: &str,
    form: Option<crate::models::approval::ApprovalForm>,
    status: Option<crate::models::approval::ApprovalStatus>,
    list: Vec<Value>,
) -> ApprovalRequest {
    ApprovalRequest {
        id: id.to_string(),
        approval_form: form,
        title: String::new(),
        content: String::new(),
        request_date: None,
        status,
        process_date: None,
        target_type: None,
        target_id: None,
        list,
    }
}
