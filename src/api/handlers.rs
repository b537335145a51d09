use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AppError;
use crate::models::approval::{ApprovalForm, ApprovalRequest, ApprovalStatus};
use crate::models::family::EntityFamily;
use crate::workflow::outcome::BatchReport;
use crate::workflow::processor::ProcessOptions;
use crate::workflow::submitter::Submission;
use crate::AppState;

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Deserialize)]
pub struct SubmitApprovalRequest {
    pub approval_form: ApprovalForm,
    pub items: Vec<Value>,
}

#[derive(Deserialize)]
pub struct ProcessRequest {
    pub ids: Vec<String>,
    #[serde(flatten)]
    pub options: ProcessOptions,
}

#[derive(Deserialize)]
pub struct ProposeCreateRequest {
    pub items: Vec<Value>,
}

#[derive(Deserialize)]
pub struct ProposeDeleteRequest {
    pub ids: Vec<String>,
}

#[derive(Deserialize)]
pub struct ListParams {
    /// Only requests the first-pass approval may pick.
    #[serde(default)]
    pub pending: bool,
}

#[derive(Serialize)]
pub struct TransitionResponse {
    pub id: String,
    pub status: ApprovalStatus,
}

fn family(key: &str) -> Result<EntityFamily, AppError> {
    key.parse()
        .map_err(|_| AppError::UnknownFamily(key.to_string()))
}

// ── Approval requests ────────────────────────────────────────

/// GET /api/v1/families/:family/approvals
pub async fn list_approvals(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ApprovalRequest>>, AppError> {
    let queue = state.service.list_approval_requests(family(&key)?).await?;
    let requests = queue
        .iter()
        .filter(|r| !params.pending || r.is_selectable())
        .cloned()
        .collect();
    Ok(Json(requests))
}

/// POST /api/v1/families/:family/approvals
pub async fn submit_approval(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(payload): Json<SubmitApprovalRequest>,
) -> Result<(StatusCode, Json<Submission>), AppError> {
    let submission = state
        .service
        .submit_approval(family(&key)?, payload.approval_form, &payload.items)
        .await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

/// GET /api/v1/families/:family/approvals/:id
pub async fn get_approval(
    State(state): State<Arc<AppState>>,
    Path((key, id)): Path<(String, String)>,
) -> Result<Json<ApprovalRequest>, AppError> {
    let request = state.service.fetch_approval_request(family(&key)?, &id).await?;
    Ok(Json(request))
}

/// GET /api/v1/families/:family/approvals/:id/list
pub async fn get_approval_list(
    State(state): State<Arc<AppState>>,
    Path((key, id)): Path<(String, String)>,
) -> Result<Json<Vec<Value>>, AppError> {
    let list = state.service.fetch_approval_detail(family(&key)?, &id).await?;
    Ok(Json(list))
}

/// POST /api/v1/families/:family/approvals/:id/final-approval
pub async fn request_final_approval(
    State(state): State<Arc<AppState>>,
    Path((key, id)): Path<(String, String)>,
) -> Result<Json<TransitionResponse>, AppError> {
    state.service.request_final_approval(family(&key)?, &id).await?;
    Ok(Json(TransitionResponse {
        id,
        status: ApprovalStatus::InReview,
    }))
}

/// POST /api/v1/families/:family/approvals/process
pub async fn process_approvals(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(payload): Json<ProcessRequest>,
) -> Result<Json<BatchReport>, AppError> {
    let report = state
        .service
        .process_approvals(family(&key)?, &payload.ids, payload.options)
        .await?;
    Ok(Json(report))
}

// ── Entity proposals ─────────────────────────────────────────

/// GET /api/v1/families/:family/entities
pub async fn list_entities(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<Vec<Value>>, AppError> {
    Ok(Json(state.service.list_entities(family(&key)?).await?))
}

/// POST /api/v1/families/:family/entities
pub async fn propose_create(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(payload): Json<ProposeCreateRequest>,
) -> Result<(StatusCode, Json<Submission>), AppError> {
    let submission = state
        .service
        .propose_create(family(&key)?, &payload.items)
        .await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

/// PUT /api/v1/families/:family/entities/:id
pub async fn propose_update(
    State(state): State<Arc<AppState>>,
    Path((key, id)): Path<(String, String)>,
    Json(row): Json<Value>,
) -> Result<(StatusCode, Json<Submission>), AppError> {
    let submission = state
        .service
        .propose_update(family(&key)?, &id, &row)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(submission)))
}

/// POST /api/v1/families/:family/entities/delete
pub async fn propose_delete(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(payload): Json<ProposeDeleteRequest>,
) -> Result<(StatusCode, Json<Submission>), AppError> {
    if payload.ids.is_empty() {
        return Err(AppError::InvalidInput("ids must not be empty".into()));
    }
    let submission = state
        .service
        .propose_delete(family(&key)?, &payload.ids)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(submission)))
}
