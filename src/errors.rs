use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::models::approval::ApprovalStatus;
use crate::workflow::processor::SelectionError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("unknown entity family: {0}")]
    UnknownFamily(String),

    #[error("approval request not found: {0}")]
    ApprovalNotFound(String),

    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("cannot move request {id} from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: String,
        to: ApprovalStatus,
    },

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("store returned {status}: {body}")]
    StoreStatus { status: u16, body: String },

    #[error("store error: {0}")]
    Store(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<reqwest_middleware::Error> for AppError {
    fn from(e: reqwest_middleware::Error) -> Self {
        AppError::Store(e.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Store(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code, msg) = match &self {
            AppError::UnknownFamily(_) => (
                StatusCode::NOT_FOUND,
                "invalid_request_error",
                "unknown_family",
                self.to_string(),
            ),
            AppError::ApprovalNotFound(_) => (
                StatusCode::NOT_FOUND,
                "invalid_request_error",
                "approval_not_found",
                self.to_string(),
            ),
            AppError::EntityNotFound(_) => (
                StatusCode::NOT_FOUND,
                "invalid_request_error",
                "entity_not_found",
                self.to_string(),
            ),
            AppError::InvalidInput(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_request_error",
                "invalid_input",
                self.to_string(),
            ),
            AppError::InvalidTransition { .. } => (
                StatusCode::CONFLICT,
                "workflow_error",
                "invalid_transition",
                self.to_string(),
            ),
            AppError::Selection(e) => (
                StatusCode::CONFLICT,
                "selection_warning",
                e.code(),
                e.to_string(),
            ),
            AppError::StoreStatus { .. } | AppError::Store(_) => {
                tracing::error!("Store error: {}", self);
                (
                    StatusCode::BAD_GATEWAY,
                    "store_error",
                    "store_failed",
                    self.to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        (status, body).into_response()
    }
}
