use std::sync::Arc;

use axum::{
    http::StatusCode,
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::AppState;

pub mod handlers;

/// Build the approval API router.
/// All routes are relative; the caller mounts this under `/api/v1`.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/families/:family/approvals",
            get(handlers::list_approvals).post(handlers::submit_approval),
        )
        .route(
            "/families/:family/approvals/process",
            post(handlers::process_approvals),
        )
        .route(
            "/families/:family/approvals/:id",
            get(handlers::get_approval),
        )
        .route(
            "/families/:family/approvals/:id/list",
            get(handlers::get_approval_list),
        )
        .route(
            "/families/:family/approvals/:id/final-approval",
            post(handlers::request_final_approval),
        )
        .route(
            "/families/:family/entities",
            get(handlers::list_entities).post(handlers::propose_create),
        )
        .route(
            "/families/:family/entities/delete",
            post(handlers::propose_delete),
        )
        .route(
            "/families/:family/entities/:id",
            put(handlers::propose_update),
        )
        .layer(TraceLayer::new_for_http())
        .fallback(fallback_404)
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}
