//! approval-gate: approval-gated create/update/delete workflow for managed
//! reference datasets.
//!
//! The binary in `main.rs` and the integration tests in `tests/` both build on
//! this library crate.

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod errors;
pub mod models;
pub mod notification;
pub mod store;
pub mod workflow;

use cache::ReviewQueueCache;
use models::timestamp::{Clock, SystemClock};
use notification::webhook::WebhookNotifier;
use store::http::StoreClient;
use workflow::intent::MutationIntentBuilder;
use workflow::registry::FamilyRegistry;
use workflow::service::ApprovalService;

/// Shared application state passed to handlers.
pub struct AppState {
    pub service: ApprovalService,
    pub config: config::Config,
}

impl AppState {
    /// Wires every family against the configured store.
    pub fn from_config(cfg: config::Config) -> anyhow::Result<Self> {
        Self::with_clock(cfg, Arc::new(SystemClock))
    }

    pub fn with_clock(cfg: config::Config, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let store = StoreClient::new(&cfg.store_url, &cfg.http_settings())?;
        let registry = FamilyRegistry::from_store(&store, &cfg.policies());
        let service = ApprovalService::new(
            registry,
            ReviewQueueCache::new(cfg.queue_ttl()),
            WebhookNotifier::new(cfg.webhook_targets())?,
            MutationIntentBuilder::default(),
            clock,
        );
        Ok(Self {
            service,
            config: cfg,
        })
    }
}

/// The full HTTP application: health check, the approval API under
/// `/api/v1`, request tracing, CORS and request ids.
pub fn build_app(state: Arc<AppState>) -> axum::Router {
    let dashboard_origin = state.config.dashboard_origin.clone();
    axum::Router::new()
        .route("/healthz", axum::routing::get(|| async { "ok" }))
        .nest("/api/v1", api::api_router())
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
                    let origin_str = origin.to_str().unwrap_or("");
                    origin_str == dashboard_origin
                        || origin_str.starts_with("http://localhost:")
                        || origin_str.starts_with("http://127.0.0.1:")
                }))
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
                .allow_headers([
                    HeaderName::from_static("content-type"),
                    HeaderName::from_static("x-request-id"),
                ]),
        )
        .layer(axum::middleware::from_fn(request_id_middleware))
}

/// Middleware: injects a unique X-Request-Id into every response.
/// This allows clients to correlate errors with server logs.
async fn request_id_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}
