use anyhow::Result;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::approval::ApprovalForm;
use crate::models::family::EntityFamily;
use crate::workflow::outcome::BatchReport;

// ── Webhook Event Types ───────────────────────────────────────

/// A structured event payload sent to webhook endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookEvent {
    /// Event type identifier, e.g. "approval_submitted".
    pub event_type: String,
    /// ISO-8601 timestamp of when the event occurred.
    pub timestamp: String,
    pub family: EntityFamily,
    /// Event-specific details (form, request ids, outcome counts).
    pub details: serde_json::Value,
}

impl WebhookEvent {
    pub fn approval_submitted(family: EntityFamily, form: ApprovalForm, request_ids: &[String]) -> Self {
        Self {
            event_type: "approval_submitted".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            family,
            details: serde_json::json!({
                "approval_form": form,
                "request_ids": request_ids,
            }),
        }
    }

    pub fn batch_processed(report: &BatchReport) -> Self {
        Self {
            event_type: "approval_batch_processed".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            family: report.family,
            details: serde_json::json!({
                "succeeded": report.succeeded(),
                "failed": report.failed_ids(),
                "skipped_in_review": report.skipped_in_review,
                "halted": report.halted,
            }),
        }
    }
}

/// A delivery endpoint with its optional signing secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookTarget {
    pub url: String,
    pub secret: Option<String>,
}

// ── HMAC Signing ─────────────────────────────────────────────

/// Compute HMAC-SHA256 of `payload` using `secret`.
/// Returns lowercase hex digest (e.g. "sha256=<hex>").
fn hmac_sha256_hex(secret: &str, payload: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(payload);
    let bytes = mac.finalize().into_bytes();
    format!("sha256={}", hex::encode(bytes))
}

// ── Webhook Notifier ──────────────────────────────────────────

/// Dispatches workflow events to the configured URLs.
/// Supports:
/// - HMAC-SHA256 signing (`x-approvals-signature` header)
/// - Up to 3 retries with back-off (1s, 5s, 25s)
///
/// Deliveries run in the background; short-lived callers `flush` before exit.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    targets: Vec<WebhookTarget>,
    backoff_secs: Vec<u64>,
    in_flight: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl WebhookNotifier {
    pub fn new(targets: Vec<WebhookTarget>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("approval-gate-webhook/1.0")
            .build()?;
        Ok(Self {
            client,
            targets,
            backoff_secs: vec![0, 1, 5, 25],
            in_flight: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Replace the delay schedule; one attempt per entry.
    pub fn with_backoff(mut self, backoff_secs: Vec<u64>) -> Self {
        self.backoff_secs = backoff_secs;
        self
    }

    /// Send one event to a single URL with retry.
    /// Returns `Ok(())` if delivery succeeded on any attempt.
    pub async fn send_signed(
        &self,
        url: &str,
        event: &WebhookEvent,
        signing_secret: Option<&str>,
    ) -> Result<()> {
        let payload = serde_json::to_vec(event)
            .map_err(|e| anyhow::anyhow!("webhook serialize error: {}", e))?;
        let delivery_id = uuid::Uuid::new_v4().to_string();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = signing_secret.map(|s| hmac_sha256_hex(s, &payload));

        for (attempt, &delay) in self.backoff_secs.iter().enumerate() {
            if delay > 0 {
                debug!(
                    url,
                    attempt,
                    delay_secs = delay,
                    event_type = %event.event_type,
                    "retrying webhook delivery"
                );
                tokio::time::sleep(Duration::from_secs(delay)).await;
            }

            let mut req = self
                .client
                .post(url)
                .header("content-type", "application/json")
                .header("x-approvals-delivery-id", &delivery_id)
                .header("x-approvals-timestamp", &timestamp)
                .header("x-approvals-event", &event.event_type);

            if let Some(ref sig) = signature {
                req = req.header("x-approvals-signature", sig.as_str());
            }

            match req.body(payload.clone()).send().await {
                Ok(resp) if resp.status().is_success() => {
                    info!(
                        url,
                        event_type = %event.event_type,
                        delivery_id = %delivery_id,
                        attempt,
                        "webhook delivered"
                    );
                    return Ok(());
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    warn!(
                        url,
                        event_type = %event.event_type,
                        delivery_id = %delivery_id,
                        attempt,
                        status = %status,
                        body = %body,
                        "webhook delivery failed (non-2xx)"
                    );
                }
                Err(e) => {
                    warn!(
                        url,
                        event_type = %event.event_type,
                        delivery_id = %delivery_id,
                        attempt,
                        error = %e,
                        "webhook request error"
                    );
                }
            }
        }

        Err(anyhow::anyhow!(
            "webhook delivery failed after {} attempts: {}",
            self.backoff_secs.len(),
            url
        ))
    }

    /// Dispatch an event to every target (fire-and-forget).
    ///
    /// Each URL is attempted independently with retry; failures in one do not block others.
    pub fn dispatch(&self, event: WebhookEvent) {
        if self.targets.is_empty() {
            debug!(event_type = %event.event_type, "no webhook targets, skipping");
            return;
        }

        let notifier = self.clone();
        let handle = tokio::spawn(async move {
            for target in &notifier.targets {
                if let Err(e) = notifier
                    .send_signed(&target.url, &event, target.secret.as_deref())
                    .await
                {
                    warn!(url = %target.url, error = %e, "webhook dispatch ultimately failed");
                }
            }
        });

        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        in_flight.retain(|h| !h.is_finished());
        in_flight.push(handle);
    }

    /// Waits for every dispatched delivery, retries included.
    pub async fn flush(&self) {
        let pending: Vec<JoinHandle<()>> = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            in_flight.drain(..).collect()
        };
        if pending.is_empty() {
            return;
        }
        debug!(count = pending.len(), "waiting for webhook deliveries");
        for handle in pending {
            if let Err(e) = handle.await {
                warn!(error = %e, "webhook delivery task aborted");
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────
