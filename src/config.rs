use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::models::family::{ApplyPolicy, EntityFamily};
use crate::notification::webhook::WebhookTarget;
use crate::store::http::HttpSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// Base URL of the JSON document store, e.g. `https://example.firebaseio.com`.
    pub store_url: String,
    /// Per-call timeout for store requests. `None` = wait indefinitely.
    pub http_timeout_secs: Option<u64>,
    /// Transient-failure retries for store requests. 0 = disabled.
    pub http_max_retries: u32,
    /// Lifetime of the cached review queue. 0 = always re-fetch.
    pub queue_ttl_secs: u64,
    pub app_scheme_policy: ApplyPolicy,
    pub recommended_questions_policy: ApplyPolicy,
    /// Comma-separated list of webhook URLs to notify on workflow events.
    pub webhook_urls: Vec<String>,
    pub webhook_secret: Option<String>,
    /// Browser origin allowed by CORS besides localhost.
    pub dashboard_origin: String,
    pub log_json: bool,
}

impl Config {
    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            timeout: self.http_timeout_secs.map(Duration::from_secs),
            max_retries: self.http_max_retries,
        }
    }

    pub fn policies(&self) -> HashMap<EntityFamily, ApplyPolicy> {
        HashMap::from([
            (EntityFamily::AppScheme, self.app_scheme_policy),
            (EntityFamily::RecommendedQuestions, self.recommended_questions_policy),
        ])
    }

    pub fn webhook_targets(&self) -> Vec<WebhookTarget> {
        self.webhook_urls
            .iter()
            .map(|url| WebhookTarget {
                url: url.clone(),
                secret: self.webhook_secret.clone(),
            })
            .collect()
    }

    pub fn queue_ttl(&self) -> Duration {
        Duration::from_secs(self.queue_ttl_secs)
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Builds the config from any key lookup; `load` uses the process environment.
pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
    let store_url = var("APPROVALS_STORE_URL")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow::anyhow!("APPROVALS_STORE_URL must be set"))?;
    url::Url::parse(&store_url)
        .map_err(|e| anyhow::anyhow!("APPROVALS_STORE_URL is not a valid URL: {}", e))?;

    let policy = |key: &str| -> anyhow::Result<ApplyPolicy> {
        match var(key) {
            Some(v) if !v.trim().is_empty() => v
                .parse()
                .map_err(|e: String| anyhow::anyhow!("{}: {}", key, e)),
            _ => Ok(ApplyPolicy::default()),
        }
    };

    Ok(Config {
        port: var("APPROVALS_PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080),
        store_url,
        http_timeout_secs: var("APPROVALS_HTTP_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .filter(|secs| *secs > 0),
        http_max_retries: var("APPROVALS_HTTP_MAX_RETRIES")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        queue_ttl_secs: var("APPROVALS_QUEUE_TTL_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(30),
        app_scheme_policy: policy("APPROVALS_APP_SCHEME_POLICY")?,
        recommended_questions_policy: policy("APPROVALS_RECOMMENDED_QUESTIONS_POLICY")?,
        webhook_urls: var("APPROVALS_WEBHOOK_URLS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        webhook_secret: var("APPROVALS_WEBHOOK_SECRET").filter(|s| !s.is_empty()),
        dashboard_origin: var("APPROVALS_DASHBOARD_ORIGIN")
            .unwrap_or_else(|| "http://localhost:3000".to_string()),
        log_json: matches!(
            var("APPROVALS_LOG_JSON").as_deref(),
            Some("1") | Some("true") | Some("TRUE")
        ),
    })
}
