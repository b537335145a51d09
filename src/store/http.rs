/// HTTP client for the backing JSON document store.
/// Uses reqwest-middleware so retries can be switched on per deployment.
use std::time::Duration;

use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::AppError;

/// Transport settings. Both knobs are off by default: no per-call timeout and
/// no retries, so a failed call halts the batch that issued it.
#[derive(Debug, Clone, Default)]
pub struct HttpSettings {
    pub timeout: Option<Duration>,
    pub max_retries: u32,
}

#[derive(Clone)]
pub struct StoreClient {
    base_url: String,
    client: ClientWithMiddleware,
}

impl StoreClient {
    pub fn new(base_url: &str, settings: &HttpSettings) -> Result<Self, AppError> {
        url::Url::parse(base_url)
            .map_err(|e| AppError::InvalidInput(format!("invalid store URL '{}': {}", base_url, e)))?;

        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .pool_max_idle_per_host(8)
            .connect_timeout(Duration::from_secs(5));
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        let reqwest_client = builder.build()?;

        let mut client = ClientBuilder::new(reqwest_client);
        if settings.max_retries > 0 {
            let retry_policy =
                ExponentialBackoff::builder().build_with_max_retries(settings.max_retries);
            client = client.with(RetryTransientMiddleware::new_with_policy(retry_policy));
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: client.build(),
        })
    }

    /// `data-reg/app-scheme/<id>` → `<base>/data-reg/app-scheme/<id>.json`.
    /// Each segment is percent-encoded; the empty path addresses the root.
    pub fn url_for(&self, path: &str) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();
        format!("{}/{}.json", self.base_url, encoded.join("/"))
    }

    pub async fn get_json(&self, path: &str) -> Result<Value, AppError> {
        let url = self.url_for(path);
        tracing::debug!(%url, "store GET");
        let resp = self.client.get(&url).send().await?;
        read_json(resp).await
    }

    /// POST a child under `path`. Returns the generated key (`{"name": ...}`).
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<String, AppError> {
        let url = self.url_for(path);
        tracing::debug!(%url, "store POST");
        let resp = self.client.post(&url).json(body).send().await?;
        let value = read_json(resp).await?;
        value
            .get("name")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| AppError::Store(format!("POST {} returned no generated key", url)))
    }

    pub async fn put_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<(), AppError> {
        let url = self.url_for(path);
        tracing::debug!(%url, "store PUT");
        let resp = self.client.put(&url).json(body).send().await?;
        read_json(resp).await.map(|_| ())
    }

    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<(), AppError> {
        let url = self.url_for(path);
        tracing::debug!(%url, "store PATCH");
        let resp = self.client.patch(&url).json(body).send().await?;
        read_json(resp).await.map(|_| ())
    }

    /// One server-side write carrying `{path: value | null}` pairs; `null` deletes.
    pub async fn multi_path_update(&self, updates: &Map<String, Value>) -> Result<(), AppError> {
        if updates.is_empty() {
            return Ok(());
        }
        tracing::debug!(paths = updates.len(), "store multi-path PATCH");
        self.patch_json("", updates).await
    }
}

async fn read_json(resp: reqwest::Response) -> Result<Value, AppError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(AppError::StoreStatus {
            status: status.as_u16(),
            body,
        });
    }
    let text = resp.text().await?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text)
        .map_err(|e| AppError::Store(format!("invalid JSON from store: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> StoreClient {
        StoreClient::new(&server.uri(), &HttpSettings::default()).unwrap()
    }

    #[test]
    fn test_url_for_encodes_segments() {
        let client = StoreClient::new("https://db.example.com/", &HttpSettings::default()).unwrap();
        assert_eq!(client.url_for(""), "https://db.example.com/.json");
        assert_eq!(
            client.url_for("data-reg/qst/a b"),
            "https://db.example.com/data-reg/qst/a%20b.json"
        );
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(StoreClient::new("not a url", &HttpSettings::default()).is_err());
    }

    #[tokio::test]
    async fn test_post_returns_generated_key() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/approval/app-scheme.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "-Nkey1"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let key = client_for(&mock_server)
            .post_json("approval/app-scheme", &json!({"a": 1}))
            .await
            .unwrap();
        assert_eq!(key, "-Nkey1");
    }

    #[tokio::test]
    async fn test_null_body_reads_as_null() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/approval/app-scheme.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .mount(&mock_server)
            .await;

        let v = client_for(&mock_server).get_json("approval/app-scheme").await.unwrap();
        assert!(v.is_null());
    }

    #[tokio::test]
    async fn test_non_success_maps_to_store_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/data-reg/qst/q1.json"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Permission denied"))
            .mount(&mock_server)
            .await;

        let err = client_for(&mock_server)
            .put_json("data-reg/qst/q1", &json!({}))
            .await
            .unwrap_err();
        match err {
            AppError::StoreStatus { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "Permission denied");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_multi_path_update_hits_root() {
        let mock_server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/.json"))
            .and(body_json(json!({"data-reg/qst/q1": null})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data-reg/qst/q1": null})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut updates = Map::new();
        updates.insert("data-reg/qst/q1".into(), Value::Null);
        client_for(&mock_server).multi_path_update(&updates).await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_multi_path_update_sends_nothing() {
        let mock_server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        client_for(&mock_server).multi_path_update(&Map::new()).await.unwrap();
    }
}
