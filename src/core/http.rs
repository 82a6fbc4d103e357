use crate::config::ApiConfig;
use crate::domain::model::{StatusEnvelope, SubmitEnvelope};
use crate::domain::ports::EnrichmentApi;
use crate::utils::error::{EnrichError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

const SELECTED_KEY_HEADER: &str = "X-Selected-Key";

/// 以 reqwest 實作的補全 API 傳輸層
#[derive(Debug, Clone)]
pub struct HttpEnrichmentApi {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    selected_key: Option<String>,
}

impl HttpEnrichmentApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            selected_key: None,
        })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        let mut api = Self::new(
            config.base_url.clone(),
            Duration::from_secs(config.request_timeout_seconds),
        )?;
        api.api_key = config.api_key.clone();
        api.selected_key = config.selected_key.clone();
        Ok(api)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_selected_key(mut self, selected_key: impl Into<String>) -> Self {
        self.selected_key = Some(selected_key.into());
        self
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn with_headers(&self, builder: RequestBuilder) -> RequestBuilder {
        let mut builder = builder
            .header("Content-Type", "application/json")
            .header("Accept", "application/json");

        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        if let Some(selected) = &self.selected_key {
            builder = builder.header(SELECTED_KEY_HEADER, selected);
        }
        builder
    }

    async fn read_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        tracing::debug!("API response status: {}", status);
        parse_envelope(status, &body)
    }
}

/// 非 2xx 的回應如果仍是服務的信封格式（有 success 或文字 status），照常解析，
/// 讓 `{success:false}` 與 `status: failed` 保留原本的意義
fn parse_envelope<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T> {
    if status.is_success() {
        return Ok(serde_json::from_str(body)?);
    }

    let parsed = serde_json::from_str::<Value>(body).ok();
    if let Some(value) = &parsed {
        let is_envelope = value.get("success").is_some()
            || value.get("status").and_then(Value::as_str).is_some();
        if is_envelope {
            if let Ok(envelope) = serde_json::from_value(value.clone()) {
                return Ok(envelope);
            }
        }
    }

    let message = parsed
        .as_ref()
        .and_then(|value| value.get("error").or_else(|| value.get("message")))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.chars().take(200).collect());

    Err(EnrichError::ApiError {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl EnrichmentApi for HttpEnrichmentApi {
    async fn submit(&self, path: &str, body: &Value) -> Result<SubmitEnvelope> {
        let url = self.url(path);
        tracing::debug!("POST {}", url);
        let response = self
            .with_headers(self.client.post(&url))
            .json(body)
            .send()
            .await?;
        Self::read_envelope(response).await
    }

    async fn fetch_status(&self, path: &str) -> Result<StatusEnvelope> {
        let url = self.url(path);
        tracing::debug!("GET {}", url);
        let response = self.with_headers(self.client.get(&url)).send().await?;
        Self::read_envelope(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::RemoteStatus;
    use httpmock::prelude::*;
    use serde_json::json;

    fn api(server: &MockServer) -> HttpEnrichmentApi {
        HttpEnrichmentApi::new(server.base_url(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_submit_sends_auth_headers_and_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v2/people/enrich")
                .header("Authorization", "Bearer secret")
                .header("X-Selected-Key", "team-b")
                .header("Content-Type", "application/json")
                .json_body(json!({"people": [{"email": "jane@acme.com"}]}));
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!({"success": true, "data": {"enrichmentID": "e-1"}}));
        });

        let api = api(&server)
            .with_api_key("secret")
            .with_selected_key("team-b");
        let envelope = api
            .submit(
                "/v2/people/enrich",
                &json!({"people": [{"email": "jane@acme.com"}]}),
            )
            .await
            .unwrap();

        mock.assert();
        assert!(envelope.success);
        assert_eq!(envelope.job_id("enrichmentID"), Some("e-1".to_string()));
    }

    #[tokio::test]
    async fn test_status_parses_envelope() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/v2/people/enrich/status/e-1");
            then.status(200).json_body(json!({
                "success": true,
                "status": "in_progress"
            }));
        });

        let envelope = api(&server)
            .fetch_status("/v2/people/enrich/status/e-1")
            .await
            .unwrap();

        mock.assert();
        assert_eq!(envelope.status, Some(RemoteStatus::Processing));
    }

    #[tokio::test]
    async fn test_error_status_with_envelope_keeps_meaning() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v2/companies/enrich");
            then.status(402)
                .json_body(json!({"success": false, "error": "insufficient credits"}));
        });

        let envelope = api(&server)
            .submit("/v2/companies/enrich", &json!({"companies": []}))
            .await
            .unwrap();

        assert!(!envelope.success);
        assert_eq!(envelope.error.as_deref(), Some("insufficient credits"));
    }

    #[tokio::test]
    async fn test_error_status_without_envelope_is_api_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/status/e-1");
            then.status(502).body("Bad Gateway");
        });

        let err = api(&server).fetch_status("status/e-1").await.unwrap_err();

        match err {
            EnrichError::ApiError { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_envelope_prefers_error_field() {
        let err = parse_envelope::<StatusEnvelope>(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"status": 500, "message": "boom"}"#,
        )
        .unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("boom"));
    }
}
