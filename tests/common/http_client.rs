//! HTTP client helpers for tests.

use intervue::INTERVUE_STATUS_HEADER;
use intervue::gateway::payload::SessionResponse;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TestClient {
    client: reqwest::Client,
    base_url: String,
}

impl TestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("{}/{}", self.base_url, path)
    }

    /// Returns the session plus the `X-Intervue-Status` header value.
    pub async fn start_session(
        &self,
        body: serde_json::Value,
    ) -> Result<(SessionResponse, String), TestClientError> {
        let resp = self
            .client
            .post(self.url("/v1/sessions"))
            .json(&body)
            .send()
            .await?;
        Self::session_response(resp).await
    }

    pub async fn answer(
        &self,
        session_id: &str,
        answer: &str,
    ) -> Result<(SessionResponse, String), TestClientError> {
        let resp = self
            .client
            .post(self.url(&format!("/v1/sessions/{}/answers", session_id)))
            .json(&serde_json::json!({ "answer": answer }))
            .send()
            .await?;
        Self::session_response(resp).await
    }

    pub async fn batch(
        &self,
        session_id: &str,
        answers: &[&str],
    ) -> Result<(SessionResponse, String), TestClientError> {
        let resp = self
            .client
            .post(self.url(&format!("/v1/sessions/{}/batch", session_id)))
            .json(&serde_json::json!({ "answers": answers }))
            .send()
            .await?;
        Self::session_response(resp).await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<SessionResponse, TestClientError> {
        let resp = self
            .client
            .get(self.url(&format!("/v1/sessions/{}", session_id)))
            .send()
            .await?;
        Self::session_response(resp).await.map(|(s, _)| s)
    }

    pub async fn abandon(&self, session_id: &str) -> Result<SessionResponse, TestClientError> {
        let resp = self
            .client
            .delete(self.url(&format!("/v1/sessions/{}", session_id)))
            .send()
            .await?;
        Self::session_response(resp).await.map(|(s, _)| s)
    }

    pub async fn stats(&self) -> Result<serde_json::Value, TestClientError> {
        let resp = self.client.get(self.url("/v1/stats")).send().await?;
        Ok(resp.json().await?)
    }

    pub async fn health(&self) -> Result<HealthResponse, TestClientError> {
        let resp = self.client.get(self.url("/healthz")).send().await?;

        if resp.status().is_success() {
            Ok(resp.json().await?)
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            Err(TestClientError::UnexpectedStatus(status, body))
        }
    }

    pub async fn ready(&self) -> Result<ReadyResponse, TestClientError> {
        let resp = self.client.get(self.url("/ready")).send().await?;

        if resp.status().is_success() {
            Ok(resp.json().await?)
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            Err(TestClientError::UnexpectedStatus(status, body))
        }
    }

    async fn session_response(
        resp: reqwest::Response,
    ) -> Result<(SessionResponse, String), TestClientError> {
        let status_header = resp
            .headers()
            .get(INTERVUE_STATUS_HEADER)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        match resp.status().as_u16() {
            200 | 201 => Ok((resp.json().await?, status_header)),
            400 => Err(TestClientError::BadRequest(resp.text().await?)),
            404 => Err(TestClientError::NotFound(resp.text().await?)),
            409 => Err(TestClientError::Conflict(resp.text().await?)),
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(TestClientError::UnexpectedStatus(status, body))
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ComponentStatus {
    pub http: String,
    pub storage: String,
    pub storage_mode: String,
    pub model: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub components: ComponentStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum TestClientError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unexpected HTTP status: {0} - Body: {1}")]
    UnexpectedStatus(u16, String),
}
