//! HTTP client for wenwend.

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use wenwen_shared::api::{
    ChatMessage, ChatRequest, ChatResponse, DailyResetSummary, ErrorBody, HealthResponse,
};
use wenwen_shared::CoverageStats;

pub struct WenwenClient {
    base_url: String,
    client: reqwest::Client,
}

impl WenwenClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn chat(&self, message: &str, session_id: Option<String>) -> Result<ChatResponse> {
        let request = ChatRequest {
            session_id,
            message: Some(ChatMessage {
                role: "user".to_string(),
                content: message.to_string(),
            }),
            user_meta: None,
        };
        self.post("/chat", &request, None).await
    }

    pub async fn stats(&self) -> Result<CoverageStats> {
        self.get("/stats").await
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        self.get("/health").await
    }

    /// Needs an admin session token
    pub async fn daily_reset(&self, token: &str) -> Result<DailyResetSummary> {
        self.post("/jobs/daily-reset", &serde_json::json!({}), Some(token)).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .with_context(|| format!("Cannot reach wenwend at {}", self.base_url))?;
        decode(response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        token: Option<&str>,
    ) -> Result<T> {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("Cannot reach wenwend at {}", self.base_url))?;
        decode(response).await
    }
}

/// Body on success, the daemon's `{error}` payload otherwise
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .context("Unexpected response from wenwend");
    }

    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => Err(anyhow!(
            "{} ({}): {}",
            status,
            body.error.code,
            body.error.message
        )),
        Err(_) => Err(anyhow!("{}: {}", status, text.trim())),
    }
}
