//! Insight client implementation for the vigil REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use vigil_core::error::{VigilError, VigilResult};
use vigil_core::{
    CheckRequest, CheckResponse, Exchange, InsightSource, QueueEntry, Resolution, ResolveOutcome,
};

const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Client for a vigil server.
#[derive(Clone)]
pub struct InsightClient {
    client: Client,
    base_url: Url,
}

#[derive(Debug, Deserialize)]
struct IngestResponse {
    entries: Vec<QueueEntry>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    entries: Vec<QueueEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ResolveResponse {
    outcome: ResolveOutcome,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl InsightClient {
    /// Create a client for the server at `base_url`.
    pub fn new(base_url: &str) -> VigilResult<Self> {
        Self::with_timeout(base_url, Duration::from_secs(10))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> VigilResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| VigilError::Configuration(format!("Invalid base url '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(VigilError::Configuration(format!(
                "Base url '{}' cannot carry a path",
                base_url
            )));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VigilError::Configuration(format!("HTTP client: {}", e)))?;
        Ok(Self { client, base_url })
    }

    /// Create a client from `VIGIL_BASE_URL` (default: `http://localhost:8080`).
    pub fn from_env() -> VigilResult<Self> {
        let base_url =
            std::env::var("VIGIL_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(&base_url)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Build a URL from path segments; each segment is percent-encoded.
    fn url(&self, segments: &[&str]) -> VigilResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| VigilError::Configuration("Base url cannot carry a path".to_string()))?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    async fn read<T: for<'de> Deserialize<'de>>(response: Response, action: &str) -> VigilResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            tracing::debug!(status = status.as_u16(), %message, action, "Server returned an error");
            return Err(VigilError::from_http_status(status.as_u16(), &message));
        }
        response
            .json()
            .await
            .map_err(|e| VigilError::parse(format!("Failed to parse {} response: {}", action, e)))
    }

    /// Detect, schedule and enqueue one exchange on the server.
    pub async fn ingest_exchange(&self, exchange: &Exchange) -> VigilResult<Vec<QueueEntry>> {
        let response = self
            .client
            .post(self.url(&["exchanges"])?)
            .json(exchange)
            .send()
            .await
            .map_err(|e| VigilError::api(format!("Failed to ingest exchange: {}", e)))?;

        let result: IngestResponse = Self::read(response, "ingest").await?;
        Ok(result.entries)
    }

    /// Poll the workspace queue. Marks the entry delivered only when the
    /// request says so.
    pub async fn check(&self, request: &CheckRequest) -> VigilResult<CheckResponse> {
        let body = json!({
            "idle_seconds": request.idle_seconds,
            "engagement": request.engagement,
            "focus_mode_active": request.focus_mode_active,
            "deliver": request.deliver,
        });

        let response = self
            .client
            .post(self.url(&["workspaces", &request.workspace_id, "check"])?)
            .json(&body)
            .send()
            .await
            .map_err(|e| VigilError::api(format!("Failed to check for insights: {}", e)))?;

        Self::read(response, "check").await
    }

    /// Record an outcome for an entry.
    pub async fn resolve(&self, entry_id: Uuid, outcome: Resolution) -> VigilResult<ResolveOutcome> {
        let id = entry_id.to_string();
        let response = self
            .client
            .post(self.url(&["insights", &id, "resolve"])?)
            .json(&json!({ "outcome": outcome }))
            .send()
            .await
            .map_err(|e| VigilError::api(format!("Failed to resolve insight: {}", e)))?;

        let result: ResolveResponse = Self::read(response, "resolve").await?;
        Ok(result.outcome)
    }

    /// Entries of one workspace, best-ranked first.
    pub async fn list(&self, workspace_id: &str, include_resolved: bool) -> VigilResult<Vec<QueueEntry>> {
        let mut url = self.url(&["workspaces", workspace_id, "insights"])?;
        url.query_pairs_mut()
            .append_pair("include_resolved", if include_resolved { "true" } else { "false" });

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| VigilError::api(format!("Failed to list insights: {}", e)))?;

        let result: ListResponse = Self::read(response, "list").await?;
        Ok(result.entries)
    }
}

#[async_trait]
impl InsightSource for InsightClient {
    async fn check(&self, request: CheckRequest) -> VigilResult<CheckResponse> {
        InsightClient::check(self, &request).await
    }

    async fn resolve(&self, entry_id: Uuid, outcome: Resolution) -> VigilResult<ResolveOutcome> {
        InsightClient::resolve(self, entry_id, outcome).await
    }
}
