//! Feedback mirror.
//!
//! Dismiss and engage outcomes are forwarded to an external learning
//! store. The queue's own resolution is authoritative: mirror failures are
//! logged and never reach the caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{InsightEvent, InsightResolvedEvent};
use crate::error::{VigilError, VigilResult};

/// Header carrying the HMAC signature of the request body.
pub const SIGNATURE_HEADER: &str = "X-Vigil-Signature";

/// Receives dismiss/engage outcomes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeedbackSink: Send + Sync {
    async fn record(&self, event: &InsightResolvedEvent) -> VigilResult<()>;
}

/// Sink used when no feedback store is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFeedbackSink;

#[async_trait]
impl FeedbackSink for NoopFeedbackSink {
    async fn record(&self, event: &InsightResolvedEvent) -> VigilResult<()> {
        debug!(entry_id = %event.entry_id, "No feedback sink configured");
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 200,
            max_delay_ms: 10_000,
            multiplier: 2.0,
        }
    }
}

/// Where and how to mirror feedback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackConfig {
    pub url: String,
    /// HMAC-SHA256 signing secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    10
}

impl FeedbackConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            secret: None,
            retry: RetryPolicy::default(),
            timeout_secs: default_timeout(),
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[derive(Debug)]
enum DeliveryError {
    /// Network failure or 5xx; worth retrying.
    Transient(String),
    /// 4xx; retrying won't help.
    Permanent(String),
}

impl std::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transient(msg) => write!(f, "transient: {}", msg),
            Self::Permanent(msg) => write!(f, "permanent: {}", msg),
        }
    }
}

/// Posts resolved events as signed JSON to an HTTP endpoint.
#[derive(Clone)]
pub struct WebhookFeedbackSink {
    client: Client,
    config: FeedbackConfig,
}

impl WebhookFeedbackSink {
    pub fn new(config: FeedbackConfig) -> VigilResult<Self> {
        if config.url.trim().is_empty() {
            return Err(VigilError::Configuration(
                "feedback url must not be empty".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VigilError::Configuration(format!("HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FeedbackConfig {
        &self.config
    }

    async fn post(&self, event: &InsightEvent) -> Result<(), DeliveryError> {
        let payload = serde_json::to_string(event)
            .map_err(|e| DeliveryError::Permanent(format!("serialization: {}", e)))?;
        let signature = match &self.config.secret {
            Some(secret) => sign_payload(&payload, secret).map_err(DeliveryError::Permanent)?,
            None => String::new(),
        };
        let event_type = event.event_type();

        let post_once = || async {
            let response = self
                .client
                .post(&self.config.url)
                .header("Content-Type", "application/json")
                .header(SIGNATURE_HEADER, &signature)
                .header("X-Vigil-Event", event_type)
                .header("X-Vigil-Delivery", uuid::Uuid::new_v4().to_string())
                .body(payload.clone())
                .send()
                .await
                .map_err(|e| DeliveryError::Transient(e.to_string()))?;

            let status = response.status();
            if status.is_success() {
                Ok(())
            } else if status.is_server_error() {
                Err(DeliveryError::Transient(format!("server error {}", status)))
            } else {
                let body = response.text().await.unwrap_or_default();
                Err(DeliveryError::Permanent(format!("{}: {}", status, body)))
            }
        };

        let policy = &self.config.retry;
        post_once
            .retry(
                ExponentialBuilder::default()
                    .with_max_times(policy.max_retries as usize)
                    .with_min_delay(Duration::from_millis(policy.initial_delay_ms))
                    .with_max_delay(Duration::from_millis(policy.max_delay_ms))
                    .with_factor(policy.multiplier),
            )
            .when(|e| matches!(e, DeliveryError::Transient(_)))
            .notify(|err, dur| {
                warn!(url = %self.config.url, ?dur, %err, "Feedback delivery failed, retrying");
            })
            .await
    }
}

#[async_trait]
impl FeedbackSink for WebhookFeedbackSink {
    async fn record(&self, event: &InsightResolvedEvent) -> VigilResult<()> {
        self.post(&InsightEvent::Resolved(event.clone()))
            .await
            .map_err(|e| VigilError::feedback(format!("{}: {}", self.config.url, e)))
    }
}

/// Mirror an outcome in the background. Errors are logged and dropped.
pub fn spawn_mirror(sink: Arc<dyn FeedbackSink>, event: InsightResolvedEvent) -> JoinHandle<()> {
    tokio::spawn(async move {
        match sink.record(&event).await {
            Ok(()) => debug!(entry_id = %event.entry_id, resolution = event.resolution.as_str(), "Feedback mirrored"),
            Err(e) => warn!(entry_id = %event.entry_id, error = %e, "Feedback mirror failed"),
        }
    })
}

fn sign_payload(payload: &str, secret: &str) -> Result<String, String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|e| e.to_string())?;
    mac.update(payload.as_bytes());
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

/// Check a `sha256=<hex>` signature against a payload. For receivers.
pub fn verify_signature(payload: &str, secret: &str, signature: &str) -> bool {
    match sign_payload(payload, secret) {
        Ok(expected) => constant_time_eq(expected.as_bytes(), signature.as_bytes()),
        Err(_) => false,
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{QueueEntry, Resolution, ScheduledInsight, Signal, SignalCategory, SignalSource};
    use chrono::Utc;

    fn resolved() -> InsightResolvedEvent {
        let now = Utc::now();
        let signal = Signal::new(SignalCategory::Commitment, "send the deck", &SignalSource::new("c"), now, 0.9);
        let entry = QueueEntry::new("ws", ScheduledInsight::new(signal, now));
        InsightResolvedEvent::new(&entry, Resolution::Dismissed, now)
    }

    #[test]
    fn test_signature_round_trip() {
        let payload = r#"{"type":"resolved"}"#;
        let signature = sign_payload(payload, "s3cret").unwrap();
        assert!(signature.starts_with("sha256="));
        assert!(verify_signature(payload, "s3cret", &signature));
        assert!(!verify_signature(payload, "other", &signature));
        assert!(!verify_signature("{}", "s3cret", &signature));
        assert!(!verify_signature(payload, "s3cret", "sha256=00"));
    }

    #[test]
    fn test_config_defaults_from_json() {
        let config: FeedbackConfig =
            serde_json::from_str(r#"{"url":"http://localhost:9/feedback"}"#).unwrap();
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.retry.max_retries, 3);
        assert!(config.secret.is_none());
    }

    #[test]
    fn test_empty_url_rejected() {
        assert!(matches!(
            WebhookFeedbackSink::new(FeedbackConfig::new("  ")),
            Err(VigilError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_reports_feedback_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = FeedbackConfig::new(format!("http://127.0.0.1:{}/feedback", port))
            .with_retry(RetryPolicy {
                max_retries: 0,
                ..RetryPolicy::default()
            });
        let sink = WebhookFeedbackSink::new(config).unwrap();
        let err = sink.record(&resolved()).await.unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::FbkMirrorFailed);
    }

    #[tokio::test]
    async fn test_mirror_swallows_errors() {
        let mut sink = MockFeedbackSink::new();
        sink.expect_record()
            .times(1)
            .returning(|_| Err(VigilError::feedback("down")));
        spawn_mirror(Arc::new(sink), resolved()).await.unwrap();
    }

    #[tokio::test]
    async fn test_noop_sink() {
        tokio_test::assert_ok!(NoopFeedbackSink.record(&resolved()).await);
    }
}
