//! In-process insight engine.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::VigilConfig;
use crate::delivery::InsightSource;
use crate::detection::SignalDetector;
use crate::error::{VigilError, VigilResult};
use crate::events::{
    spawn_mirror, EventBus, EventSubscriber, FeedbackSink, InsightDeliveredEvent,
    InsightEnqueuedEvent, InsightEvent, InsightResolvedEvent, NoopFeedbackSink,
    WebhookFeedbackSink,
};
use crate::queue::InsightQueue;
use crate::scheduling;
use crate::types::{
    CheckRequest, CheckResponse, DeliveryTrigger, QueueEntry, Resolution, ResolveOutcome,
    ScheduledInsight, Signal, SignalCategory, SignalSource,
};

/// One completed exchange from the conversation source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub workspace_id: String,
    pub message_text: String,
    pub source_conversation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_message_id: Option<String>,
}

impl Exchange {
    pub fn new(
        workspace_id: impl Into<String>,
        message_text: impl Into<String>,
        source_conversation_id: impl Into<String>,
    ) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            message_text: message_text.into(),
            source_conversation_id: source_conversation_id.into(),
            source_message_id: None,
        }
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.source_message_id = Some(message_id.into());
        self
    }

    fn source(&self) -> SignalSource {
        let source = SignalSource::new(self.source_conversation_id.clone());
        match &self.source_message_id {
            Some(id) => source.with_message(id.clone()),
            None => source,
        }
    }
}

/// Detector, scheduler and queue behind one facade, with lifecycle events
/// and the feedback mirror attached.
pub struct InsightEngine {
    detector: SignalDetector,
    queue: Arc<InsightQueue>,
    events: EventBus,
    feedback: Arc<dyn FeedbackSink>,
    default_min_idle_seconds: u64,
}

impl InsightEngine {
    /// Build an engine from configuration. Opens any persisted workspace
    /// lanes and, when configured, the webhook feedback sink.
    pub fn new(config: &VigilConfig) -> VigilResult<Self> {
        config.validate()?;
        let queue = InsightQueue::new(&config.queue)?;
        let feedback: Arc<dyn FeedbackSink> = match &config.feedback {
            Some(feedback) => Arc::new(WebhookFeedbackSink::new(feedback.clone())?),
            None => Arc::new(NoopFeedbackSink),
        };
        info!(
            persistent = config.queue.data_dir.is_some(),
            cross_pass_dedup = config.queue.cross_pass_dedup,
            feedback = config.feedback.is_some(),
            "Insight engine ready"
        );
        Ok(Self {
            detector: SignalDetector::new(config.detection.clone()),
            queue: Arc::new(queue),
            events: EventBus::new(),
            feedback,
            default_min_idle_seconds: config.queue.default_min_idle_seconds,
        })
    }

    /// Default settings, every workspace in memory, no feedback sink.
    pub fn in_memory() -> Self {
        Self {
            detector: SignalDetector::default(),
            queue: Arc::new(InsightQueue::in_memory()),
            events: EventBus::new(),
            feedback: Arc::new(NoopFeedbackSink),
            default_min_idle_seconds: crate::config::QueueConfig::default().default_min_idle_seconds,
        }
    }

    pub fn with_feedback(mut self, sink: Arc<dyn FeedbackSink>) -> Self {
        self.feedback = sink;
        self
    }

    pub fn with_queue(mut self, queue: InsightQueue) -> Self {
        self.queue = Arc::new(queue);
        self
    }

    pub fn queue(&self) -> &InsightQueue {
        &self.queue
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> EventSubscriber {
        self.events.subscribe()
    }

    pub fn detect(&self, text: &str, source: &SignalSource, now: DateTime<Utc>) -> Vec<Signal> {
        self.detector.detect(text, source, now)
    }

    pub fn schedule(&self, signal: Signal) -> ScheduledInsight {
        scheduling::schedule(signal)
    }

    /// Detect, schedule and enqueue everything in one exchange.
    pub async fn ingest_exchange(&self, exchange: Exchange) -> VigilResult<Vec<QueueEntry>> {
        self.ingest_exchange_at(exchange, Utc::now()).await
    }

    /// Returns the entries actually enqueued; duplicates skipped by the
    /// cross-pass policy are left out.
    pub async fn ingest_exchange_at(
        &self,
        exchange: Exchange,
        now: DateTime<Utc>,
    ) -> VigilResult<Vec<QueueEntry>> {
        if exchange.workspace_id.trim().is_empty() {
            return Err(VigilError::missing_field("workspace_id"));
        }

        let signals = self.detect(&exchange.message_text, &exchange.source(), now);
        let mut enqueued = Vec::with_capacity(signals.len());
        for signal in signals {
            let entry = self.entry_for(&exchange.workspace_id, self.schedule(signal));
            if let Some(entry) = self.queue.enqueue(entry)? {
                self.events
                    .emit(InsightEvent::Enqueued(InsightEnqueuedEvent::new(&entry, now)));
                enqueued.push(entry);
            }
        }

        debug!(
            workspace_id = %exchange.workspace_id,
            conversation_id = %exchange.source_conversation_id,
            enqueued = enqueued.len(),
            "Ingested exchange"
        );
        Ok(enqueued)
    }

    fn entry_for(&self, workspace_id: &str, insight: ScheduledInsight) -> QueueEntry {
        let category = insight.signal.category();
        let tags = vec![category.to_string()];
        let entry = QueueEntry::new(workspace_id, insight).with_tags(tags);
        match category {
            SignalCategory::RecurringPattern
            | SignalCategory::StaleDecision
            | SignalCategory::ContextDecay => entry.with_trigger(DeliveryTrigger::SessionStart, 0),
            _ => entry.with_trigger(DeliveryTrigger::Idle, self.default_min_idle_seconds),
        }
    }

    /// Answer a poll. Only a delivering check marks the entry.
    pub async fn check(&self, request: CheckRequest) -> VigilResult<CheckResponse> {
        self.check_at(request, Utc::now()).await
    }

    pub async fn check_at(
        &self,
        request: CheckRequest,
        now: DateTime<Utc>,
    ) -> VigilResult<CheckResponse> {
        let CheckRequest {
            workspace_id,
            idle_seconds,
            engagement,
            focus_mode_active,
            deliver,
        } = request;

        let entry = if deliver {
            self.queue
                .next_eligible(&workspace_id, now, idle_seconds, engagement, focus_mode_active)?
        } else {
            self.queue
                .peek(&workspace_id, now, idle_seconds, engagement, focus_mode_active)?
        };

        if let (true, Some(entry)) = (deliver, &entry) {
            self.events
                .emit(InsightEvent::Delivered(InsightDeliveredEvent::new(entry, now)));
        }
        Ok(entry.into())
    }

    /// Record an outcome. Dismiss and engage are mirrored to the feedback
    /// sink in the background.
    pub async fn resolve(&self, entry_id: Uuid, outcome: Resolution) -> VigilResult<ResolveOutcome> {
        self.resolve_at(entry_id, outcome, Utc::now()).await
    }

    pub async fn resolve_at(
        &self,
        entry_id: Uuid,
        outcome: Resolution,
        now: DateTime<Utc>,
    ) -> VigilResult<ResolveOutcome> {
        let result = self.queue.resolve(entry_id, outcome, now)?;
        if !result.changed() {
            debug!(%entry_id, outcome = outcome.as_str(), ?result, "Resolve was a no-op");
            return Ok(result);
        }

        let Some(entry) = self.queue.get(entry_id)? else {
            return Ok(result);
        };
        match outcome {
            Resolution::Delivered => {
                self.events
                    .emit(InsightEvent::Delivered(InsightDeliveredEvent::new(&entry, now)));
            }
            Resolution::Dismissed | Resolution::Engaged => {
                let event = InsightResolvedEvent::new(&entry, outcome, now);
                self.events.emit(InsightEvent::Resolved(event.clone()));
                spawn_mirror(self.feedback.clone(), event);
            }
        }
        info!(
            %entry_id,
            workspace_id = %entry.workspace_id,
            outcome = outcome.as_str(),
            "Resolved insight"
        );
        Ok(result)
    }
}

#[async_trait]
impl InsightSource for InsightEngine {
    async fn check(&self, request: CheckRequest) -> VigilResult<CheckResponse> {
        InsightEngine::check(self, request).await
    }

    async fn resolve(&self, entry_id: Uuid, outcome: Resolution) -> VigilResult<ResolveOutcome> {
        InsightEngine::resolve(self, entry_id, outcome).await
    }
}
