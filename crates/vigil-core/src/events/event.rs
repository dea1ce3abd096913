//! Insight lifecycle events.
//!
//! Emitted by the engine as entries move through the queue, so that
//! subscribers (a UI push channel, the feedback mirror, tests) can react.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{QueueEntry, Resolution, SignalCategory};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InsightEvent {
    Enqueued(InsightEnqueuedEvent),
    Delivered(InsightDeliveredEvent),
    Resolved(InsightResolvedEvent),
}

impl InsightEvent {
    /// Event type as a dotted name, used in webhook headers.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Enqueued(_) => "insight.enqueued",
            Self::Delivered(_) => "insight.delivered",
            Self::Resolved(_) => "insight.resolved",
        }
    }

    pub fn entry_id(&self) -> Uuid {
        match self {
            Self::Enqueued(e) => e.entry_id,
            Self::Delivered(e) => e.entry_id,
            Self::Resolved(e) => e.entry_id,
        }
    }

    pub fn workspace_id(&self) -> &str {
        match self {
            Self::Enqueued(e) => &e.workspace_id,
            Self::Delivered(e) => &e.workspace_id,
            Self::Resolved(e) => &e.workspace_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Enqueued(e) => e.timestamp,
            Self::Delivered(e) => e.timestamp,
            Self::Resolved(e) => e.timestamp,
        }
    }
}

/// A new entry entered the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightEnqueuedEvent {
    pub event_id: String,
    pub entry_id: Uuid,
    pub workspace_id: String,
    pub category: SignalCategory,
    pub base_priority: u8,
    pub surface_at: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
}

/// An entry was handed to a client with `deliver` set, or opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightDeliveredEvent {
    pub event_id: String,
    pub entry_id: Uuid,
    pub workspace_id: String,
    pub timestamp: DateTime<Utc>,
}

/// An entry was dismissed or engaged. This is the payload mirrored to the
/// feedback sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightResolvedEvent {
    pub event_id: String,
    pub entry_id: Uuid,
    pub workspace_id: String,
    pub category: SignalCategory,
    pub resolution: Resolution,
    pub timestamp: DateTime<Utc>,
}

impl InsightEnqueuedEvent {
    pub fn new(entry: &QueueEntry, at: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            entry_id: entry.id,
            workspace_id: entry.workspace_id.clone(),
            category: entry.category(),
            base_priority: entry.base_priority(),
            surface_at: entry.surface_at(),
            timestamp: at,
        }
    }
}

impl InsightDeliveredEvent {
    pub fn new(entry: &QueueEntry, at: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            entry_id: entry.id,
            workspace_id: entry.workspace_id.clone(),
            timestamp: at,
        }
    }
}

impl InsightResolvedEvent {
    pub fn new(entry: &QueueEntry, resolution: Resolution, at: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            entry_id: entry.id,
            workspace_id: entry.workspace_id.clone(),
            category: entry.category(),
            resolution,
            timestamp: at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ScheduledInsight, Signal, SignalSource};

    fn entry() -> QueueEntry {
        let now = Utc::now();
        let signal = Signal::new(
            SignalCategory::Dependency,
            "legal sign-off",
            &SignalSource::new("c"),
            now,
            0.8,
        );
        QueueEntry::new("ws-9", ScheduledInsight::new(signal, now))
    }

    #[test]
    fn test_event_accessors() {
        let e = entry();
        let at = Utc::now();
        let event = InsightEvent::Resolved(InsightResolvedEvent::new(&e, Resolution::Engaged, at));
        assert_eq!(event.event_type(), "insight.resolved");
        assert_eq!(event.entry_id(), e.id);
        assert_eq!(event.workspace_id(), "ws-9");
        assert_eq!(event.timestamp(), at);
    }

    #[test]
    fn test_serializes_with_type_tag() {
        let e = entry();
        let event = InsightEvent::Enqueued(InsightEnqueuedEvent::new(&e, Utc::now()));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "enqueued");
        assert_eq!(json["category"], "dependency");
        assert_eq!(json["base_priority"], 6);
    }
}
