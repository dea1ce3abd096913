//! Queue-facing insight types shared by the engine, server and client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::category::SignalCategory;
use super::signal::{Resolution, ScheduledInsight};

/// What kind of moment an insight waits for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryTrigger {
    /// Surface once the user has been idle long enough.
    #[default]
    Idle,
    /// Surface at the start of a session.
    SessionStart,
}

impl DeliveryTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::SessionStart => "session_start",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "session_start" => Some(Self::SessionStart),
            _ => None,
        }
    }
}

/// Coarse classification of how intensely the user is interacting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementLevel {
    Deep,
    Active,
    Idle,
    Away,
}

impl std::fmt::Display for EngagementLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Deep => "deep",
            Self::Active => "active",
            Self::Idle => "idle",
            Self::Away => "away",
        };
        f.write_str(s)
    }
}

/// The unit the queue exposes externally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: Uuid,
    pub workspace_id: String,
    pub insight: ScheduledInsight,
    pub delivery_trigger: DeliveryTrigger,
    /// The user must have been idle at least this long.
    pub min_idle_seconds: u64,
    #[serde(default)]
    pub context_tags: Vec<String>,
    /// Full context, revealed once the user opens the insight.
    pub expanded_content: String,
}

impl QueueEntry {
    /// Create an entry for a scheduled insight.
    pub fn new(workspace_id: impl Into<String>, insight: ScheduledInsight) -> Self {
        let expanded_content = insight.signal.context_snippet.clone();
        Self {
            id: Uuid::new_v4(),
            workspace_id: workspace_id.into(),
            insight,
            delivery_trigger: DeliveryTrigger::default(),
            min_idle_seconds: 0,
            context_tags: Vec::new(),
            expanded_content,
        }
    }

    /// Builder method to set the delivery trigger and idle gate.
    pub fn with_trigger(mut self, trigger: DeliveryTrigger, min_idle_seconds: u64) -> Self {
        self.delivery_trigger = trigger;
        self.min_idle_seconds = min_idle_seconds;
        self
    }

    /// Builder method to set context tags.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.context_tags = tags;
        self
    }

    /// Builder method to override the expanded content.
    pub fn with_expanded_content(mut self, content: impl Into<String>) -> Self {
        self.expanded_content = content.into();
        self
    }

    pub fn category(&self) -> SignalCategory {
        self.insight.signal.category()
    }

    pub fn content(&self) -> &str {
        &self.insight.signal.content
    }

    pub fn base_priority(&self) -> u8 {
        self.insight.signal.base_priority
    }

    pub fn confidence(&self) -> f64 {
        self.insight.signal.confidence
    }

    pub fn detected_at(&self) -> DateTime<Utc> {
        self.insight.signal.detected_at
    }

    pub fn surface_at(&self) -> DateTime<Utc> {
        self.insight.surface_at
    }

    pub fn is_resolved(&self) -> bool {
        self.insight.resolved
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.insight.resolution
    }
}

/// What a call to resolve actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveOutcome {
    /// Entry marked delivered; still open.
    MarkedDelivered,
    /// Entry closed as dismissed or engaged.
    Resolved,
    /// Entry was already closed; nothing changed.
    AlreadyResolved,
    /// No entry with that id.
    NotFound,
}

impl ResolveOutcome {
    /// Whether the call changed queue state.
    pub fn changed(self) -> bool {
        matches!(self, Self::MarkedDelivered | Self::Resolved)
    }
}

/// Poll/check request: "is there something to show right now?"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRequest {
    pub workspace_id: String,
    pub idle_seconds: u64,
    pub engagement: EngagementLevel,
    #[serde(default)]
    pub focus_mode_active: bool,
    /// Mark the returned entry delivered.
    #[serde(default)]
    pub deliver: bool,
}

impl CheckRequest {
    pub fn new(workspace_id: impl Into<String>, idle_seconds: u64, engagement: EngagementLevel) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            idle_seconds,
            engagement,
            focus_mode_active: false,
            deliver: false,
        }
    }

    pub fn with_focus(mut self, active: bool) -> Self {
        self.focus_mode_active = active;
        self
    }

    pub fn delivering(mut self) -> Self {
        self.deliver = true;
        self
    }
}

/// Poll/check response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResponse {
    pub has_insight: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insight: Option<QueueEntry>,
}

impl CheckResponse {
    pub fn empty() -> Self {
        Self {
            has_insight: false,
            insight: None,
        }
    }
}

impl From<Option<QueueEntry>> for CheckResponse {
    fn from(entry: Option<QueueEntry>) -> Self {
        Self {
            has_insight: entry.is_some(),
            insight: entry,
        }
    }
}
