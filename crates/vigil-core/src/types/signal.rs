//! Signals and their scheduled form.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::category::SignalCategory;

/// Where a message came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalSource {
    /// Conversation the message belongs to.
    pub conversation_id: String,
    /// Message within the conversation, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

impl SignalSource {
    /// Create a source for a conversation.
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            message_id: None,
        }
    }

    /// Builder method to set the message id.
    pub fn with_message(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }
}

/// How a deadline phrase was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateKind {
    /// A calendar date: month name, MM/DD or ISO.
    Absolute,
    /// A phrase relative to detection time: "tomorrow", "in 3 days".
    Relative,
    /// No date could be resolved (event-anchored or unparseable).
    Unresolved,
}

/// Result of resolving a deadline phrase against a reference instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineResolution {
    pub kind: DateKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

impl DeadlineResolution {
    pub fn absolute(date: NaiveDate) -> Self {
        Self {
            kind: DateKind::Absolute,
            date: Some(date),
        }
    }

    pub fn relative(date: NaiveDate) -> Self {
        Self {
            kind: DateKind::Relative,
            date: Some(date),
        }
    }

    pub fn unresolved() -> Self {
        Self {
            kind: DateKind::Unresolved,
            date: None,
        }
    }

    /// Base priority a deadline earns from its resolution kind.
    pub fn base_priority(&self) -> u8 {
        match self.kind {
            DateKind::Absolute => 8,
            DateKind::Relative => 7,
            DateKind::Unresolved => SignalCategory::Deadline.base_priority(),
        }
    }
}

/// A candidate extraction from one message.
///
/// The category is fixed at construction and only exposed read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    category: SignalCategory,
    /// The matched span, trimmed.
    pub content: String,
    /// Surrounding text, `...`-marked where truncated.
    pub context_snippet: String,
    pub source_conversation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_message_id: Option<String>,
    pub detected_at: DateTime<Utc>,
    /// 0.0 - 0.95.
    pub confidence: f64,
    /// 1 - 10, fixed per category (deadlines: per resolution kind).
    pub base_priority: u8,
    /// Only present on deadline signals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DeadlineResolution>,
}

impl Signal {
    /// Create a signal with the category's base priority.
    pub fn new(
        category: SignalCategory,
        content: impl Into<String>,
        source: &SignalSource,
        detected_at: DateTime<Utc>,
        confidence: f64,
    ) -> Self {
        Self {
            category,
            content: content.into(),
            context_snippet: String::new(),
            source_conversation_id: source.conversation_id.clone(),
            source_message_id: source.message_id.clone(),
            detected_at,
            confidence,
            base_priority: category.base_priority(),
            deadline: None,
        }
    }

    /// The signal's category.
    pub fn category(&self) -> SignalCategory {
        self.category
    }

    /// Builder method to set the context snippet.
    pub fn with_context(mut self, snippet: impl Into<String>) -> Self {
        self.context_snippet = snippet.into();
        self
    }

    /// Builder method to attach a deadline resolution; adjusts base priority.
    pub fn with_deadline(mut self, resolution: DeadlineResolution) -> Self {
        self.base_priority = resolution.base_priority();
        self.deadline = Some(resolution);
        self
    }

    /// Resolved deadline date, if any.
    pub fn resolved_date(&self) -> Option<NaiveDate> {
        self.deadline.and_then(|d| d.date)
    }
}

/// Terminal and non-terminal outcomes recorded against an insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Shown to the user; still open for dismiss/engage.
    Delivered,
    /// User dismissed it.
    Dismissed,
    /// User asked to hear more.
    Engaged,
}

impl Resolution {
    /// Whether this outcome closes the insight.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Delivered)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Dismissed => "dismissed",
            Self::Engaged => "engaged",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "delivered" => Some(Self::Delivered),
            "dismissed" => Some(Self::Dismissed),
            "engaged" => Some(Self::Engaged),
            _ => None,
        }
    }
}

/// A signal annotated with delivery metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledInsight {
    pub signal: Signal,
    /// Earliest instant the insight may be delivered. Never before detection.
    pub surface_at: DateTime<Utc>,
    pub resolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
}

impl ScheduledInsight {
    /// Wrap a signal; `surface_at` is clamped to the detection instant.
    pub fn new(signal: Signal, surface_at: DateTime<Utc>) -> Self {
        let surface_at = surface_at.max(signal.detected_at);
        Self {
            signal,
            surface_at,
            resolved: false,
            resolved_at: None,
            resolution: None,
            delivered_at: None,
        }
    }

    /// Whether the insight is eligible by time alone.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.resolved && self.surface_at <= now
    }
}
