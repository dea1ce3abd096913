//! Cross-pass deduplication.
//!
//! Detection collapses repeats within one message. Across messages the
//! queue keeps every entry unless this policy is switched on.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::store::InsightStore;
use crate::error::VigilResult;
use crate::types::{QueueEntry, SignalCategory};

/// Content fingerprint: md5 of the category and the case- and
/// whitespace-normalised content.
pub fn fingerprint(category: SignalCategory, content: &str) -> String {
    let normalized = content
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let category: &'static str = category.into();
    format!("{:x}", md5::compute(format!("{}:{}", category, normalized)))
}

/// Skip enqueues that repeat an open entry of the same category.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossPassDedup {
    window: Option<Duration>,
}

impl CrossPassDedup {
    /// Match against every open entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only match open entries detected within `window` of the new one.
    pub fn within(window: Duration) -> Self {
        Self {
            window: Some(window),
        }
    }

    fn since(&self, entry: &QueueEntry) -> Option<DateTime<Utc>> {
        self.window.map(|w| entry.detected_at() - w)
    }

    /// Insert `entry` unless it duplicates an open one. Returns the id of
    /// the existing entry when skipped.
    pub fn apply(&self, store: &dyn InsightStore, entry: &QueueEntry) -> VigilResult<Option<Uuid>> {
        store.insert_unique(entry, self.since(entry))
    }
}
