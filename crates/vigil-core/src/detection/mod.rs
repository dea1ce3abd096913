//! Heuristic signal detection.
//!
//! Twelve categories of pattern rules run independently over one message
//! and share a single scoring, filtering and dedup pipeline. Detection is
//! pure: it never fails and never touches shared state.

mod detector;
mod rules;

pub use detector::{dedup_key, SignalDetector, DEDUP_PREFIX_CHARS};
pub use rules::{rule_set, RuleSet};

use chrono::Utc;

use crate::types::{Signal, SignalSource};

/// Detect signals in `text` with default settings, stamped with the
/// current time and an anonymous source.
pub fn detect(text: &str) -> Vec<Signal> {
    SignalDetector::default().detect(text, &SignalSource::default(), Utc::now())
}
