//! Shared scoring, filtering and dedup pipeline.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use regex::Match;
use strum::IntoEnumIterator;
use tracing::debug;

use super::rules::{rule_set, RuleSet};
use crate::config::DetectionConfig;
use crate::scheduling::resolve_deadline;
use crate::types::{Signal, SignalCategory, SignalSource};

/// Characters of content used as the per-pass dedup key.
pub const DEDUP_PREFIX_CHARS: usize = 30;

const TRAILING_PUNCT: &[char] = &[',', ';', ':', '-'];

/// Runs every category's rule set over a message.
///
/// Categories are evaluated independently: one producing nothing (or
/// having lost rules at compile time) has no effect on the others.
#[derive(Debug, Clone, Default)]
pub struct SignalDetector {
    config: DetectionConfig,
}

impl SignalDetector {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Detect signals in one message.
    ///
    /// Deterministic in `(text, source, now)`: categories run in
    /// declaration order, and within a category matches are ordered by
    /// rule and then by position.
    pub fn detect(&self, text: &str, source: &SignalSource, now: DateTime<Utc>) -> Vec<Signal> {
        let signals: Vec<Signal> = SignalCategory::iter()
            .flat_map(|category| self.detect_category(category, text, source, now))
            .collect();

        debug!(
            conversation_id = %source.conversation_id,
            text_len = text.len(),
            signals = signals.len(),
            "Detection pass complete"
        );
        signals
    }

    /// Run a single category's built-in rules.
    pub fn detect_category(
        &self,
        category: SignalCategory,
        text: &str,
        source: &SignalSource,
        now: DateTime<Utc>,
    ) -> Vec<Signal> {
        self.detect_with_rules(rule_set(category), text, source, now)
    }

    /// Run an arbitrary rule set through the shared pipeline.
    pub fn detect_with_rules(
        &self,
        rules: &RuleSet,
        text: &str,
        source: &SignalSource,
        now: DateTime<Utc>,
    ) -> Vec<Signal> {
        let category = rules.category;
        let mut seen = HashSet::new();
        let mut signals = Vec::new();

        for pattern in &rules.patterns {
            for caps in pattern.captures_iter(text) {
                let Some(full) = caps.get(0) else { continue };
                let captured = caps
                    .get(1)
                    .filter(|m| !normalize_content(m.as_str()).is_empty())
                    .unwrap_or(full);

                let content = normalize_content(captured.as_str());
                if !content_len_ok(category, content) || is_denied(category, content) {
                    continue;
                }

                let confidence = self.score(category, full.as_str());
                if let Some(gate) = self.config.gate_for(category) {
                    if confidence < gate {
                        continue;
                    }
                }

                if !seen.insert(dedup_key(content)) {
                    continue;
                }

                let snippet = context_snippet(text, &full, self.config.context_window);
                let mut signal = Signal::new(category, content, source, now, confidence)
                    .with_context(snippet);
                if category == SignalCategory::Deadline {
                    signal = signal.with_deadline(resolve_deadline(content, now));
                }
                signals.push(signal);
            }
        }

        signals
    }

    /// Confidence for a full match, rounded to two decimals.
    pub fn score(&self, category: SignalCategory, matched: &str) -> f64 {
        let len = matched.chars().count();
        let mut confidence = self.config.base_confidence;
        if len > 20 {
            confidence += 0.10;
        }
        if len > 40 {
            confidence += 0.05;
        }
        confidence += category.confidence_boost(matched);
        let clamped = confidence.min(self.config.max_confidence);
        (clamped * 100.0).round() / 100.0
    }
}

fn normalize_content(raw: &str) -> &str {
    raw.trim().trim_end_matches(TRAILING_PUNCT).trim_end()
}

fn content_len_ok(category: SignalCategory, content: &str) -> bool {
    let len = content.chars().count();
    len >= category.min_content_len() && len <= category.max_content_len()
}

fn is_denied(category: SignalCategory, content: &str) -> bool {
    let lower = content.to_lowercase();
    category.denylist().iter().any(|d| *d == lower)
}

/// Lower-cased, truncated content used to collapse repeats in one pass.
pub fn dedup_key(content: &str) -> String {
    content
        .to_lowercase()
        .chars()
        .take(DEDUP_PREFIX_CHARS)
        .collect()
}

/// Up to `window` characters on each side of the match, `...` where cut.
fn context_snippet(text: &str, full: &Match<'_>, window: usize) -> String {
    let before: Vec<char> = text[..full.start()].chars().collect();
    let after: Vec<char> = text[full.end()..].chars().collect();

    let lead: String = if before.len() > window {
        let kept: String = before[before.len() - window..].iter().collect();
        format!("...{}", kept)
    } else {
        before.iter().collect()
    };
    let trail: String = if after.len() > window {
        let kept: String = after[..window].iter().collect();
        format!("{}...", kept)
    } else {
        after.iter().collect()
    };

    format!("{}{}{}", lead, full.as_str(), trail).trim().to_string()
}
