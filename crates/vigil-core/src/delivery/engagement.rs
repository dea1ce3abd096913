//! Live engagement measurement.
//!
//! Session-owned and never persisted: a rolling window of keystroke
//! instants plus the instant of the last activity of any kind.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::DeliveryConfig;
use crate::types::EngagementLevel;

/// Classification thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngagementThresholds {
    /// Keystrokes per second above which typing counts as deep.
    pub deep_velocity: f64,
    pub deep_recency: Duration,
    pub active_recency: Duration,
    pub idle_recency: Duration,
}

impl Default for EngagementThresholds {
    fn default() -> Self {
        Self::from(&DeliveryConfig::default())
    }
}

impl From<&DeliveryConfig> for EngagementThresholds {
    fn from(config: &DeliveryConfig) -> Self {
        Self {
            deep_velocity: config.deep_velocity,
            deep_recency: Duration::from_secs_f64(config.deep_recency_secs.max(0.0)),
            active_recency: Duration::from_secs_f64(config.active_recency_secs.max(0.0)),
            idle_recency: Duration::from_secs_f64(config.idle_recency_secs.max(0.0)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngagementTracker {
    keystrokes: VecDeque<Instant>,
    window: usize,
    last_activity: Option<Instant>,
    started_at: Instant,
    thresholds: EngagementThresholds,
}

impl EngagementTracker {
    pub fn new(window: usize, thresholds: EngagementThresholds, started_at: Instant) -> Self {
        Self {
            keystrokes: VecDeque::with_capacity(window),
            window: window.max(2),
            last_activity: None,
            started_at,
            thresholds,
        }
    }

    pub fn from_config(config: &DeliveryConfig, started_at: Instant) -> Self {
        Self::new(config.keystroke_window, config.into(), started_at)
    }

    /// A keystroke also counts as activity.
    pub fn record_keystroke(&mut self, at: Instant) {
        if self.keystrokes.len() == self.window {
            self.keystrokes.pop_front();
        }
        self.keystrokes.push_back(at);
        self.record_activity(at);
    }

    /// Mouse movement, clicks, scrolling.
    pub fn record_activity(&mut self, at: Instant) {
        self.last_activity = Some(match self.last_activity {
            Some(prev) => prev.max(at),
            None => at,
        });
    }

    /// Keystrokes per second across the window; 0 with fewer than two
    /// samples or a zero span.
    pub fn velocity(&self) -> f64 {
        let (Some(first), Some(last)) = (self.keystrokes.front(), self.keystrokes.back()) else {
            return 0.0;
        };
        let span = last.saturating_duration_since(*first).as_secs_f64();
        if self.keystrokes.len() < 2 || span <= 0.0 {
            return 0.0;
        }
        (self.keystrokes.len() - 1) as f64 / span
    }

    fn since_keystroke(&self, now: Instant) -> Option<Duration> {
        self.keystrokes
            .back()
            .map(|last| now.saturating_duration_since(*last))
    }

    fn since_activity(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity.unwrap_or(self.started_at))
    }

    pub fn level(&self, now: Instant) -> EngagementLevel {
        let t = &self.thresholds;
        if let Some(since_key) = self.since_keystroke(now) {
            if self.velocity() > t.deep_velocity && since_key < t.deep_recency {
                return EngagementLevel::Deep;
            }
            if since_key < t.active_recency {
                return EngagementLevel::Active;
            }
        }
        if self.since_activity(now) < t.idle_recency {
            EngagementLevel::Idle
        } else {
            EngagementLevel::Away
        }
    }

    /// Whole seconds since the last activity, or since the session started
    /// when there has been none.
    pub fn idle_seconds(&self, now: Instant) -> u64 {
        self.since_activity(now).as_secs()
    }

    pub fn keystroke_count(&self) -> usize {
        self.keystrokes.len()
    }

    /// Forget all samples, as on a page reload.
    pub fn reset(&mut self, at: Instant) {
        self.keystrokes.clear();
        self.last_activity = None;
        self.started_at = at;
    }
}
