//! Configuration for vigil.
//!
//! Every section has working defaults, so an empty file (or no file at all)
//! produces a usable in-memory setup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{VigilError, VigilResult};
use crate::events::FeedbackConfig;
use crate::types::SignalCategory;

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VigilConfig {
    pub detection: DetectionConfig,
    pub queue: QueueConfig,
    pub delivery: DeliveryConfig,
    /// Optional webhook that mirrors dismiss/engage outcomes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<FeedbackConfig>,
}

/// Signal detector tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Starting confidence for every match.
    pub base_confidence: f64,
    /// Upper clamp on confidence.
    pub max_confidence: f64,
    /// Characters of surrounding text kept on each side of a match.
    pub context_window: usize,
    /// Per-category replacements for the built-in confidence gates.
    pub gate_overrides: HashMap<SignalCategory, f64>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            base_confidence: 0.70,
            max_confidence: 0.95,
            context_window: 100,
            gate_overrides: HashMap::new(),
        }
    }
}

impl DetectionConfig {
    /// Effective confidence gate for a category.
    pub fn gate_for(&self, category: SignalCategory) -> Option<f64> {
        match self.gate_overrides.get(&category) {
            Some(gate) => Some(*gate),
            None => category.confidence_gate(),
        }
    }
}

/// Insight queue storage and enqueue policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Directory holding one SQLite file per workspace. `None` keeps every
    /// workspace in memory.
    pub data_dir: Option<PathBuf>,
    /// Skip enqueues that repeat an open entry from an earlier pass.
    pub cross_pass_dedup: bool,
    /// Idle gate applied to idle-triggered entries.
    pub default_min_idle_seconds: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            cross_pass_dedup: false,
            default_min_idle_seconds: 30,
        }
    }
}

/// Client-side delivery controller tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub poll_interval_secs: u64,
    /// Pause between a conversation handoff and returning to idle.
    pub handoff_delay_ms: u64,
    /// Number of keystroke instants kept for velocity.
    pub keystroke_window: usize,
    /// Keystrokes per second above which engagement is deep.
    pub deep_velocity: f64,
    pub deep_recency_secs: f64,
    pub active_recency_secs: f64,
    pub idle_recency_secs: f64,
    /// Run the one-shot peek when a session starts.
    pub session_start_check: bool,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            handoff_delay_ms: 1500,
            keystroke_window: 10,
            deep_velocity: 2.0,
            deep_recency_secs: 2.0,
            active_recency_secs: 10.0,
            idle_recency_secs: 60.0,
            session_start_check: true,
        }
    }
}

impl VigilConfig {
    /// Load configuration from a file. The format follows the extension:
    /// `.toml`, `.json`, `.yaml` or `.yml`.
    pub fn from_file(path: impl AsRef<Path>) -> VigilResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        let config: Self = match ext.as_str() {
            "toml" => toml::from_str(&raw)
                .map_err(|e| VigilError::Configuration(format!("Invalid TOML config: {}", e)))?,
            "json" => serde_json::from_str(&raw)
                .map_err(|e| VigilError::Configuration(format!("Invalid JSON config: {}", e)))?,
            "yaml" | "yml" => serde_yaml::from_str(&raw)
                .map_err(|e| VigilError::Configuration(format!("Invalid YAML config: {}", e)))?,
            other => {
                return Err(VigilError::Configuration(format!(
                    "Unsupported config format '{}' for {}",
                    other,
                    path.display()
                )))
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Create configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Overlay `VIGIL_*` environment variables onto this configuration.
    pub fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("VIGIL_DATA_DIR") {
            self.queue.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(flag) = env_parse::<bool>("VIGIL_CROSS_PASS_DEDUP") {
            self.queue.cross_pass_dedup = flag;
        }
        if let Some(secs) = env_parse::<u64>("VIGIL_MIN_IDLE_SECONDS") {
            self.queue.default_min_idle_seconds = secs;
        }
        if let Some(window) = env_parse::<usize>("VIGIL_CONTEXT_WINDOW") {
            self.detection.context_window = window;
        }
        if let Some(secs) = env_parse::<u64>("VIGIL_POLL_INTERVAL_SECS") {
            self.delivery.poll_interval_secs = secs;
        }
        if let Ok(url) = std::env::var("VIGIL_FEEDBACK_URL") {
            let mut feedback = FeedbackConfig::new(url);
            if let Ok(secret) = std::env::var("VIGIL_FEEDBACK_SECRET") {
                feedback = feedback.with_secret(secret);
            }
            self.feedback = Some(feedback);
        }
    }

    /// Store queues under the default data directory.
    pub fn persistent(mut self) -> Self {
        self.queue.data_dir = Some(default_data_dir());
        self
    }

    /// Reject values the components cannot work with.
    pub fn validate(&self) -> VigilResult<()> {
        let d = &self.detection;
        if !(0.0..=1.0).contains(&d.base_confidence) || !(0.0..=1.0).contains(&d.max_confidence) {
            return Err(VigilError::Configuration(
                "detection confidences must be within [0, 1]".to_string(),
            ));
        }
        if d.base_confidence > d.max_confidence {
            return Err(VigilError::Configuration(
                "detection.base_confidence exceeds max_confidence".to_string(),
            ));
        }
        if self.delivery.poll_interval_secs == 0 {
            return Err(VigilError::Configuration(
                "delivery.poll_interval_secs must be positive".to_string(),
            ));
        }
        if self.delivery.keystroke_window < 2 {
            return Err(VigilError::Configuration(
                "delivery.keystroke_window must hold at least 2 samples".to_string(),
            ));
        }
        Ok(())
    }
}

/// `~/.vigil/queues`, falling back to the working directory.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".vigil")
        .join("queues")
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = VigilConfig::default();
        assert_eq!(config.detection.base_confidence, 0.70);
        assert_eq!(config.detection.context_window, 100);
        assert!(config.queue.data_dir.is_none());
        assert!(!config.queue.cross_pass_dedup);
        assert_eq!(config.queue.default_min_idle_seconds, 30);
        assert_eq!(config.delivery.poll_interval_secs, 10);
        assert_eq!(config.delivery.keystroke_window, 10);
        assert!(config.feedback.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_gate_override() {
        let mut detection = DetectionConfig::default();
        assert_eq!(detection.gate_for(SignalCategory::Commitment), Some(0.70));
        detection.gate_overrides.insert(SignalCategory::Commitment, 0.85);
        assert_eq!(detection.gate_for(SignalCategory::Commitment), Some(0.85));
        assert_eq!(detection.gate_for(SignalCategory::Deadline), None);
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[queue]\ncross_pass_dedup = true\n\n[delivery]\npoll_interval_secs = 5\n\n[detection.gate_overrides]\nfollow_up = 0.8"
        )
        .unwrap();

        let config = VigilConfig::from_file(file.path()).unwrap();
        assert!(config.queue.cross_pass_dedup);
        assert_eq!(config.queue.default_min_idle_seconds, 30);
        assert_eq!(config.delivery.poll_interval_secs, 5);
        assert_eq!(config.detection.gate_for(SignalCategory::FollowUp), Some(0.8));
    }

    #[test]
    fn test_from_json_and_yaml_files() {
        let mut json = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(json, r#"{{"detection": {{"context_window": 40}}}}"#).unwrap();
        assert_eq!(
            VigilConfig::from_file(json.path()).unwrap().detection.context_window,
            40
        );

        let mut yaml = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(yaml, "feedback:\n  url: http://localhost:9000/hook").unwrap();
        let config = VigilConfig::from_file(yaml.path()).unwrap();
        assert_eq!(config.feedback.unwrap().url, "http://localhost:9000/hook");
    }

    #[test]
    fn test_rejects_unknown_format_and_bad_values() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(matches!(
            VigilConfig::from_file(file.path()),
            Err(VigilError::Configuration(_))
        ));

        let mut config = VigilConfig::default();
        config.detection.base_confidence = 0.99;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_persistent_uses_default_dir() {
        let config = VigilConfig::default().persistent();
        assert!(config.queue.data_dir.unwrap().ends_with("queues"));
    }
}
