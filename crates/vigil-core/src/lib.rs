//! vigil-core - Core library for vigil.
//!
//! Finds actionable signals in conversation text (commitments, deadlines,
//! people waiting on a reply, ...), schedules when each is worth raising,
//! keeps them in a per-workspace priority queue and delivers them through
//! an engagement-aware state machine that stays out of the way while the
//! user is busy.
//!
//! # Example
//!
//! ```ignore
//! use vigil_core::{CheckRequest, EngagementLevel, Exchange, InsightEngine};
//!
//! let engine = InsightEngine::in_memory();
//! engine
//!     .ingest_exchange(Exchange::new("ws", "I'll send the proposal to Mike tomorrow", "conv-1"))
//!     .await?;
//!
//! let response = engine
//!     .check(CheckRequest::new("ws", 45, EngagementLevel::Idle).delivering())
//!     .await?;
//! ```

pub mod config;
pub mod delivery;
pub mod detection;
pub mod engine;
pub mod error;
pub mod events;
pub mod queue;
pub mod runtime;
pub mod scheduling;
pub mod types;

// Re-export commonly used types
pub use config::{DeliveryConfig, DetectionConfig, QueueConfig, VigilConfig};
pub use delivery::{
    BubbleSession, BubbleState, ConversationHandoff, DeliveryMachine, EngagementTracker,
    InsightSource,
};
pub use detection::{detect, SignalDetector};
pub use engine::{Exchange, InsightEngine};
pub use error::{ErrorCode, VigilError, VigilResult};
pub use events::{EventBus, FeedbackConfig, FeedbackSink, InsightEvent};
pub use queue::{InsightQueue, InsightStore, SqliteInsightStore};
pub use runtime::{DetectionWorker, WorkerConfig};
pub use scheduling::schedule;
pub use types::{
    CheckRequest, CheckResponse, DeliveryTrigger, EngagementLevel, QueueEntry, Resolution,
    ResolveOutcome, ScheduledInsight, Signal, SignalCategory, SignalSource,
};
