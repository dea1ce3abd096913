//! Engagement-aware delivery.
//!
//! [`DeliveryMachine`] decides transitions, [`EngagementTracker`] measures
//! how busy the user is, and [`BubbleSession`] drives both from a poll
//! loop against an [`InsightSource`].

mod engagement;
mod machine;
mod session;
mod source;

pub use engagement::{EngagementThresholds, EngagementTracker};
pub use machine::{BubbleState, DeliveryMachine};
pub use session::BubbleSession;
pub use source::{ConversationHandoff, InsightSource};

#[cfg(test)]
pub use source::{MockConversationHandoff, MockInsightSource};
