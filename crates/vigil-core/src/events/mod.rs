//! Insight lifecycle events and the feedback mirror.

mod bus;
mod event;
mod feedback;

pub use bus::{EventBus, EventSubscriber};
pub use event::{InsightDeliveredEvent, InsightEnqueuedEvent, InsightEvent, InsightResolvedEvent};
pub use feedback::{
    spawn_mirror, verify_signature, FeedbackConfig, FeedbackSink, NoopFeedbackSink, RetryPolicy,
    WebhookFeedbackSink, SIGNATURE_HEADER,
};

#[cfg(test)]
pub use feedback::MockFeedbackSink;
