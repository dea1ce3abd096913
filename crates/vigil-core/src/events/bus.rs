//! Broadcast bus for insight events.
//!
//! Emitting never blocks: a subscriber that falls behind skips the events
//! it missed.

use tokio::sync::broadcast;
use tracing::warn;

use super::InsightEvent;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<InsightEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    /// Fire and forget; with no subscribers the event is dropped.
    pub fn emit(&self, event: InsightEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct EventSubscriber {
    receiver: broadcast::Receiver<InsightEvent>,
}

impl EventSubscriber {
    /// Next event, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<InsightEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "Insight event subscriber lagged");
                }
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<InsightEvent> {
        self.receiver.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::InsightDeliveredEvent;
    use crate::types::{QueueEntry, ScheduledInsight, Signal, SignalCategory, SignalSource};
    use chrono::Utc;

    fn delivered() -> InsightEvent {
        let now = Utc::now();
        let signal = Signal::new(SignalCategory::FollowUp, "the invoice", &SignalSource::new("c"), now, 0.7);
        let entry = QueueEntry::new("ws", ScheduledInsight::new(signal, now));
        InsightEvent::Delivered(InsightDeliveredEvent::new(&entry, now))
    }

    #[tokio::test]
    async fn test_fan_out() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        let event = delivered();
        bus.emit(event.clone());

        assert_eq!(a.recv().await.unwrap(), event);
        assert_eq!(b.recv().await.unwrap(), event);
        assert!(a.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_ahead() {
        let bus = EventBus::with_capacity(2);
        let mut sub = bus.subscribe();
        let events: Vec<_> = (0..4).map(|_| delivered()).collect();
        for event in &events {
            bus.emit(event.clone());
        }
        assert_eq!(sub.recv().await.unwrap(), events[2]);
        assert_eq!(sub.recv().await.unwrap(), events[3]);
    }

    #[tokio::test]
    async fn test_closed_bus() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        bus.emit(delivered());
        assert_eq!(bus.subscriber_count(), 1);
        drop(bus);
        assert!(sub.recv().await.is_some());
        assert!(sub.recv().await.is_none());
    }
}
