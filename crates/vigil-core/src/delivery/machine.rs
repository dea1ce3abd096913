//! The bubble state machine.
//!
//! Pure and synchronous: it decides transitions and hands back what the
//! caller must do (mark delivered, resolve, hand off). Timers and I/O live
//! in [`BubbleSession`](super::BubbleSession).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{VigilError, VigilResult};
use crate::types::{EngagementLevel, QueueEntry};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BubbleState {
    /// Focus mode is on; nothing is shown.
    Hidden,
    #[default]
    Idle,
    /// An insight is selected but collapsed.
    Holding,
    /// The user opened the held insight.
    Expanded,
    /// The user asked to hear more; a conversation is being opened.
    Connected,
}

impl BubbleState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hidden => "hidden",
            Self::Idle => "idle",
            Self::Holding => "holding",
            Self::Expanded => "expanded",
            Self::Connected => "connected",
        }
    }
}

impl std::fmt::Display for BubbleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state plus at most one held entry.
#[derive(Debug, Clone, Default)]
pub struct DeliveryMachine {
    state: BubbleState,
    held: Option<QueueEntry>,
}

impl DeliveryMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> BubbleState {
        self.state
    }

    pub fn held(&self) -> Option<&QueueEntry> {
        self.held.as_ref()
    }

    /// Whether a poll may offer a new entry.
    pub fn accepts_offers(&self) -> bool {
        self.state == BubbleState::Idle
    }

    /// Focus mode changed. Turning it on hides the bubble from any state;
    /// turning it off brings back the held entry collapsed, if any.
    pub fn set_focus(&mut self, active: bool) {
        if active {
            if self.state == BubbleState::Connected {
                self.held = None;
            }
            self.state = BubbleState::Hidden;
        } else if self.state == BubbleState::Hidden {
            self.state = if self.held.is_some() {
                BubbleState::Holding
            } else {
                BubbleState::Idle
            };
        }
    }

    /// Offer an eligible entry found by a poll or session-start check.
    ///
    /// Returns `false` without changing state when engagement is deep.
    pub fn offer(&mut self, entry: QueueEntry, engagement: EngagementLevel) -> VigilResult<bool> {
        if self.state != BubbleState::Idle {
            return Err(VigilError::invalid_transition(self.state, "offer an insight"));
        }
        if engagement == EngagementLevel::Deep {
            return Ok(false);
        }
        self.held = Some(entry);
        self.state = BubbleState::Holding;
        Ok(true)
    }

    /// Open the held entry. Returns its id, which must be marked delivered.
    pub fn expand(&mut self) -> VigilResult<Uuid> {
        let id = match (&self.state, &self.held) {
            (BubbleState::Holding, Some(entry)) => entry.id,
            _ => return Err(VigilError::invalid_transition(self.state, "expand")),
        };
        self.state = BubbleState::Expanded;
        Ok(id)
    }

    /// Ask for more. Returns the entry to resolve as engaged and hand off.
    /// The entry stays held until [`handoff_complete`](Self::handoff_complete).
    pub fn tell_me_more(&mut self) -> VigilResult<QueueEntry> {
        let entry = match (&self.state, &self.held) {
            (BubbleState::Expanded, Some(entry)) => entry.clone(),
            _ => return Err(VigilError::invalid_transition(self.state, "tell me more")),
        };
        self.state = BubbleState::Connected;
        Ok(entry)
    }

    /// Dismiss the open entry. Returns its id, which must be resolved as
    /// dismissed.
    pub fn dismiss(&mut self) -> VigilResult<Uuid> {
        let id = match (&self.state, &self.held) {
            (BubbleState::Expanded, Some(entry)) => entry.id,
            _ => return Err(VigilError::invalid_transition(self.state, "dismiss")),
        };
        self.held = None;
        self.state = BubbleState::Idle;
        Ok(id)
    }

    /// The post-handoff delay elapsed.
    pub fn handoff_complete(&mut self) -> VigilResult<()> {
        if self.state != BubbleState::Connected {
            return Err(VigilError::invalid_transition(self.state, "finish a handoff"));
        }
        self.held = None;
        self.state = BubbleState::Idle;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ScheduledInsight, Signal, SignalCategory, SignalSource};
    use chrono::Utc;

    fn entry() -> QueueEntry {
        let now = Utc::now();
        let signal = Signal::new(
            SignalCategory::Contradiction,
            "I meant the other approach",
            &SignalSource::new("c"),
            now,
            0.8,
        );
        QueueEntry::new("ws", ScheduledInsight::new(signal, now))
    }

    #[test]
    fn test_starts_idle() {
        let machine = DeliveryMachine::new();
        assert_eq!(machine.state(), BubbleState::Idle);
        assert!(machine.held().is_none());
        assert!(machine.accepts_offers());
    }

    #[test]
    fn test_happy_path_dismiss() {
        let mut machine = DeliveryMachine::new();
        let e = entry();
        assert!(machine.offer(e.clone(), EngagementLevel::Idle).unwrap());
        assert_eq!(machine.state(), BubbleState::Holding);
        assert_eq!(machine.expand().unwrap(), e.id);
        assert_eq!(machine.state(), BubbleState::Expanded);
        assert_eq!(machine.dismiss().unwrap(), e.id);
        assert_eq!(machine.state(), BubbleState::Idle);
        assert!(machine.held().is_none());
    }

    #[test]
    fn test_happy_path_tell_me_more() {
        let mut machine = DeliveryMachine::new();
        let e = entry();
        machine.offer(e.clone(), EngagementLevel::Away).unwrap();
        machine.expand().unwrap();
        assert_eq!(machine.tell_me_more().unwrap().id, e.id);
        assert_eq!(machine.state(), BubbleState::Connected);
        assert!(machine.held().is_some());
        machine.handoff_complete().unwrap();
        assert_eq!(machine.state(), BubbleState::Idle);
        assert!(machine.held().is_none());
    }

    #[test]
    fn test_deep_engagement_never_offers() {
        let mut machine = DeliveryMachine::new();
        assert!(!machine.offer(entry(), EngagementLevel::Deep).unwrap());
        assert_eq!(machine.state(), BubbleState::Idle);
        assert!(machine.held().is_none());
    }

    #[test]
    fn test_only_one_entry_held() {
        let mut machine = DeliveryMachine::new();
        let first = entry();
        machine.offer(first.clone(), EngagementLevel::Idle).unwrap();
        let err = machine.offer(entry(), EngagementLevel::Idle).unwrap_err();
        assert!(matches!(err, VigilError::InvalidTransition { .. }));
        assert_eq!(machine.held().unwrap().id, first.id);

        machine.expand().unwrap();
        assert!(machine.offer(entry(), EngagementLevel::Idle).is_err());
        assert_eq!(machine.held().unwrap().id, first.id);
    }

    #[test]
    fn test_focus_hides_and_restores() {
        let mut machine = DeliveryMachine::new();
        machine.set_focus(true);
        assert_eq!(machine.state(), BubbleState::Hidden);
        assert!(machine.offer(entry(), EngagementLevel::Idle).is_err());
        machine.set_focus(false);
        assert_eq!(machine.state(), BubbleState::Idle);

        let e = entry();
        machine.offer(e.clone(), EngagementLevel::Idle).unwrap();
        machine.expand().unwrap();
        machine.set_focus(true);
        assert_eq!(machine.state(), BubbleState::Hidden);
        assert!(machine.dismiss().is_err());
        machine.set_focus(false);
        assert_eq!(machine.state(), BubbleState::Holding);
        assert_eq!(machine.held().unwrap().id, e.id);
    }

    #[test]
    fn test_focus_during_handoff_drops_entry() {
        let mut machine = DeliveryMachine::new();
        machine.offer(entry(), EngagementLevel::Idle).unwrap();
        machine.expand().unwrap();
        machine.tell_me_more().unwrap();
        machine.set_focus(true);
        assert!(machine.handoff_complete().is_err());
        machine.set_focus(false);
        assert_eq!(machine.state(), BubbleState::Idle);
    }

    #[test]
    fn test_illegal_transitions() {
        let mut machine = DeliveryMachine::new();
        tokio_test::assert_err!(machine.expand());
        tokio_test::assert_err!(machine.tell_me_more());
        tokio_test::assert_err!(machine.dismiss());
        tokio_test::assert_err!(machine.handoff_complete());

        machine.offer(entry(), EngagementLevel::Idle).unwrap();
        assert!(machine.dismiss().is_err());
        assert!(machine.tell_me_more().is_err());

        let err = machine.handoff_complete().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid transition: cannot finish a handoff while holding"
        );
    }

    #[test]
    fn test_focus_off_is_noop_outside_hidden() {
        let mut machine = DeliveryMachine::new();
        machine.offer(entry(), EngagementLevel::Idle).unwrap();
        machine.set_focus(false);
        assert_eq!(machine.state(), BubbleState::Holding);
    }
}
