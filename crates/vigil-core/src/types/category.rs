//! Signal categories.
//!
//! Each category is data: a base priority, a confidence gate, a content
//! length range, a denylist and a surfacing offset. The detector and the
//! scheduler dispatch on this enum instead of per-category types.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// The twelve fixed signal categories.
///
/// Categories serialize to snake_case for storage and wire compatibility.
/// Declaration order is the order in which the detector evaluates them.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SignalCategory {
    /// "I'll send it over tomorrow."
    Commitment,
    /// A date or event the user has to hit.
    Deadline,
    /// Something to circle back on.
    FollowUp,
    /// Work blocked on someone or something else.
    Dependency,
    /// The user corrected or reversed themselves.
    Contradiction,
    /// A question nobody answered yet.
    OpenQuestion,
    /// Someone is waiting on the user.
    PeopleWaiting,
    /// Something that happens on a cadence.
    RecurringPattern,
    /// A decision worth revisiting later.
    StaleDecision,
    /// Context that is getting old.
    ContextDecay,
    /// Work that was started but not finished.
    UnfinishedWork,
    /// A break from the usual routine.
    PatternBreak,
}

impl SignalCategory {
    /// Returns all category names as static strings, in evaluation order.
    pub fn all_names() -> Vec<&'static str> {
        Self::iter().map(|c| c.into()).collect()
    }

    /// Fixed base priority (1-10).
    ///
    /// Deadlines return their unresolved default here; the detector raises
    /// them to 7 (relative phrase) or 8 (absolute date) once a date resolves.
    pub fn base_priority(self) -> u8 {
        match self {
            Self::Contradiction => 8,
            Self::PatternBreak | Self::PeopleWaiting => 7,
            Self::Deadline
            | Self::Commitment
            | Self::Dependency
            | Self::UnfinishedWork => 6,
            Self::FollowUp | Self::OpenQuestion | Self::StaleDecision => 5,
            Self::RecurringPattern | Self::ContextDecay => 4,
        }
    }

    /// Minimum confidence a match needs to survive. Deadlines are ungated.
    pub fn confidence_gate(self) -> Option<f64> {
        match self {
            Self::Deadline => None,
            Self::Commitment | Self::Dependency => Some(0.70),
            Self::FollowUp
            | Self::Contradiction
            | Self::OpenQuestion
            | Self::PeopleWaiting
            | Self::UnfinishedWork
            | Self::PatternBreak => Some(0.65),
            Self::RecurringPattern | Self::StaleDecision | Self::ContextDecay => Some(0.60),
        }
    }

    /// Minimum trimmed content length in characters.
    pub fn min_content_len(self) -> usize {
        match self {
            Self::Commitment => 5,
            _ => 3,
        }
    }

    /// Maximum trimmed content length in characters.
    pub fn max_content_len(self) -> usize {
        100
    }

    /// Degenerate contents that are discarded outright (lower-case).
    pub fn denylist(self) -> &'static [&'static str] {
        match self {
            Self::Commitment => &["know", "see", "check", "look", "think", "try"],
            Self::FollowUp | Self::Dependency => &["that", "this", "them", "you"],
            Self::OpenQuestion => &["what do you think?", "how does that sound?", "what about you?"],
            _ => &[],
        }
    }

    /// Fixed delay between detection and eligibility for non-deadline
    /// categories. Deadlines are scheduled from their resolved date and
    /// return `None`.
    pub fn surface_offset(self) -> Option<Duration> {
        match self {
            Self::Deadline => None,
            Self::Contradiction | Self::PatternBreak => Some(Duration::zero()),
            Self::RecurringPattern => Some(Duration::days(1)),
            Self::Commitment => Some(Duration::days(2)),
            Self::PeopleWaiting => Some(Duration::days(3)),
            Self::Dependency
            | Self::FollowUp
            | Self::OpenQuestion
            | Self::ContextDecay
            | Self::UnfinishedWork => Some(Duration::days(7)),
            Self::StaleDecision => Some(Duration::days(14)),
        }
    }

    /// Category-specific confidence boost for a full match.
    pub fn confidence_boost(self, matched: &str) -> f64 {
        let lower = matched.to_lowercase();
        match self {
            Self::Commitment => {
                let first_person = ["i'll", "i’ll", "i'm", "i’m", "we'll", "we’ll"];
                if first_person.iter().any(|m| lower.contains(m)) {
                    0.10
                } else {
                    0.0
                }
            }
            Self::Deadline if matched.chars().any(|c| c.is_ascii_digit()) => 0.10,
            Self::Dependency if lower.contains("blocked") => 0.15,
            _ => 0.0,
        }
    }
}
