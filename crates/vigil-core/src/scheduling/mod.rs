//! Temporal scheduling for detected signals.
//!
//! Everything here is pure: given a signal's category, its detection
//! instant and (for deadlines) a resolved date, compute when the signal
//! may first be surfaced.

mod backoff;
mod dates;

pub use backoff::{
    deadline_instant, reminder_lead_days, surface_at, UNRESOLVED_DEADLINE_DELAY_DAYS,
};
pub use dates::{parse_absolute, parse_relative, resolve_deadline};

use crate::types::{ScheduledInsight, Signal};

/// Attach a surface time to a signal.
pub fn schedule(signal: Signal) -> ScheduledInsight {
    let at = surface_at(signal.category(), signal.detected_at, signal.resolved_date());
    ScheduledInsight::new(signal, at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeadlineResolution, SignalCategory, SignalSource};
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    #[test]
    fn test_schedule_commitment() {
        let now = Utc.with_ymd_and_hms(2025, 5, 5, 8, 0, 0).unwrap();
        let signal = Signal::new(
            SignalCategory::Commitment,
            "send the proposal to Mike tomorrow",
            &SignalSource::new("c"),
            now,
            0.9,
        );
        let insight = schedule(signal);
        assert_eq!(insight.surface_at, now + Duration::days(2));
        assert!(!insight.resolved);
    }

    #[test]
    fn test_schedule_absolute_deadline() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 12, 27).unwrap();
        let signal = Signal::new(SignalCategory::Deadline, "12/27", &SignalSource::new("c"), now, 0.8)
            .with_deadline(DeadlineResolution::absolute(date));
        let insight = schedule(signal);
        assert_eq!(insight.surface_at, deadline_instant(date) - Duration::days(30));
        assert_eq!(insight.signal.base_priority, 8);
    }
}
