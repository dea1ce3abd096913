//! Surface-time computation.
//!
//! Non-deadline categories wait a fixed offset after detection. Deadlines
//! back off from the resolved date by a lead time picked from the distance
//! to the deadline.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

use crate::types::SignalCategory;

/// Days to wait on deadlines whose date could not be resolved.
pub const UNRESOLVED_DEADLINE_DELAY_DAYS: i64 = 1;

/// Lead time in days for a deadline `days_until` days away.
///
/// `None` means "surface immediately".
pub fn reminder_lead_days(days_until: i64) -> Option<i64> {
    if days_until > 30 {
        Some(30)
    } else if days_until > 7 {
        Some(7)
    } else if days_until > 3 {
        Some(3)
    } else if days_until > 1 {
        Some(1)
    } else {
        None
    }
}

/// The instant a deadline date is considered due (start of day, UTC).
pub fn deadline_instant(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Earliest instant a signal becomes eligible for delivery.
///
/// Pure and deterministic in `(category, detected_at, resolved_date)`.
/// `resolved_date` is ignored for every category but deadlines.
pub fn surface_at(
    category: SignalCategory,
    detected_at: DateTime<Utc>,
    resolved_date: Option<NaiveDate>,
) -> DateTime<Utc> {
    if let Some(offset) = category.surface_offset() {
        return detected_at + offset;
    }

    let Some(date) = resolved_date else {
        return detected_at + Duration::days(UNRESOLVED_DEADLINE_DELAY_DAYS);
    };

    let days_until = (date - detected_at.date_naive()).num_days();
    match reminder_lead_days(days_until) {
        Some(lead) => deadline_instant(date) - Duration::days(lead),
        None => detected_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use strum::IntoEnumIterator;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 10, 30, 0).unwrap()
    }

    fn in_days(n: i64) -> NaiveDate {
        now().date_naive() + Duration::days(n)
    }

    #[test]
    fn test_fixed_offsets() {
        let t = now();
        assert_eq!(surface_at(SignalCategory::Contradiction, t, None), t);
        assert_eq!(surface_at(SignalCategory::PatternBreak, t, None), t);
        assert_eq!(surface_at(SignalCategory::RecurringPattern, t, None), t + Duration::days(1));
        assert_eq!(surface_at(SignalCategory::Commitment, t, None), t + Duration::days(2));
        assert_eq!(surface_at(SignalCategory::PeopleWaiting, t, None), t + Duration::days(3));
        assert_eq!(surface_at(SignalCategory::FollowUp, t, None), t + Duration::days(7));
        assert_eq!(surface_at(SignalCategory::StaleDecision, t, None), t + Duration::days(14));
    }

    #[test]
    fn test_non_deadline_ignores_date() {
        let t = now();
        assert_eq!(
            surface_at(SignalCategory::Commitment, t, Some(in_days(60))),
            t + Duration::days(2)
        );
    }

    #[test]
    fn test_unresolved_deadline_defaults_to_one_day() {
        let t = now();
        assert_eq!(surface_at(SignalCategory::Deadline, t, None), t + Duration::days(1));
    }

    #[test]
    fn test_lead_time_thresholds() {
        let t = now();
        let cases = [(45, Some(30)), (31, Some(30)), (30, Some(7)), (8, Some(7)), (7, Some(3)),
            (4, Some(3)), (3, Some(1)), (2, Some(1)), (1, None), (0, None), (-5, None)];
        for (days, lead) in cases {
            let date = in_days(days);
            let expected = match lead {
                Some(l) => deadline_instant(date) - Duration::days(l),
                None => t,
            };
            assert_eq!(surface_at(SignalCategory::Deadline, t, Some(date)), expected, "d={days}");
        }
    }

    #[test]
    fn test_deadline_surface_bounds() {
        let t = now();
        for days in 0..400 {
            let date = in_days(days);
            let s = surface_at(SignalCategory::Deadline, t, Some(date));
            assert!(s >= t, "surface before detection for d={days}");
            assert!(s <= deadline_instant(date).max(t), "surface after deadline for d={days}");
        }
    }

    #[test]
    fn test_never_before_detection() {
        let t = now();
        for category in SignalCategory::iter() {
            assert!(surface_at(category, t, None) >= t);
        }
    }
}
