//! Ranking and priority scoring.

use std::cmp::Ordering;

use ordered_float::OrderedFloat;

use crate::types::QueueEntry;

/// Highest confidence a signal can carry.
const CONFIDENCE_CEILING: f64 = 0.95;

/// Share of one priority step that confidence may add.
const CONFIDENCE_WEIGHT: f64 = 0.9;

/// Blend a base priority with confidence into a score in `[1, 10]`.
///
/// Confidence only moves the score within its base priority's band, so a
/// higher base priority always scores at least as high as a lower one.
pub fn priority_score(base_priority: u8, confidence: f64) -> f64 {
    let confidence = if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, CONFIDENCE_CEILING)
    };
    let adjustment = confidence / CONFIDENCE_CEILING * CONFIDENCE_WEIGHT;
    (base_priority as f64 + adjustment).clamp(1.0, 10.0)
}

/// Score for a queue entry.
pub fn entry_score(entry: &QueueEntry) -> f64 {
    priority_score(entry.base_priority(), entry.confidence())
}

/// Ranking key: base priority desc, confidence desc, detection time asc.
pub fn rank_order(a: &QueueEntry, b: &QueueEntry) -> Ordering {
    b.base_priority()
        .cmp(&a.base_priority())
        .then_with(|| OrderedFloat(b.confidence()).cmp(&OrderedFloat(a.confidence())))
        .then_with(|| a.detected_at().cmp(&b.detected_at()))
}

/// Sort entries best-first. Stable, so exact ties keep their input order.
pub fn rank(entries: &mut [QueueEntry]) {
    entries.sort_by(rank_order);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ScheduledInsight, Signal, SignalCategory, SignalSource};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn entry(category: SignalCategory, confidence: f64, offset_secs: i64) -> QueueEntry {
        let at = t0() + Duration::seconds(offset_secs);
        let signal = Signal::new(category, "content", &SignalSource::new("c"), at, confidence);
        QueueEntry::new("ws", ScheduledInsight::new(signal, at))
    }

    #[test]
    fn test_score_bounds_and_monotonicity() {
        for base in 1..=10u8 {
            let mut last = 0.0;
            for step in 0..=20 {
                let c = step as f64 * 0.05;
                let score = priority_score(base, c);
                assert!((1.0..=10.0).contains(&score));
                assert!(score >= last, "score fell for base={base} c={c}");
                last = score;
            }
        }
        assert_eq!(priority_score(0, 0.0), 1.0);
        assert_eq!(priority_score(5, f64::NAN), 5.0);
    }

    #[test]
    fn test_score_never_crosses_base_priority() {
        assert!(priority_score(6, 0.95) < priority_score(7, 0.0));
        assert!(priority_score(7, 0.95) < 8.0);
    }

    #[test]
    fn test_rank_order() {
        let mut entries = vec![
            entry(SignalCategory::FollowUp, 0.95, 0),
            entry(SignalCategory::Contradiction, 0.70, 10),
            entry(SignalCategory::Contradiction, 0.90, 20),
            entry(SignalCategory::Contradiction, 0.90, 5),
        ];
        let expected = vec![entries[3].id, entries[2].id, entries[1].id, entries[0].id];
        rank(&mut entries);
        let got: Vec<_> = entries.iter().map(|e| e.id).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_rank_order_is_total() {
        let entries = vec![
            entry(SignalCategory::Commitment, 0.8, 0),
            entry(SignalCategory::Commitment, 0.8, 0),
            entry(SignalCategory::Dependency, 0.8, 0),
            entry(SignalCategory::Commitment, 0.9, 1),
            entry(SignalCategory::OpenQuestion, 0.7, 2),
        ];
        for a in &entries {
            for b in &entries {
                let ab = rank_order(a, b);
                assert_eq!(ab, rank_order(b, a).reverse());
                if ab == Ordering::Equal {
                    assert_eq!(a.base_priority(), b.base_priority());
                    assert_eq!(a.confidence(), b.confidence());
                    assert_eq!(a.detected_at(), b.detected_at());
                }
            }
        }
    }

    #[test]
    fn test_entry_score_uses_base_priority() {
        let e = entry(SignalCategory::Contradiction, 0.95, 0);
        assert!((entry_score(&e) - 8.9).abs() < 1e-9);
    }
}
