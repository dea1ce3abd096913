//! Deadline date resolution.
//!
//! Turns a deadline phrase into a calendar date relative to a reference
//! instant. Absolute forms are tried before relative ones; anything else
//! (event-anchored phrases like "before the launch") stays unresolved.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::DeadlineResolution;

const MONTHS: &str = r"(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").unwrap());

static SLASH_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})(?:/(\d{4}|\d{2}))?\b").unwrap());

static MONTH_DAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b{MONTHS}\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?(?:,?\s+(\d{{4}}))?\b"
    ))
    .unwrap()
});

static DAY_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b(\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?{MONTHS}\b(?:,?\s+(\d{{4}}))?"
    ))
    .unwrap()
});

static TODAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:today|tonight|eod|end of (?:the )?day)\b").unwrap());

static TOMORROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"\btomorrow\b").unwrap());

static IN_N_UNITS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\bin\s+(\d{1,3}|a|an|one|two|three|four|five|six|seven|eight|nine|ten)\s+(day|week|month)s?\b",
    )
    .unwrap()
});

static END_OF_WEEK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:eow|end of (?:the |this )?week)\b").unwrap());

static NEXT_WEEK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bnext\s+week\b").unwrap());

static END_OF_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:eom|end of (?:the |this )?month)\b").unwrap());

static NEXT_MONTH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bnext\s+month\b").unwrap());

static WEEKDAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b").unwrap()
});

/// Resolve a deadline phrase against `now`.
///
/// Never fails: anything that cannot be pinned to a date comes back as
/// [`DeadlineResolution::unresolved`].
pub fn resolve_deadline(text: &str, now: DateTime<Utc>) -> DeadlineResolution {
    let lower = text.to_lowercase();
    let today = now.date_naive();

    if let Some(date) = parse_absolute(&lower, today) {
        return DeadlineResolution::absolute(date);
    }
    if let Some(date) = parse_relative(&lower, today) {
        return DeadlineResolution::relative(date);
    }
    DeadlineResolution::unresolved()
}

/// Parse month-name/day, `MM/DD[/YYYY]` or ISO `YYYY-MM-DD`.
///
/// Dates without a year land in the current year, or the next one when the
/// date has already passed.
pub fn parse_absolute(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    if let Some(cap) = ISO_DATE.captures(text) {
        let (y, m, d) = (cap[1].parse().ok()?, cap[2].parse().ok()?, cap[3].parse().ok()?);
        if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
            return Some(date);
        }
    }

    if let Some(cap) = SLASH_DATE.captures(text) {
        let month: u32 = cap[1].parse().ok()?;
        let day: u32 = cap[2].parse().ok()?;
        let year = cap.get(3).and_then(|y| parse_year(y.as_str()));
        if let Some(date) = dated(year, month, day, today) {
            return Some(date);
        }
    }

    if let Some(cap) = MONTH_DAY.captures(text) {
        let month = month_number(&cap[1])?;
        let day: u32 = cap[2].parse().ok()?;
        let year = cap.get(3).and_then(|y| parse_year(y.as_str()));
        if let Some(date) = dated(year, month, day, today) {
            return Some(date);
        }
    }

    if let Some(cap) = DAY_MONTH.captures(text) {
        let day: u32 = cap[1].parse().ok()?;
        let month = month_number(&cap[2])?;
        let year = cap.get(3).and_then(|y| parse_year(y.as_str()));
        if let Some(date) = dated(year, month, day, today) {
            return Some(date);
        }
    }

    None
}

/// Parse phrases relative to `today`.
pub fn parse_relative(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    if TOMORROW.is_match(text) {
        return today.succ_opt();
    }
    if TODAY.is_match(text) {
        return Some(today);
    }
    if let Some(cap) = IN_N_UNITS.captures(text) {
        let n = word_number(&cap[1])?;
        return match &cap[2] {
            "day" => today.checked_add_signed(Duration::days(n.into())),
            "week" => today.checked_add_signed(Duration::weeks(n.into())),
            _ => today.checked_add_months(Months::new(n)),
        };
    }
    if END_OF_WEEK.is_match(text) {
        return Some(upcoming(today, Weekday::Fri, true));
    }
    if NEXT_WEEK.is_match(text) {
        return today.checked_add_signed(Duration::days(7));
    }
    if END_OF_MONTH.is_match(text) {
        return last_day_of_month(today);
    }
    if NEXT_MONTH.is_match(text) {
        return today.checked_add_months(Months::new(1));
    }
    if let Some(cap) = WEEKDAY.captures(text) {
        let weekday: Weekday = cap[1].parse().ok()?;
        return Some(upcoming(today, weekday, false));
    }
    None
}

fn dated(year: Option<i32>, month: u32, day: u32, today: NaiveDate) -> Option<NaiveDate> {
    match year {
        Some(y) => NaiveDate::from_ymd_opt(y, month, day),
        None => {
            let this_year = NaiveDate::from_ymd_opt(today.year(), month, day);
            match this_year {
                Some(date) if date >= today => Some(date),
                _ => NaiveDate::from_ymd_opt(today.year() + 1, month, day),
            }
        }
    }
}

fn parse_year(s: &str) -> Option<i32> {
    let y: i32 = s.parse().ok()?;
    Some(if s.len() == 2 { 2000 + y } else { y })
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn word_number(s: &str) -> Option<u32> {
    let n = match s {
        "a" | "an" | "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        digits => digits.parse().ok()?,
    };
    Some(n)
}

/// Next occurrence of `weekday` after `today`; `include_today` lets today
/// itself count.
fn upcoming(today: NaiveDate, weekday: Weekday, include_today: bool) -> NaiveDate {
    let from = today.weekday().num_days_from_monday() as i64;
    let to = weekday.num_days_from_monday() as i64;
    let mut diff = (to - from).rem_euclid(7);
    if diff == 0 && !include_today {
        diff = 7;
    }
    today + Duration::days(diff)
}

fn last_day_of_month(today: NaiveDate) -> Option<NaiveDate> {
    let first = today.with_day(1)?;
    first.checked_add_months(Months::new(1))?.pred_opt()
}
