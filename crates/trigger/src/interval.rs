// SPDX-License-Identifier: MIT

//! Interval literal grammar and due-time computation (spec.md §4.3, §6).

use chrono::{DateTime, Utc};
use rand::Rng;
use std::time::Duration;
use thiserror::Error;

/// A unit suffix accepted by the interval literal grammar
/// `^[1-9][0-9]*(s|m|h|d)$` (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl Unit {
    fn suffix(self) -> char {
        match self {
            Unit::Seconds => 's',
            Unit::Minutes => 'm',
            Unit::Hours => 'h',
            Unit::Days => 'd',
        }
    }

    fn seconds_per_unit(self) -> u64 {
        match self {
            Unit::Seconds => 1,
            Unit::Minutes => 60,
            Unit::Hours => 60 * 60,
            Unit::Days => 24 * 60 * 60,
        }
    }

    fn from_suffix(c: char) -> Option<Unit> {
        match c {
            's' => Some(Unit::Seconds),
            'm' => Some(Unit::Minutes),
            'h' => Some(Unit::Hours),
            'd' => Some(Unit::Days),
            _ => None,
        }
    }
}

/// Raised by [`parse_interval`] for any literal that does not match the
/// grammar (spec.md §4.3: "Rejects: empty, non-integer, zero, negative,
/// decimal, unknown unit").
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid interval literal {literal:?}: {reason}")]
pub struct IntervalParseError {
    pub literal: String,
    pub reason: &'static str,
}

impl IntervalParseError {
    fn new(literal: &str, reason: &'static str) -> Self {
        Self { literal: literal.to_string(), reason }
    }
}

/// Parse an interval literal of the form `<positive integer><unit>`,
/// unit in `{s, m, h, d}` (spec.md §4.3, §6).
///
/// Rejects empty strings, non-integer digit runs, a leading zero value,
/// a negative sign, decimal points, and unknown unit suffixes. `"0m"` is
/// rejected (zero is not positive); `"1s"` is the smallest accepted
/// literal.
pub fn parse_interval(literal: &str) -> Result<Duration, IntervalParseError> {
    if literal.is_empty() {
        return Err(IntervalParseError::new(literal, "empty literal"));
    }
    if literal.starts_with('-') {
        return Err(IntervalParseError::new(literal, "negative interval"));
    }
    if literal.contains('.') {
        return Err(IntervalParseError::new(literal, "decimal interval"));
    }

    let unit_char = literal.chars().last().ok_or_else(|| IntervalParseError::new(literal, "empty literal"))?;
    let digits = &literal[..literal.len() - unit_char.len_utf8()];

    let unit = Unit::from_suffix(unit_char).ok_or_else(|| IntervalParseError::new(literal, "unknown unit"))?;

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(IntervalParseError::new(literal, "non-integer magnitude"));
    }
    if digits.starts_with('0') {
        return Err(IntervalParseError::new(literal, "leading zero or zero magnitude"));
    }

    let magnitude: u64 = digits.parse().map_err(|_| IntervalParseError::new(literal, "magnitude out of range"))?;
    if magnitude == 0 {
        return Err(IntervalParseError::new(literal, "zero is not positive"));
    }

    Ok(Duration::from_secs(magnitude * unit.seconds_per_unit()))
}

/// Format a duration back into the canonical literal for its largest
/// exactly-dividing unit, so that `parse_interval` is a left-inverse on
/// canonical literals (spec.md §8): `"5m"` round-trips through
/// parse+format.
pub fn format_interval(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    if total_secs == 0 {
        return "0s".to_string();
    }
    for unit in [Unit::Days, Unit::Hours, Unit::Minutes, Unit::Seconds] {
        let per = unit.seconds_per_unit();
        if total_secs % per == 0 {
            return format!("{}{}", total_secs / per, unit.suffix());
        }
    }
    format!("{total_secs}s")
}

/// Compute the next due time for an interval schedule (spec.md §4.3).
///
/// Returns `now` if `last_completed_at` is `None` (never run). Otherwise
/// `last_completed_at + interval`, optionally pushed forward by a random
/// jitter drawn uniformly from `[0, jitter_percent%]` of the interval. If
/// the result still lies in the past (clock skew, or a jitter roll of
/// zero on an already-overdue schedule), `now` is returned instead so a
/// schedule is never left permanently due-in-the-past.
pub fn next_trigger_at(
    last_completed_at: Option<DateTime<Utc>>,
    interval: Duration,
    jitter_percent: Option<u8>,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let Some(last_completed_at) = last_completed_at else {
        return now;
    };

    let chrono_interval = chrono::Duration::from_std(interval).unwrap_or(chrono::Duration::zero());
    let mut next = last_completed_at + chrono_interval;

    if let Some(jitter_percent) = jitter_percent {
        if jitter_percent > 0 {
            let max_jitter_ms = (interval.as_millis() as u64).saturating_mul(jitter_percent as u64) / 100;
            if max_jitter_ms > 0 {
                let jitter_ms = rand::thread_rng().gen_range(0..=max_jitter_ms);
                next += chrono::Duration::milliseconds(jitter_ms as i64);
            }
        }
    }

    if next <= now {
        now
    } else {
        next
    }
}
