// SPDX-License-Identifier: MIT

//! Cron expression parsing and evaluation (spec.md §4.3, §6).
//!
//! Wraps the `cron` crate, which parses the 6-field `sec min hour dom
//! month dow` form. Callers supply the standard 5-field form (`min hour
//! dom month dow`) plus the `@hourly`/`@daily`/`@weekly`/`@monthly`/
//! `@yearly` shorthands; both are expanded to the 6-field form with a
//! `0` seconds field before being handed to the underlying parser.

use chrono::{DateTime, Utc};
use cron::Schedule as CronCrateSchedule;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid cron expression {expression:?}: {source}")]
pub struct CronParseError {
    pub expression: String,
    source: String,
}

/// A parsed cron trigger rule.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    inner: CronCrateSchedule,
}

impl PartialEq for CronSchedule {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression
    }
}

impl CronSchedule {
    /// Parse a 5-field cron expression or one of the standard shorthands.
    pub fn parse(expression: &str) -> Result<Self, CronParseError> {
        let expanded = expand(expression.trim());
        let inner = CronCrateSchedule::from_str(&expanded).map_err(|source| CronParseError {
            expression: expression.to_string(),
            source: source.to_string(),
        })?;
        Ok(Self { expression: expression.trim().to_string(), inner })
    }

    /// The next instant strictly after `reference` that this schedule
    /// fires at, if the schedule has any future occurrence at all.
    pub fn next_after(&self, reference: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.inner.after(&reference).next()
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }
}

/// Expand a 5-field cron body or a `@`-shorthand into the 6-field form
/// the `cron` crate expects, by prepending a `0` seconds field.
fn expand(expression: &str) -> String {
    let five_field = match expression {
        "@yearly" | "@annually" => "0 0 1 1 *",
        "@monthly" => "0 0 1 * *",
        "@weekly" => "0 0 * * 0",
        "@daily" | "@midnight" => "0 0 * * *",
        "@hourly" => "0 * * * *",
        other => other,
    };
    format!("0 {five_field}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_standard_five_field_expression() {
        let schedule = CronSchedule::parse("*/15 * * * *").unwrap();
        let reference = DateTime::parse_from_rfc3339("2026-07-27T10:01:00Z").unwrap().with_timezone(&Utc);
        let next = schedule.next_after(reference).unwrap();
        assert_eq!(next, DateTime::parse_from_rfc3339("2026-07-27T10:15:00Z").unwrap().with_timezone(&Utc));
    }

    #[test]
    fn shorthands_expand_to_expected_cadence() {
        let hourly = CronSchedule::parse("@hourly").unwrap();
        let reference = DateTime::parse_from_rfc3339("2026-07-27T10:30:00Z").unwrap().with_timezone(&Utc);
        assert_eq!(
            hourly.next_after(reference).unwrap(),
            DateTime::parse_from_rfc3339("2026-07-27T11:00:00Z").unwrap().with_timezone(&Utc)
        );

        let daily = CronSchedule::parse("@daily").unwrap();
        assert_eq!(
            daily.next_after(reference).unwrap(),
            DateTime::parse_from_rfc3339("2026-07-28T00:00:00Z").unwrap().with_timezone(&Utc)
        );
    }

    #[test]
    fn next_after_is_strictly_after_the_reference() {
        let schedule = CronSchedule::parse("0 0 * * *").unwrap();
        let reference = DateTime::parse_from_rfc3339("2026-07-27T00:00:00Z").unwrap().with_timezone(&Utc);
        let next = schedule.next_after(reference).unwrap();
        assert!(next > reference);
    }

    #[test]
    fn invalid_expression_is_rejected() {
        assert!(CronSchedule::parse("not a cron expression").is_err());
    }
}
