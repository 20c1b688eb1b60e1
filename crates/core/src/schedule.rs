// SPDX-License-Identifier: MIT

//! Schedule definitions and persisted schedule state (spec.md §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A named trigger rule belonging to an agent.
///
/// Only `Interval` and `Cron` are driven by the scheduler; `Webhook` and
/// `Chat` are inert to it (spec.md §3) and exist so that an agent's full
/// set of entry points can be declared in one place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleKind {
    Interval {
        #[serde(with = "interval_secs")]
        interval: Duration,
        #[serde(default)]
        jitter_percent: Option<u8>,
    },
    Cron {
        expression: String,
    },
    Webhook,
    Chat,
}

impl ScheduleKind {
    /// Whether the scheduler's polling loop drives this kind at all
    /// (spec.md §4.8: "type is interval or cron").
    pub fn is_scheduler_driven(&self) -> bool {
        matches!(self, ScheduleKind::Interval { .. } | ScheduleKind::Cron { .. })
    }
}

/// A reference to an external work source a schedule draws items from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkSourceRef {
    pub name: String,
}

/// A named trigger rule owned by an agent (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub name: String,
    pub kind: ScheduleKind,
    pub prompt_template: String,
    #[serde(default)]
    pub work_source: Option<WorkSourceRef>,
}

/// Runtime status of a (agent, schedule) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Idle,
    Running,
    Disabled,
}

/// Persisted state for one (agent, schedule) pair (spec.md §3).
///
/// Invariant: `status == Running` implies there exists a Job with
/// status in `{Pending, Running}` whose schedule field equals this
/// schedule's name. The Schedule Runner is the only writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleState {
    pub status: ScheduleStatus,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl ScheduleState {
    pub fn idle() -> Self {
        Self {
            status: ScheduleStatus::Idle,
            last_run_at: None,
            next_run_at: None,
            last_error: None,
        }
    }

    /// Whether this schedule is due to fire, per spec.md §4.8: "next_run_at
    /// ... is in the past or null".
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.next_run_at {
            None => true,
            Some(next) => next <= now,
        }
    }
}

mod interval_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_secs().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_and_cron_are_scheduler_driven() {
        assert!(ScheduleKind::Interval { interval: Duration::from_secs(1), jitter_percent: None }
            .is_scheduler_driven());
        assert!(ScheduleKind::Cron { expression: "@hourly".into() }.is_scheduler_driven());
        assert!(!ScheduleKind::Webhook.is_scheduler_driven());
        assert!(!ScheduleKind::Chat.is_scheduler_driven());
    }

    #[test]
    fn idle_state_is_due_when_next_run_at_is_null() {
        assert!(ScheduleState::idle().is_due(Utc::now()));
    }

    #[test]
    fn state_is_due_when_next_run_at_in_past() {
        let mut state = ScheduleState::idle();
        state.next_run_at = Some(Utc::now() - chrono::Duration::seconds(1));
        assert!(state.is_due(Utc::now()));
    }

    #[test]
    fn state_is_not_due_when_next_run_at_in_future() {
        let mut state = ScheduleState::idle();
        state.next_run_at = Some(Utc::now() + chrono::Duration::seconds(60));
        assert!(!state.is_due(Utc::now()));
    }
}
