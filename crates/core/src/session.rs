// SPDX-License-Identifier: MIT

//! Persisted session continuity record (spec.md §3).

use crate::ids::{AgentName, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The conversational mode a session was established under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Autonomous,
    Interactive,
    Review,
}

impl Default for SessionMode {
    fn default() -> Self {
        Self::Autonomous
    }
}

/// A per-agent session continuity record.
///
/// Created on first session-bearing job; replaced (not merged) whenever
/// a fresh session is established, e.g. after the server-side expiry
/// retry in spec.md §4.6 step 6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub agent_name: AgentName,
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub job_count: u64,
    pub mode: SessionMode,
}

impl SessionRecord {
    pub fn new(agent_name: AgentName, session_id: SessionId, now: DateTime<Utc>) -> Self {
        Self {
            agent_name,
            session_id,
            created_at: now,
            last_used_at: now,
            job_count: 0,
            mode: SessionMode::default(),
        }
    }

    /// A session is locally valid iff `now - last_used_at <= timeout`
    /// (spec.md §3). The boundary is inclusive: exactly `timeout` old is
    /// still valid.
    pub fn is_locally_valid(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        let elapsed = now - self.last_used_at;
        match chrono::Duration::from_std(timeout) {
            Ok(limit) => elapsed <= limit,
            Err(_) => false,
        }
    }

    /// Refresh `last_used_at` before starting a run that reuses this
    /// session (spec.md §4.6 step 2), so a mid-job elapsed interval
    /// cannot retroactively expire it.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_used_at = now;
    }

    pub fn record_job(&mut self) {
        self.job_count += 1;
    }

    /// Replace this record with a fresh session id, resetting
    /// `created_at`/`job_count` (spec.md §3: "replaced (not merged)").
    pub fn replace_session(&mut self, new_session_id: SessionId, now: DateTime<Utc>) {
        self.session_id = new_session_id;
        self.created_at = now;
        self.last_used_at = now;
        self.job_count = 0;
    }
}
