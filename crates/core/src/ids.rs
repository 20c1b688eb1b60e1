// SPDX-License-Identifier: MIT

//! Identifier newtypes shared across the fleet supervisor.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Name of an agent, as declared in its configuration file.
///
/// Agent names are the primary key operators use on the CLI and the key
/// under which session records and schedule state are filed on disk, so
/// this type is cheap to clone and hash.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentName(pub String);

impl AgentName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AgentName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AgentName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Borrow<str> for AgentName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Opaque session identifier handed out by the provider backend.
///
/// Distinct from [`AgentName`]: a session identifies one multi-turn
/// conversation with the model backend and may outlive, or be replaced
/// within, any number of jobs for the same agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

const JOB_ID_SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const JOB_ID_SUFFIX_LEN: usize = 8;

/// Identifier for one job execution.
///
/// Formatted `job-YYYY-MM-DD-<suffix>` where `<suffix>` is
/// [`JOB_ID_SUFFIX_LEN`] lowercase alphanumeric characters, matching the
/// wire-stable regex `^job-\d{4}-\d{2}-\d{2}-[a-z0-9]+$`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new job id for a job created at `at`.
    pub fn generate(at: DateTime<Utc>) -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..JOB_ID_SUFFIX_LEN)
            .map(|_| {
                let idx = rng.gen_range(0..JOB_ID_SUFFIX_ALPHABET.len());
                JOB_ID_SUFFIX_ALPHABET[idx] as char
            })
            .collect();
        Self(format!("job-{}-{}", at.format("%Y-%m-%d"), suffix))
    }

    /// Parse from an already-formatted string (disk round-trip, CLI args).
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Borrow<str> for JobId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Every generated job id matches the wire-stable regex
        /// `^job-\d{4}-\d{2}-\d{2}-[a-z0-9]+$`, regardless of which
        /// instant it was generated at.
        #[test]
        fn generated_job_id_always_matches_wire_format(epoch_secs in 0i64..4_102_444_800i64) {
            let at = DateTime::from_timestamp(epoch_secs, 0).unwrap_or_else(Utc::now);
            let id = JobId::generate(at);
            let s = id.as_str();
            let rest = s.strip_prefix("job-").expect("job- prefix");
            let parts: Vec<&str> = rest.splitn(4, '-').collect();
            prop_assert_eq!(parts.len(), 4);
            prop_assert_eq!(parts[0].len(), 4);
            prop_assert_eq!(parts[1].len(), 2);
            prop_assert_eq!(parts[2].len(), 2);
            prop_assert!(parts[0..3].iter().all(|p| p.chars().all(|c| c.is_ascii_digit())));
            prop_assert_eq!(parts[3].len(), JOB_ID_SUFFIX_LEN);
            prop_assert!(parts[3].chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn job_id_matches_wire_format() {
        let at = DateTime::parse_from_rfc3339("2026-07-27T10:00:00Z").unwrap().with_timezone(&Utc);
        let id = JobId::generate(at);
        let s = id.as_str();
        let rest = s.strip_prefix("job-").expect("job- prefix");
        let parts: Vec<&str> = rest.splitn(4, '-').collect();
        assert_eq!(parts.len(), 4, "{s} did not split into date+suffix");
        assert_eq!(parts[0].len(), 4, "{s} year segment");
        assert_eq!(parts[1].len(), 2, "{s} month segment");
        assert_eq!(parts[2].len(), 2, "{s} day segment");
        assert!(parts[0..3].iter().all(|p| p.chars().all(|c| c.is_ascii_digit())));
        assert!(parts[3].chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn job_id_suffix_is_lowercase_alphanumeric() {
        let at = Utc::now();
        let id = JobId::generate(at);
        let suffix = id.as_str().rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), JOB_ID_SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
}
