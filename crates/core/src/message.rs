// SPDX-License-Identifier: MIT

//! The closed `Message` variant set (spec.md §3, §4.2, Design Notes §9).
//!
//! This is deliberately just data — the normalization logic that turns
//! arbitrary runtime output into one of these variants lives in
//! `herdctl-message`, which depends on this crate, not the other way
//! around.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One record in a job's append-only output log.
///
/// A dynamically-shaped runtime payload is replaced here with an
/// exhaustively-matched closed sum type (Design Notes §9): unknown or
/// malformed input never produces a new variant, it collapses into
/// `System` with a `malformed_message`/`unknown_type` subtype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    System {
        content: String,
        subtype: Option<String>,
        session_id: Option<String>,
        timestamp: DateTime<Utc>,
    },
    Assistant {
        content: String,
        partial: bool,
        usage: Option<serde_json::Value>,
        summary: Option<String>,
        timestamp: DateTime<Utc>,
    },
    ToolUse {
        tool_name: String,
        tool_use_id: Option<String>,
        input: serde_json::Value,
        timestamp: DateTime<Utc>,
    },
    ToolResult {
        tool_use_id: Option<String>,
        result: serde_json::Value,
        success: bool,
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },
    Error {
        message: String,
        code: Option<String>,
        stack: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

/// System subtypes with a "this terminates the run" reading
/// (spec.md §4.2: "end, complete, session_end").
pub const TERMINAL_SYSTEM_SUBTYPES: &[&str] = &["end", "complete", "session_end"];

impl Message {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Message::System { timestamp, .. }
            | Message::Assistant { timestamp, .. }
            | Message::ToolUse { timestamp, .. }
            | Message::ToolResult { timestamp, .. }
            | Message::Error { timestamp, .. } => *timestamp,
        }
    }

    /// Whether this message, on its own, ends the message stream
    /// (spec.md §4.2: error messages always; certain system subtypes).
    pub fn is_final(&self) -> bool {
        match self {
            Message::Error { .. } => true,
            Message::System { subtype: Some(subtype), .. } => {
                TERMINAL_SYSTEM_SUBTYPES.contains(&subtype.as_str())
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_is_always_final() {
        let msg = Message::Error {
            message: "boom".into(),
            code: None,
            stack: None,
            timestamp: Utc::now(),
        };
        assert!(msg.is_final());
    }

    #[test]
    fn system_message_final_only_for_terminal_subtypes() {
        let end = Message::System {
            content: "done".into(),
            subtype: Some("end".into()),
            session_id: None,
            timestamp: Utc::now(),
        };
        assert!(end.is_final());

        let init = Message::System {
            content: "starting".into(),
            subtype: Some("init".into()),
            session_id: Some("sess-1".into()),
            timestamp: Utc::now(),
        };
        assert!(!init.is_final());
    }

    #[test]
    fn assistant_and_tool_messages_are_never_final() {
        let assistant = Message::Assistant {
            content: "hi".into(),
            partial: false,
            usage: None,
            summary: None,
            timestamp: Utc::now(),
        };
        assert!(!assistant.is_final());
    }
}
