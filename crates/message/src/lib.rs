// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! herdctl-message: the pure Message Processor (spec.md §4.2).
//!
//! Normalizes the heterogeneous, possibly-malformed stream a [`Runtime`]
//! yields into the closed [`herdctl_core::Message`] variant set. This is
//! the crate that replaces "dynamic structural matching" with an
//! exhaustive match (Design Notes §9): every input, however malformed,
//! maps to exactly one `Message` and this function never panics or
//! returns an error.
//!
//! [`Runtime`]: herdctl_core (the trait itself lives in `herdctl-runtime`,
//! which depends on this crate, not the other way around)

use chrono::{DateTime, Utc};
use herdctl_core::Message;
use serde_json::Value;

/// Maximum length of a job summary before truncation (spec.md §4.2,
/// §8: "truncate to 500 chars adding `...` if longer").
pub const SUMMARY_MAX_LEN: usize = 500;

/// The result of normalizing one raw runtime record.
#[derive(Debug, Clone, PartialEq)]
pub struct Processed {
    pub message: Message,
    pub is_final: bool,
    /// Present only for a `system` record with `subtype == "init"`
    /// carrying a `session_id` field (spec.md §4.2).
    pub session_id: Option<String>,
}

/// Normalize one raw record from a Runtime's message stream.
///
/// `raw` may be anything a misbehaving or evolving provider backend
/// could emit: `null`, a non-object JSON value, an object missing
/// `type`, or an object with an unrecognized `type`. None of these
/// cases produce an `error` message — a single bad record must never
/// terminate a run (spec.md §4.2) — they all collapse into a `system`
/// message with subtype `malformed_message` or `unknown_type`.
pub fn process(raw: &Value, now: DateTime<Utc>) -> Processed {
    let Some(obj) = raw.as_object() else {
        return malformed(describe_non_object(raw), now);
    };

    let Some(type_field) = obj.get("type") else {
        return malformed(format!("missing `type` field: {raw}"), now);
    };

    let Some(type_str) = type_field.as_str() else {
        return malformed(format!("`type` field is not a string: {type_field}"), now);
    };

    match type_str {
        "system" => process_system(obj, now),
        "assistant" => process_assistant(obj, now),
        "tool_use" => process_tool_use(obj, now),
        "tool_result" => process_tool_result(obj, now),
        "error" => process_error(obj, now),
        other => unknown_type(format!("unrecognized message type {other:?}: {raw}"), now),
    }
}

fn describe_non_object(raw: &Value) -> String {
    match raw {
        Value::Null => "received null message record".to_string(),
        other => format!("received non-object message record: {other}"),
    }
}

fn malformed(description: String, now: DateTime<Utc>) -> Processed {
    Processed {
        message: Message::System { content: description, subtype: Some("malformed_message".to_string()), session_id: None, timestamp: now },
        is_final: false,
        session_id: None,
    }
}

fn unknown_type(description: String, now: DateTime<Utc>) -> Processed {
    Processed {
        message: Message::System { content: description, subtype: Some("unknown_type".to_string()), session_id: None, timestamp: now },
        is_final: false,
        session_id: None,
    }
}

fn process_system(obj: &serde_json::Map<String, Value>, now: DateTime<Utc>) -> Processed {
    let content = obj.get("content").and_then(Value::as_str).unwrap_or_default().to_string();
    let subtype = obj.get("subtype").and_then(Value::as_str).map(str::to_string);
    // Only an `init` subtype carrying a session_id yields one (spec.md
    // §4.2: "other system messages must not").
    let session_id = if subtype.as_deref() == Some("init") {
        obj.get("session_id").and_then(Value::as_str).map(str::to_string)
    } else {
        None
    };
    let is_final = subtype
        .as_deref()
        .map(|s| herdctl_core::TERMINAL_SYSTEM_SUBTYPES.contains(&s))
        .unwrap_or(false);

    Processed {
        message: Message::System { content, subtype, session_id: session_id.clone(), timestamp: now },
        is_final,
        session_id,
    }
}

fn process_assistant(obj: &serde_json::Map<String, Value>, now: DateTime<Utc>) -> Processed {
    let content = obj.get("content").and_then(Value::as_str).unwrap_or_default().to_string();
    let partial = obj.get("partial").and_then(Value::as_bool).unwrap_or(false);
    let usage = obj.get("usage").cloned();
    let explicit_summary = obj.get("summary").map(stringify_summary_field);
    let summary = explicit_summary.or_else(|| implicit_summary(&content, partial));

    Processed {
        message: Message::Assistant { content, partial, usage, summary, timestamp: now },
        is_final: false,
        session_id: None,
    }
}

/// Stringify an explicit `summary` field, whatever its JSON shape, then
/// apply the 500-char truncation rule.
fn stringify_summary_field(value: &Value) -> String {
    let raw = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    truncate_summary(&raw)
}

/// Summary extraction from a final (non-partial) assistant message with
/// no explicit `summary` field: the content itself is the summary, but
/// only when it already fits within the limit (spec.md §4.2).
fn implicit_summary(content: &str, partial: bool) -> Option<String> {
    if partial {
        return None;
    }
    if content.chars().count() <= SUMMARY_MAX_LEN {
        Some(content.to_string())
    } else {
        None
    }
}

/// Truncate to [`SUMMARY_MAX_LEN`] chars, appending `"..."` when the
/// input was longer (spec.md §8: 501 chars becomes 497 chars + "...").
pub fn truncate_summary(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= SUMMARY_MAX_LEN {
        text.to_string()
    } else {
        let keep = SUMMARY_MAX_LEN - 3;
        let truncated: String = chars[..keep].iter().collect();
        format!("{truncated}...")
    }
}

fn process_tool_use(obj: &serde_json::Map<String, Value>, now: DateTime<Utc>) -> Processed {
    let tool_name = obj.get("tool_name").and_then(Value::as_str).unwrap_or_default().to_string();
    let tool_use_id = obj.get("tool_use_id").and_then(Value::as_str).map(str::to_string);
    let input = obj.get("input").cloned().unwrap_or(Value::Null);

    Processed {
        message: Message::ToolUse { tool_name, tool_use_id, input, timestamp: now },
        is_final: false,
        session_id: None,
    }
}

fn process_tool_result(obj: &serde_json::Map<String, Value>, now: DateTime<Utc>) -> Processed {
    let tool_use_id = obj.get("tool_use_id").and_then(Value::as_str).map(str::to_string);
    let result = obj.get("result").cloned().unwrap_or(Value::Null);
    let success = obj.get("success").and_then(Value::as_bool).unwrap_or(true);
    let error = obj.get("error").and_then(Value::as_str).map(str::to_string);

    Processed {
        message: Message::ToolResult { tool_use_id, result, success, error, timestamp: now },
        is_final: false,
        session_id: None,
    }
}

fn process_error(obj: &serde_json::Map<String, Value>, now: DateTime<Utc>) -> Processed {
    let message = obj.get("message").and_then(Value::as_str).unwrap_or_default().to_string();
    let code = obj.get("code").and_then(Value::as_str).map(str::to_string);
    let stack = obj.get("stack").and_then(Value::as_str).map(str::to_string);

    Processed {
        message: Message::Error { message, code, stack, timestamp: now },
        // An `error` message always has is_final = true (spec.md §4.2).
        is_final: true,
        session_id: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn null_input_becomes_malformed_system_message() {
        let processed = process(&Value::Null, now());
        match processed.message {
            Message::System { subtype, .. } => assert_eq!(subtype.as_deref(), Some("malformed_message")),
            other => panic!("expected system message, got {other:?}"),
        }
        assert!(!processed.is_final);
    }

    #[test]
    fn non_object_input_becomes_malformed_system_message() {
        for value in [json!("a string"), json!(42), json!([1, 2, 3])] {
            let processed = process(&value, now());
            match processed.message {
                Message::System { subtype, .. } => assert_eq!(subtype.as_deref(), Some("malformed_message")),
                other => panic!("expected system message, got {other:?}"),
            }
        }
    }

    #[test]
    fn missing_type_field_becomes_malformed() {
        let processed = process(&json!({"content": "missing type"}), now());
        match processed.message {
            Message::System { subtype, .. } => assert_eq!(subtype.as_deref(), Some("malformed_message")),
            other => panic!("expected system message, got {other:?}"),
        }
    }

    #[test]
    fn unknown_type_string_becomes_unknown_type_system_message() {
        let processed = process(&json!({"type": "unexpected", "content": "x"}), now());
        match processed.message {
            Message::System { subtype, .. } => assert_eq!(subtype.as_deref(), Some("unknown_type")),
            other => panic!("expected system message, got {other:?}"),
        }
    }

    #[test]
    fn non_string_type_becomes_malformed() {
        let processed = process(&json!({"type": 5}), now());
        match processed.message {
            Message::System { subtype, .. } => assert_eq!(subtype.as_deref(), Some("malformed_message")),
            other => panic!("expected system message, got {other:?}"),
        }
    }

    #[test]
    fn system_init_message_yields_session_id() {
        let processed = process(&json!({"type": "system", "subtype": "init", "session_id": "sess-1", "content": "starting"}), now());
        assert_eq!(processed.session_id.as_deref(), Some("sess-1"));
        assert!(!processed.is_final);
    }

    #[test]
    fn other_system_subtypes_never_yield_session_id() {
        let processed = process(&json!({"type": "system", "subtype": "progress", "session_id": "sess-1", "content": "x"}), now());
        assert_eq!(processed.session_id, None);
    }

    #[test]
    fn terminal_system_subtypes_are_final() {
        for subtype in ["end", "complete", "session_end"] {
            let processed = process(&json!({"type": "system", "subtype": subtype, "content": "done"}), now());
            assert!(processed.is_final, "subtype {subtype} should be final");
        }
    }

    #[test]
    fn error_message_is_always_final() {
        let processed = process(&json!({"type": "error", "message": "boom", "code": "E1"}), now());
        assert!(processed.is_final);
        match processed.message {
            Message::Error { message, code, .. } => {
                assert_eq!(message, "boom");
                assert_eq!(code.as_deref(), Some("E1"));
            }
            other => panic!("expected error message, got {other:?}"),
        }
    }

    #[test]
    fn explicit_summary_wins_over_content() {
        let processed = process(&json!({"type": "assistant", "content": "a very long answer", "summary": "short summary", "partial": false}), now());
        match processed.message {
            Message::Assistant { summary, .. } => assert_eq!(summary.as_deref(), Some("short summary")),
            other => panic!("expected assistant message, got {other:?}"),
        }
    }

    #[yare::parameterized(
        just_under_the_limit = { 499, 499, false },
        exactly_at_the_limit = { 500, 500, false },
        one_over_the_limit = { 501, 497, true },
        far_over_the_limit = { 900, 497, true },
    )]
    fn explicit_summary_truncation_boundaries(input_len: usize, kept_chars: usize, expect_ellipsis: bool) {
        let summary = "x".repeat(input_len);
        let processed = process(&json!({"type": "assistant", "content": "", "summary": summary, "partial": false}), now());
        match processed.message {
            Message::Assistant { summary: Some(s), .. } => {
                assert_eq!(s.ends_with("..."), expect_ellipsis);
                assert_eq!(s.chars().filter(|&c| c == 'x').count(), kept_chars);
                assert_eq!(s.chars().count(), kept_chars + if expect_ellipsis { 3 } else { 0 });
            }
            other => panic!("expected assistant message, got {other:?}"),
        }
    }

    #[test]
    fn implicit_summary_used_when_final_and_short_enough() {
        let processed = process(&json!({"type": "assistant", "content": "done", "partial": false}), now());
        match processed.message {
            Message::Assistant { summary, .. } => assert_eq!(summary.as_deref(), Some("done")),
            other => panic!("expected assistant message, got {other:?}"),
        }
    }

    #[test]
    fn partial_assistant_message_never_gets_implicit_summary() {
        let processed = process(&json!({"type": "assistant", "content": "still typing", "partial": true}), now());
        match processed.message {
            Message::Assistant { summary, .. } => assert_eq!(summary, None),
            other => panic!("expected assistant message, got {other:?}"),
        }
    }

    #[test]
    fn long_final_content_with_no_explicit_summary_has_no_summary() {
        let content = "x".repeat(600);
        let processed = process(&json!({"type": "assistant", "content": content, "partial": false}), now());
        match processed.message {
            Message::Assistant { summary, .. } => assert_eq!(summary, None),
            other => panic!("expected assistant message, got {other:?}"),
        }
    }

    #[test]
    fn tool_use_and_tool_result_round_trip_fields() {
        let use_processed = process(&json!({"type": "tool_use", "tool_name": "Bash", "tool_use_id": "t1", "input": {"command": "ls"}}), now());
        match use_processed.message {
            Message::ToolUse { tool_name, tool_use_id, .. } => {
                assert_eq!(tool_name, "Bash");
                assert_eq!(tool_use_id.as_deref(), Some("t1"));
            }
            other => panic!("expected tool_use message, got {other:?}"),
        }

        let result_processed = process(&json!({"type": "tool_result", "tool_use_id": "t1", "result": "ok", "success": true}), now());
        match result_processed.message {
            Message::ToolResult { success, error, .. } => {
                assert!(success);
                assert_eq!(error, None);
            }
            other => panic!("expected tool_result message, got {other:?}"),
        }
    }

    #[test]
    fn processor_is_total_across_arbitrary_shapes() {
        let inputs = [
            Value::Null,
            json!("a string"),
            json!(42),
            json!([]),
            json!({}),
            json!({"type": "assistant"}),
            json!({"type": null}),
            json!({"type": "system"}),
        ];
        for input in inputs {
            // Must not panic and must always produce a Message.
            let _ = process(&input, now());
        }
    }

    proptest::proptest! {
        /// `process` is total: any shape a misbehaving provider backend
        /// could emit must produce a `Processed` without panicking, and
        /// a `summary`, when present, must never exceed `SUMMARY_MAX_LEN`.
        #[test]
        fn process_never_panics_and_summary_stays_within_limit(raw in herdctl_core::test_support::arb_raw_record()) {
            let processed = process(&raw, now());
            if let Message::Assistant { summary: Some(s), .. } = processed.message {
                proptest::prop_assert!(s.chars().count() <= SUMMARY_MAX_LEN);
            }
        }
    }
}
