// SPDX-License-Identifier: MIT

//! Property-test generators for the raw, possibly-malformed runtime
//! records `herdctl-message`'s Message Processor normalizes, gated
//! behind the `test-support` feature so downstream crates' `proptest`
//! suites don't have to hand-roll them.

use proptest::prelude::*;
use serde_json::Value;

/// Any shape a misbehaving or evolving provider backend could emit:
/// not an object, an object with no `type`, a recognized `type` with
/// plausible fields, or an unrecognized `type`.
pub fn arb_raw_record() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<String>().prop_map(Value::String),
        any::<i64>().prop_map(|n| serde_json::json!(n)),
        prop::collection::vec(any::<String>(), 0..4).prop_map(|v| serde_json::json!(v)),
        arb_object_missing_type(),
        arb_known_type_record(),
        any::<String>().prop_map(|t| serde_json::json!({"type": t})),
    ]
}

fn arb_object_missing_type() -> impl Strategy<Value = Value> {
    any::<String>().prop_map(|content| serde_json::json!({"content": content}))
}

fn arb_known_type_record() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<String>().prop_map(|content| serde_json::json!({"type": "system", "content": content})),
        (any::<String>(), any::<bool>())
            .prop_map(|(content, partial)| serde_json::json!({"type": "assistant", "content": content, "partial": partial})),
        any::<String>().prop_map(|name| serde_json::json!({"type": "tool_use", "tool_name": name})),
        any::<bool>().prop_map(|success| serde_json::json!({"type": "tool_result", "success": success})),
        any::<String>().prop_map(|message| serde_json::json!({"type": "error", "message": message})),
    ]
}
