// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Structural comparison of configuration documents.
//!
//! Both sides are parsed into `serde_json::Value` trees and compared with
//! [`structurally_equal`]: object keys are unordered, arrays are positional, and
//! numbers compare by numeric value so `1` and `1.0` are the same setting.

use crate::error::{KwatcherError, Result};
use serde_json::{Map, Number, Value};

/// Outcome of comparing a freshly fetched payload with the stored artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigDiff {
    pub changed: bool,
}

/// Compare a new payload with the stored artifact body.
///
/// Fails only when either side is not a JSON object.
pub fn compare(new_payload: &[u8], stored: &str) -> Result<ConfigDiff> {
    let new_config = parse_object(new_payload)
        .map_err(|e| KwatcherError::Transport(format!("new configuration: {}", e)))?;
    let stored_config = parse_object(stored.as_bytes())
        .map_err(|e| KwatcherError::InvalidArtifact(e.to_string()))?;

    Ok(ConfigDiff {
        changed: !objects_equal(&new_config, &stored_config),
    })
}

fn parse_object(raw: &[u8]) -> std::result::Result<Map<String, Value>, String> {
    match serde_json::from_slice::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("expected a JSON object, got {}", type_name(&other))),
        Err(e) => Err(format!("malformed JSON: {}", e)),
    }
}

/// Deep structural equality over two JSON values
pub fn structurally_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| structurally_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => objects_equal(x, y),
        _ => false,
    }
}

fn objects_equal(a: &Map<String, Value>, b: &Map<String, Value>) -> bool {
    a.len() == b.len()
        && a.iter().all(|(key, left)| {
            b.get(key)
                .is_some_and(|right| structurally_equal(left, right))
        })
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
