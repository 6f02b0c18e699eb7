//! Duplicate Tool-Call Detection
//!
//! Catches a generator that requests the same tool with the same arguments
//! twice in a row. Only back-to-back repeats are detected.

use std::collections::VecDeque;
use std::fmt;

use serde_json::{Map, Value};

/// Number of signatures remembered: the current call and the one before it.
pub const GUARD_WINDOW: usize = 2;

/// Canonical `(name, arguments)` encoding used only for equality checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ToolCallSignature {
    name: String,
    arguments: String,
}

impl ToolCallSignature {
    /// Build a signature whose argument encoding has sorted keys at every level.
    pub fn new(name: &str, arguments: &Map<String, Value>) -> Self {
        let mut encoded = String::new();
        write_canonical_object(arguments, &mut encoded);
        Self {
            name: name.to_string(),
            arguments: encoded,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &str {
        &self.arguments
    }
}

impl fmt::Display for ToolCallSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.arguments)
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => write_canonical_object(map, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn write_canonical_object(map: &Map<String, Value>, out: &mut String) {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();

    out.push('{');
    for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&Value::String(key.clone()).to_string());
        out.push(':');
        if let Some(value) = map.get(key) {
            write_canonical(value, out);
        }
    }
    out.push('}');
}

/// Sliding window over the most recent tool-call signatures.
#[derive(Debug, Default)]
pub struct DuplicateCallGuard {
    recent: VecDeque<ToolCallSignature>,
}

impl DuplicateCallGuard {
    pub fn new() -> Self {
        Self {
            recent: VecDeque::with_capacity(GUARD_WINDOW),
        }
    }

    /// Record `signature` and report whether it repeats the previous call.
    pub fn observe(&mut self, signature: ToolCallSignature) -> bool {
        if self.recent.len() == GUARD_WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(signature);

        self.recent.len() == GUARD_WINDOW && self.recent[0] == self.recent[1]
    }

    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }

    /// Forget all recorded calls.
    pub fn clear(&mut self) {
        self.recent.clear();
    }
}
