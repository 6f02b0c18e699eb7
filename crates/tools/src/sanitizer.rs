//! Tool-Call Repair and Structural Parsing
//!
//! Turns a candidate envelope into a `(name, arguments)` pair. The raw
//! string is parsed strictly first; only if that fails is a single,
//! fixed sequence of textual repairs applied before one more attempt.
//!
//! Accepted shapes:
//! - `{"tool_call": {"name": "...", "arguments": {...}}}`
//! - `{"name": "...", "arguments": {...}}`
//!
//! Missing or `null` arguments count as an empty mapping; any other
//! non-object arguments make the call unparseable.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A structurally valid tool call recovered from generated output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedToolCall {
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl ParsedToolCall {
    /// Normalize a natively selected tool call into the text-envelope shape.
    pub fn from_native(name: &str, arguments: &Value) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            arguments: arguments_map(Some(arguments))?,
        })
    }

    /// Render as the canonical `{"tool_call": ...}` envelope.
    pub fn to_envelope(&self) -> String {
        serde_json::json!({
            "tool_call": {
                "name": self.name,
                "arguments": self.arguments,
            }
        })
        .to_string()
    }
}

fn smart_quotes() -> Option<&'static Regex> {
    static SMART: OnceLock<Option<Regex>> = OnceLock::new();
    SMART
        .get_or_init(|| Regex::new("[\u{201C}\u{201D}\u{00AB}\u{00BB}\u{201E}\u{201F}\u{2018}\u{2019}]").ok())
        .as_ref()
}

fn trailing_commas() -> Option<&'static Regex> {
    static TRAILING: OnceLock<Option<Regex>> = OnceLock::new();
    TRAILING
        .get_or_init(|| Regex::new(r"(?:,\s*)+([}\]])").ok())
        .as_ref()
}

/// Apply the fixed repair sequence to a JSON-looking string.
///
/// Repairs, in order: trim whitespace, smart quotes to `"`, single quotes to
/// `"`, drop commas before `}`/`]`, and trim to the outermost `{ ... }` span
/// when the boundary is not already clean. Running it twice is the same as
/// running it once.
pub fn sanitize(raw: &str) -> String {
    let mut s = raw.trim().to_string();

    if let Some(re) = smart_quotes() {
        s = re.replace_all(&s, "\"").into_owned();
    }
    s = s.replace('\'', "\"");
    if let Some(re) = trailing_commas() {
        s = re.replace_all(&s, "$1").into_owned();
    }

    if !(s.starts_with('{') && s.ends_with('}')) {
        if let (Some(first), Some(last)) = (s.find('{'), s.rfind('}')) {
            if last > first {
                s = s[first..=last].to_string();
            }
        }
    }

    s
}

/// Parse a candidate envelope, strictly and then once more after repair.
pub fn parse_tool_call(raw: &str) -> Option<ParsedToolCall> {
    if let Some(call) = parse_strict(raw) {
        return Some(call);
    }

    let repaired = sanitize(raw);
    let call = parse_strict(&repaired);
    if call.is_some() {
        tracing::debug!(raw_len = raw.len(), "tool_call recovered after repair");
    }
    call
}

fn parse_strict(raw: &str) -> Option<ParsedToolCall> {
    let value: Value = serde_json::from_str(raw).ok()?;
    extract_call(&value)
}

/// Match a decoded JSON value against the accepted envelope shapes.
pub fn extract_call(value: &Value) -> Option<ParsedToolCall> {
    let obj = value.as_object()?;

    let inner = match obj.get("tool_call") {
        Some(Value::Object(wrapped)) => wrapped,
        _ if obj.contains_key("name") && obj.contains_key("arguments") => obj,
        _ => return None,
    };

    let name = inner.get("name").and_then(Value::as_str)?.trim();
    if name.is_empty() {
        return None;
    }

    Some(ParsedToolCall {
        name: name.to_string(),
        arguments: arguments_map(inner.get("arguments"))?,
    })
}

fn arguments_map(arguments: Option<&Value>) -> Option<Map<String, Value>> {
    match arguments {
        None | Some(Value::Null) => Some(Map::new()),
        Some(Value::Object(map)) => Some(map.clone()),
        Some(_) => None,
    }
}
