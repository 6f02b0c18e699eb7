//! Tool-Result Compaction
//!
//! Keeps tool-result messages short enough to leave room in the generator's
//! context: search hits are summarized, detail records are excerpted, and
//! everything else is serialized and capped. Search results are followed by
//! a usage hint steering the generator toward a final answer.

use serde_json::{Map, Value};

use scribe_core::LoopConfig;

const SEARCH_SUMMARY_CHARS: usize = 140;
const DETAIL_SUMMARY_CHARS: usize = 300;
const DETAIL_TEXT_CHARS: usize = 1000;

pub const EMPTY_SEARCH_HINT: &str = "No results found. You may reformulate the query once \
(e.g., try synonyms or related conditions) or ask the user a brief clarifying question.";

/// Hint appended after a non-empty search result.
pub fn search_results_hint(search_tool: &str, detail_tool: Option<&str>) -> String {
    match detail_tool {
        Some(detail_tool) => format!(
            "Use the above search_summary to answer. \
             If you need the full text of ONE top item, call {} exactly once with its category and aon_id. \
             Otherwise, produce the final answer now without calling {} again.",
            detail_tool, search_tool
        ),
        None => format!(
            "Use the above search_summary to answer. \
             Produce the final answer now without calling {} again.",
            search_tool
        ),
    }
}

/// Truncate to at most `max_chars` characters without splitting a char.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Structured error payload standing in for a failed tool result.
pub fn error_payload(name: &str, cause: &str) -> Value {
    serde_json::json!({ "error": format!("tool '{}' failed: {}", name, cause) })
}

/// Limits and tool names that drive compaction.
#[derive(Debug, Clone, PartialEq)]
pub struct CompactionPolicy {
    pub max_chars: usize,
    pub max_search_results: usize,
    pub search_tool: Option<String>,
    pub detail_tool: Option<String>,
}

impl From<&LoopConfig> for CompactionPolicy {
    fn from(config: &LoopConfig) -> Self {
        Self {
            max_chars: config.max_tool_content_chars,
            max_search_results: config.max_search_results_inline,
            search_tool: config.search_tool.clone(),
            detail_tool: config.detail_tool.clone(),
        }
    }
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        Self::from(&LoopConfig::default())
    }
}

impl CompactionPolicy {
    fn is_search(&self, name: &str) -> bool {
        self.search_tool.as_deref() == Some(name)
    }

    fn is_detail(&self, name: &str) -> bool {
        self.detail_tool.as_deref() == Some(name)
    }

    /// Compact a tool payload into message content.
    pub fn compact(&self, name: &str, payload: &Value) -> String {
        let body = match payload {
            Value::Object(map) if is_error_payload(map) => payload.to_string(),
            Value::Object(_) if self.is_search(name) => self.summarize_search(payload),
            Value::Object(_) if self.is_detail(name) => summarize_detail(payload),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        truncate_chars(&body, self.max_chars).to_string()
    }

    /// Hint appended after a search-tool result, if any.
    pub fn usage_hint(&self, name: &str, payload: &Value) -> Option<String> {
        if !self.is_search(name) {
            return None;
        }
        if payload.as_object().is_some_and(is_error_payload) {
            return None;
        }
        let has_results = payload
            .get("results")
            .and_then(Value::as_array)
            .is_some_and(|results| !results.is_empty());
        Some(if has_results {
            search_results_hint(name, self.detail_tool.as_deref())
        } else {
            EMPTY_SEARCH_HINT.to_string()
        })
    }

    /// Full tool-result message content: compacted payload plus hint.
    pub fn render_tool_message(&self, name: &str, payload: &Value) -> String {
        let compact = self.compact(name, payload);
        match self.usage_hint(name, payload) {
            Some(hint) => format!("{}\n\n{}", compact, hint),
            None => compact,
        }
    }

    fn summarize_search(&self, payload: &Value) -> String {
        let results = payload
            .get("results")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut lines = vec![format!(
            "search_summary: query={} section={} count={}",
            quoted(payload.get("query")),
            quoted(payload.get("section")),
            results.len()
        )];
        for (i, result) in results.iter().take(self.max_search_results).enumerate() {
            lines.push(format!(
                "{}. {} — {} — {}",
                i + 1,
                plain(result.get("name")),
                plain(result.get("url")),
                excerpt(result.get("summary"), SEARCH_SUMMARY_CHARS)
            ));
        }
        lines.join("\n")
    }
}

/// A dispatch failure (`{"error": ...}`) rather than a tool result.
fn is_error_payload(map: &Map<String, Value>) -> bool {
    map.len() == 1 && map.get("error").is_some_and(Value::is_string)
}

fn summarize_detail(payload: &Value) -> String {
    [
        format!(
            "detail_summary: name={} level={} url={}",
            quoted(payload.get("name")),
            plain(payload.get("level")),
            plain(payload.get("url"))
        ),
        format!("traits={}", plain(payload.get("traits"))),
        format!(
            "summary={}",
            excerpt(payload.get("summary"), DETAIL_SUMMARY_CHARS)
        ),
        format!(
            "text_excerpt={}",
            excerpt(payload.get("text"), DETAIL_TEXT_CHARS)
        ),
    ]
    .join("\n")
}

fn quoted(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => format!("'{}'", s),
        other => plain(other),
    }
}

fn plain(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "None".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn excerpt(value: Option<&Value>, max_chars: usize) -> String {
    let text = value.and_then(Value::as_str).unwrap_or("");
    truncate_chars(text, max_chars).trim().to_string()
}
