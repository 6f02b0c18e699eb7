//! MCP Wire Types
//!
//! JSON-RPC 2.0 framing and the tool-result content model used by the
//! stdio bridge.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// MCP protocol revision sent in `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC 2.0 request
#[derive(Debug, Serialize)]
pub(crate) struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> JsonRpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// Any JSON-RPC frame read from the worker.
///
/// Requests and notifications from the worker carry a `method`; responses
/// never do.
#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcFrame {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcFrame {
    /// Whether this frame is the response to request `id`.
    pub fn answers(&self, id: u64) -> bool {
        self.method.is_none() && self.id.as_ref().and_then(Value::as_u64) == Some(id)
    }
}

/// JSON-RPC 2.0 error
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Information about a connected MCP server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerInfo {
    /// Server name (from configuration)
    pub name: String,
    /// Protocol version
    pub protocol_version: String,
    /// Server capabilities
    pub capabilities: Value,
    /// Server-provided metadata
    pub server_info: Value,
}

/// One typed item in a tool result.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentItem {
    /// Structured data (`type: "json"` items or `structuredContent`)
    Structured(Value),
    /// Plain text (`type: "text"` items)
    Text(String),
    /// Anything else (images, resources), kept verbatim
    Other(Value),
}

impl ContentItem {
    fn from_wire(item: &Value) -> Self {
        match item.get("type").and_then(Value::as_str) {
            Some("json") => match item.get("data").or_else(|| item.get("json")) {
                Some(data) => ContentItem::Structured(data.clone()),
                None => ContentItem::Other(item.clone()),
            },
            Some("text") => ContentItem::Text(
                item.get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            ),
            _ => ContentItem::Other(item.clone()),
        }
    }
}

/// Result of a `tools/call` request.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocationResult {
    pub content: Vec<ContentItem>,
    /// Worker flagged the call as failed
    pub is_error: bool,
    /// The untouched `result` object
    pub raw: Value,
}

impl ToolInvocationResult {
    /// Decode a `tools/call` result object.
    pub fn from_result(raw: Value) -> Self {
        let mut content: Vec<ContentItem> = raw
            .get("content")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(ContentItem::from_wire).collect())
            .unwrap_or_default();

        if let Some(structured) = raw.get("structuredContent").filter(|v| !v.is_null()) {
            content.push(ContentItem::Structured(structured.clone()));
        }

        let is_error = raw
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Self {
            content,
            is_error,
            raw,
        }
    }

    /// Convenience constructor for a single text item.
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            raw: serde_json::json!({"content": [{"type": "text", "text": text}]}),
            content: vec![ContentItem::Text(text)],
            is_error: false,
        }
    }

    /// Convenience constructor for a single structured item.
    pub fn structured(data: Value) -> Self {
        Self {
            raw: serde_json::json!({"content": [{"type": "json", "data": data}]}),
            content: vec![ContentItem::Structured(data)],
            is_error: false,
        }
    }

    /// Concatenated text items, used to describe worker-side failures.
    pub fn text_summary(&self) -> String {
        let parts: Vec<&str> = self
            .content
            .iter()
            .filter_map(|item| match item {
                ContentItem::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if parts.is_empty() {
            self.raw.to_string()
        } else {
            parts.join("\n")
        }
    }

    /// The payload handed to compaction.
    ///
    /// First structured item, else the first text item (decoded when the text
    /// is itself a JSON document), else the whole raw result.
    pub fn payload(&self) -> Value {
        let structured = self.content.iter().find_map(|item| match item {
            ContentItem::Structured(data) => Some(data.clone()),
            _ => None,
        });
        if let Some(data) = structured {
            return data;
        }

        let text = self.content.iter().find_map(|item| match item {
            ContentItem::Text(text) => Some(text),
            _ => None,
        });
        if let Some(text) = text {
            let trimmed = text.trim_start();
            if trimmed.starts_with('{') || trimmed.starts_with('[') {
                if let Ok(decoded) = serde_json::from_str::<Value>(text) {
                    return decoded;
                }
            }
            return Value::String(text.clone());
        }

        self.raw.clone()
    }
}
