//! Tool Catalog
//!
//! The set of tools discovered from the tool worker at session start:
//!
//! - `ToolDefinition` - name, description and parameter schema of one tool
//! - `ToolCatalog` - immutable, O(1) lookup with discovery-order iteration
//! - `ValidatedToolCall` - a call whose name has been checked against the catalog
//!
//! Dispatch only ever accepts a `ValidatedToolCall`, so a free-form tool name
//! coming out of generated text cannot reach the worker without an existence
//! check.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoreError, CoreResult};

/// Maximum description length forwarded to native tool calling.
pub const MAX_NATIVE_DESCRIPTION_CHARS: usize = 512;

/// Metadata for a single tool exposed by the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// JSON Schema for the tool's arguments
    #[serde(default = "empty_object_schema")]
    pub input_schema: Value,
}

fn empty_object_schema() -> Value {
    serde_json::json!({"type": "object", "properties": {}})
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        let input_schema = if input_schema.is_null() {
            empty_object_schema()
        } else {
            input_schema
        };
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Schema in the OpenAI-style `{"type":"function","function":{...}}` shape.
    pub fn to_native_schema(&self) -> Value {
        let description: String = self
            .description
            .chars()
            .take(MAX_NATIVE_DESCRIPTION_CHARS)
            .collect();
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": description,
                "parameters": self.input_schema,
            }
        })
    }
}

/// A tool call whose name is known to the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedToolCall {
    tool: Arc<ToolDefinition>,
    arguments: Map<String, Value>,
}

impl ValidatedToolCall {
    pub fn name(&self) -> &str {
        &self.tool.name
    }

    pub fn definition(&self) -> &ToolDefinition {
        &self.tool
    }

    pub fn arguments(&self) -> &Map<String, Value> {
        &self.arguments
    }

    /// Arguments as a JSON object value, ready for the wire.
    pub fn arguments_value(&self) -> Value {
        Value::Object(self.arguments.clone())
    }
}

/// Immutable catalog of tools for one session.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: Vec<Arc<ToolDefinition>>,
    index: HashMap<String, usize>,
}

impl ToolCatalog {
    /// Build a catalog from discovered definitions.
    ///
    /// Names must be non-empty and unique.
    pub fn from_definitions(definitions: Vec<ToolDefinition>) -> CoreResult<Self> {
        let mut tools = Vec::with_capacity(definitions.len());
        let mut index = HashMap::with_capacity(definitions.len());

        for def in definitions {
            if def.name.trim().is_empty() {
                return Err(CoreError::validation("tool definition has an empty name"));
            }
            if index.contains_key(&def.name) {
                return Err(CoreError::validation(format!(
                    "duplicate tool name in catalog: {}",
                    def.name
                )));
            }
            index.insert(def.name.clone(), tools.len());
            tools.push(Arc::new(def));
        }

        Ok(Self { tools, index })
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.index.get(name).map(|&i| self.tools[i].as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Tool names in discovery order.
    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.iter().map(|t| t.as_ref())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Check `name` against the catalog and pair it with its arguments.
    pub fn resolve(&self, name: &str, arguments: Map<String, Value>) -> CoreResult<ValidatedToolCall> {
        let idx = self.index.get(name).ok_or_else(|| {
            CoreError::not_found(format!(
                "unknown tool '{}' (available: {})",
                name,
                self.names().join(", ")
            ))
        })?;
        Ok(ValidatedToolCall {
            tool: Arc::clone(&self.tools[*idx]),
            arguments,
        })
    }

    /// Native tool schemas for providers that support tool selection.
    pub fn to_native_tools(&self) -> Vec<Value> {
        self.tools.iter().map(|t| t.to_native_schema()).collect()
    }
}
