//! Generation Types
//!
//! Request/response shapes shared by every generation provider.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use scribe_core::{Message, ToolDefinition};

pub const DEFAULT_TEMPERATURE: f32 = 0.25;
pub const DEFAULT_TOP_P: f32 = 0.95;
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Errors raised by a generation provider.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Parse error: {message}")]
    ParseError { message: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Rate limited: {message}")]
    RateLimited { message: String },

    #[error("Server error ({status:?}): {message}")]
    ServerError { message: String, status: Option<u16> },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("{message}")]
    Other { message: String },
}

/// Result type alias for provider calls
pub type LlmResult<T> = Result<T, LlmError>;

/// Fixed sampling parameters sent with every generation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f32,
    /// Nucleus-sampling threshold
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl SamplingParams {
    /// Reject values a backend would refuse.
    pub fn validate(&self) -> LlmResult<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(LlmError::InvalidRequest {
                message: "temperature must be between 0.0 and 2.0".to_string(),
            });
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(LlmError::InvalidRequest {
                message: "top_p must be in (0.0, 1.0]".to_string(),
            });
        }
        if self.max_tokens == 0 {
            return Err(LlmError::InvalidRequest {
                message: "max_tokens must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

/// One generation call: the full log snapshot plus optional tool schemas.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub messages: Vec<Message>,
    /// Empty when native tool selection is disabled
    pub tools: Vec<ToolDefinition>,
    pub sampling: SamplingParams,
}

impl GenerationRequest {
    pub fn new(messages: Vec<Message>, sampling: SamplingParams) -> Self {
        Self {
            messages,
            tools: Vec::new(),
            sampling,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

/// Output of a generation call.
#[derive(Debug, Clone, PartialEq)]
pub enum Generation {
    /// Plain text completion (may itself contain a tool-call envelope)
    Text(String),
    /// Tool call selected natively by the backend
    ToolCall {
        /// Backend-assigned call id, echoed back with the result
        id: Option<String>,
        name: String,
        arguments: Value,
    },
}

impl Generation {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        Self::ToolCall {
            id: None,
            name: name.into(),
            arguments,
        }
    }

    pub fn tool_call_with_id(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: Value,
    ) -> Self {
        Self::ToolCall {
            id: Some(id.into()),
            name: name.into(),
            arguments,
        }
    }

    pub fn is_tool_call(&self) -> bool {
        matches!(self, Self::ToolCall { .. })
    }
}
