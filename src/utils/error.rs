//! Error Handling
//!
//! Unified error types for the application.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use scribe_core::CoreError;
use scribe_llm::LlmError;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// SQLite errors (auto-converted from rusqlite::Error)
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Domain errors from the core crate
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Generation backend errors
    #[error("Generation error: {0}")]
    Generation(#[from] LlmError),

    /// Tool worker could not be spawned or failed the handshake
    #[error("Tool worker failed to start: {0}")]
    BridgeStart(String),

    /// Tool worker sent a malformed or unexpected frame
    #[error("Tool worker protocol error: {0}")]
    BridgeProtocol(String),

    /// A single tool invocation failed
    #[error("Tool '{name}' failed: {cause}")]
    ToolExecution { name: String, cause: String },

    /// The bridge was used after `close()`
    #[error("Tool worker session is closed")]
    BridgeClosed,

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a bridge start error
    pub fn bridge_start(msg: impl Into<String>) -> Self {
        Self::BridgeStart(msg.into())
    }

    /// Create a bridge protocol error
    pub fn bridge_protocol(msg: impl Into<String>) -> Self {
        Self::BridgeProtocol(msg.into())
    }

    /// Create a tool execution error
    pub fn tool_execution(name: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::ToolExecution {
            name: name.into(),
            cause: cause.into(),
        }
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error must end the session rather than a single turn.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::BridgeStart(_) | Self::BridgeProtocol(_) | Self::BridgeClosed
        )
    }
}

impl From<AppError> for String {
    fn from(err: AppError) -> String {
        err.to_string()
    }
}
