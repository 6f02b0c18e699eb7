//! Tool Worker Access
//!
//! - `ToolBridge` - owns the MCP stdio worker subprocess
//! - `mcp_types` - JSON-RPC framing and tool-result content items
//! - `ToolInvoker` - the seam the agent loop dispatches through

pub mod mcp_client;
pub mod mcp_types;

pub use mcp_client::{BridgeConfig, BridgeState, ToolBridge};
pub use mcp_types::{ContentItem, McpServerInfo, ToolInvocationResult, PROTOCOL_VERSION};

use async_trait::async_trait;

use scribe_core::ValidatedToolCall;

use crate::utils::error::AppResult;

/// Something that can execute validated tool calls.
///
/// `ToolBridge` is the production implementation; tests substitute
/// in-process fakes.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Execute one call and return its result.
    async fn invoke(&self, call: &ValidatedToolCall) -> AppResult<ToolInvocationResult>;

    /// Release the worker. Called once when the owning agent stops.
    async fn shutdown(&self) {}
}
