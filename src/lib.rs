//! Society Scribe - Tool-Calling Agent Orchestrator
//!
//! Mediates between an OpenAI-compatible generation backend and an MCP tool
//! worker running as a stdio subprocess.
//! It includes:
//! - The agent loop, session setup and turn queue
//! - The MCP stdio bridge
//! - Config loading and read-only rules database access
//! - Data models and utilities

pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use models::settings::AppConfig;
pub use services::agent::{AgentHandle, AgentLoop, Session};
pub use services::tools::{BridgeConfig, BridgeState, ToolBridge, ToolInvocationResult, ToolInvoker};
pub use storage::ConfigService;
pub use utils::error::{AppError, AppResult};
pub use utils::logging::init_logging;
