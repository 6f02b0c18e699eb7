//! Society Scribe Core
//!
//! Foundational types for the Society Scribe workspace. This crate has no
//! dependency on the tool worker, the generation backend or the runtime.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `conversation` - Role-tagged message history (`ConversationLog`, `Message`, `Role`)
//! - `tool_catalog` - Discovered tools and validated calls (`ToolCatalog`, `ValidatedToolCall`)
//! - `builders` - Validated agent-loop configuration (`LoopConfigBuilder`)

pub mod builders;
pub mod conversation;
pub mod error;
pub mod tool_catalog;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Conversation ───────────────────────────────────────────────────────
pub use conversation::{ConversationLog, Message, Role, ToolCallRecord};

// ── Tool Catalog ───────────────────────────────────────────────────────
pub use tool_catalog::{ToolCatalog, ToolDefinition, ValidatedToolCall};

// ── Builders ───────────────────────────────────────────────────────────
pub use builders::{LoopConfig, LoopConfigBuilder};
