//! Agent Orchestration
//!
//! - `AgentLoop` - the bounded per-turn state machine
//! - `Session` - worker startup, discovery and log seeding
//! - `AgentHandle` - turn queue in front of a running agent

pub mod agent_loop;
pub mod handle;
pub mod session;

pub use agent_loop::AgentLoop;
pub use handle::AgentHandle;
pub use session::{seed_log, Session};
