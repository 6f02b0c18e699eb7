//! Services Layer
//!
//! The tool worker bridge and the agent that drives it.

pub mod agent;
pub mod tools;
