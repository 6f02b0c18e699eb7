//! Storage Layer
//!
//! Config file loading and read-only access to the rules database.

pub mod config;
pub mod database;

pub use config::*;
pub use database::*;
