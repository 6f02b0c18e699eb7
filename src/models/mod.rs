//! Data Models

pub mod settings;
