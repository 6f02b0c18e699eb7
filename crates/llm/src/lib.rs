//! Society Scribe LLM
//!
//! The generation capability boundary:
//! - `LlmProvider` trait consumed by the agent loop
//! - OpenAI-compatible chat-completions provider (llama.cpp, vLLM, OpenAI)
//! - Adapter for opaque blocking generation functions
//!
//! Also includes the HTTP client factory.

pub mod blocking;
pub mod http_client;
pub mod openai;
pub mod provider;
pub mod types;

// Re-export main types
pub use blocking::BlockingProvider;
pub use http_client::build_http_client;
pub use openai::{OpenAICompatProvider, ProviderConfig, DEFAULT_CHAT_COMPLETIONS_URL};
pub use provider::LlmProvider;
pub use types::*;
