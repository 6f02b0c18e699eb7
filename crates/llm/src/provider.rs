//! LLM Provider Trait
//!
//! Defines the common interface for generation backends.

use async_trait::async_trait;

use super::types::{Generation, GenerationRequest, LlmError, LlmResult};

/// Trait that all generation providers must implement.
///
/// A provider turns one `GenerationRequest` into one `Generation`. The call
/// may take a long time; callers run it on a task that does not accept
/// inbound turns.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns the provider name for identification.
    fn name(&self) -> &'static str;

    /// Returns the current model being used.
    fn model(&self) -> &str;

    /// Returns whether this provider can select tools natively.
    ///
    /// When false, tool schemas are never attached to requests and tool
    /// calls only arrive as text envelopes.
    fn supports_tools(&self) -> bool;

    /// Produce a single completion for the given log snapshot.
    async fn generate(&self, request: GenerationRequest) -> LlmResult<Generation>;

    /// Check if the backend is reachable.
    async fn health_check(&self) -> LlmResult<()> {
        Ok(())
    }
}

/// Map an HTTP error status to a provider error.
pub fn parse_http_error(status: u16, body: &str, provider: &str) -> LlmError {
    match status {
        401 => LlmError::AuthenticationFailed {
            message: format!("{}: Invalid API key", provider),
        },
        403 => LlmError::AuthenticationFailed {
            message: format!("{}: Access denied", provider),
        },
        429 => LlmError::RateLimited {
            message: body.to_string(),
        },
        400 | 404 | 422 => LlmError::InvalidRequest {
            message: body.to_string(),
        },
        500..=599 => LlmError::ServerError {
            message: body.to_string(),
            status: Some(status),
        },
        _ => LlmError::Other {
            message: format!("HTTP {}: {}", status, body),
        },
    }
}
