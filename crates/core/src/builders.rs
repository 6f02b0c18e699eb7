//! Builder Patterns
//!
//! Validated configuration for the agent loop.
//!
//! The builder follows the standard Rust builder pattern:
//! 1. Create with `::new()` or `::default()`
//! 2. Chain `.field(value)` calls
//! 3. Call `.build()` which validates and returns `CoreResult<LoopConfig>`
//!
//! Validation happens at build time, so a bad config file fails at startup
//! rather than in the middle of a turn.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

pub const DEFAULT_MAX_HOPS: u32 = 10;
pub const DEFAULT_HOP_TIMEOUT_SECS: u64 = 180;
pub const DEFAULT_MAX_TOOL_CONTENT_CHARS: usize = 1600;
pub const DEFAULT_MAX_SEARCH_RESULTS_INLINE: usize = 3;

const MAX_HOPS_LIMIT: u32 = 100;
const MIN_TOOL_CONTENT_CHARS: usize = 64;

// ============================================================================
// LoopConfig
// ============================================================================

/// Built agent-loop configuration (output of `LoopConfigBuilder`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Hop bound per user turn
    pub max_hops: u32,
    /// Deadline for a single generation call
    pub hop_timeout: Duration,
    /// Cap on the characters of a compacted tool-result message
    pub max_tool_content_chars: usize,
    /// Search hits summarized inline in a tool-result message
    pub max_search_results_inline: usize,
    /// Name of the worker's search tool, if any
    pub search_tool: Option<String>,
    /// Name of the worker's detail/fetch tool, if any
    pub detail_tool: Option<String>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_hops: DEFAULT_MAX_HOPS,
            hop_timeout: Duration::from_secs(DEFAULT_HOP_TIMEOUT_SECS),
            max_tool_content_chars: DEFAULT_MAX_TOOL_CONTENT_CHARS,
            max_search_results_inline: DEFAULT_MAX_SEARCH_RESULTS_INLINE,
            search_tool: None,
            detail_tool: None,
        }
    }
}

// ============================================================================
// LoopConfigBuilder
// ============================================================================

/// Builder for agent-loop configuration with validation at build time.
///
/// # Example
/// ```ignore
/// let config = LoopConfigBuilder::new()
///     .max_hops(6)
///     .search_tool("pf2e_db_search")
///     .build()?;
/// ```
#[derive(Debug, Default)]
pub struct LoopConfigBuilder {
    max_hops: Option<u32>,
    hop_timeout: Option<Duration>,
    max_tool_content_chars: Option<usize>,
    max_search_results_inline: Option<usize>,
    search_tool: Option<String>,
    detail_tool: Option<String>,
}

impl LoopConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the hop bound (must be > 0 and <= 100).
    pub fn max_hops(mut self, n: u32) -> Self {
        self.max_hops = Some(n);
        self
    }

    /// Set the per-generation deadline (must be > 0).
    pub fn hop_timeout(mut self, timeout: Duration) -> Self {
        self.hop_timeout = Some(timeout);
        self
    }

    /// Set the tool-result character cap (must be >= 64).
    pub fn max_tool_content_chars(mut self, n: usize) -> Self {
        self.max_tool_content_chars = Some(n);
        self
    }

    /// Set how many search hits are summarized inline.
    pub fn max_search_results_inline(mut self, n: usize) -> Self {
        self.max_search_results_inline = Some(n);
        self
    }

    pub fn search_tool(mut self, name: impl Into<String>) -> Self {
        self.search_tool = Some(name.into());
        self
    }

    pub fn detail_tool(mut self, name: impl Into<String>) -> Self {
        self.detail_tool = Some(name.into());
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> CoreResult<LoopConfig> {
        let max_hops = self.max_hops.unwrap_or(DEFAULT_MAX_HOPS);
        let hop_timeout = self
            .hop_timeout
            .unwrap_or(Duration::from_secs(DEFAULT_HOP_TIMEOUT_SECS));
        let max_tool_content_chars = self
            .max_tool_content_chars
            .unwrap_or(DEFAULT_MAX_TOOL_CONTENT_CHARS);
        let max_search_results_inline = self
            .max_search_results_inline
            .unwrap_or(DEFAULT_MAX_SEARCH_RESULTS_INLINE);

        if max_hops == 0 {
            return Err(CoreError::config("max_hops must be > 0"));
        }
        if max_hops > MAX_HOPS_LIMIT {
            return Err(CoreError::config(format!(
                "max_hops must be <= {}",
                MAX_HOPS_LIMIT
            )));
        }
        if hop_timeout.is_zero() {
            return Err(CoreError::config("hop_timeout must be > 0"));
        }
        if max_tool_content_chars < MIN_TOOL_CONTENT_CHARS {
            return Err(CoreError::config(format!(
                "max_tool_content_chars must be >= {}",
                MIN_TOOL_CONTENT_CHARS
            )));
        }
        let search_tool = self.search_tool.filter(|s| !s.trim().is_empty());
        let detail_tool = self.detail_tool.filter(|s| !s.trim().is_empty());

        Ok(LoopConfig {
            max_hops,
            hop_timeout,
            max_tool_content_chars,
            max_search_results_inline,
            search_tool,
            detail_tool,
        })
    }
}
