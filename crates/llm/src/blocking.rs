//! Blocking Provider Adapter
//!
//! Wraps an opaque, synchronous generation function (an in-process model
//! binding, for instance) so it runs on tokio's blocking pool instead of the
//! task that accepts new turns.
//!
//! At most one generation runs at a time. A caller that gives up on a
//! generation (a hop timeout) does not stop it; the next call waits until it
//! has finished.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::provider::LlmProvider;
use super::types::{Generation, GenerationRequest, LlmError, LlmResult};

type BlockingFn = dyn Fn(GenerationRequest) -> LlmResult<Generation> + Send + Sync;

/// Provider backed by a blocking closure.
#[derive(Clone)]
pub struct BlockingProvider {
    model: String,
    native_tools: bool,
    generate_fn: Arc<BlockingFn>,
    in_flight: Arc<Mutex<()>>,
}

impl BlockingProvider {
    pub fn new<F>(model: impl Into<String>, generate_fn: F) -> Self
    where
        F: Fn(GenerationRequest) -> LlmResult<Generation> + Send + Sync + 'static,
    {
        Self {
            model: model.into(),
            native_tools: false,
            generate_fn: Arc::new(generate_fn),
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    /// Advertise native tool selection to the agent loop.
    pub fn with_native_tools(mut self, enabled: bool) -> Self {
        self.native_tools = enabled;
        self
    }
}

impl std::fmt::Debug for BlockingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingProvider")
            .field("model", &self.model)
            .field("native_tools", &self.native_tools)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LlmProvider for BlockingProvider {
    fn name(&self) -> &'static str {
        "blocking"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn supports_tools(&self) -> bool {
        self.native_tools
    }

    async fn generate(&self, request: GenerationRequest) -> LlmResult<Generation> {
        let generate_fn = Arc::clone(&self.generate_fn);
        // Held by the blocking job itself so it outlives an abandoned caller
        let permit = Arc::clone(&self.in_flight).lock_owned().await;
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            generate_fn(request)
        })
        .await
        .map_err(|e| LlmError::Other {
            message: format!("generation task failed: {}", e),
        })?
    }
}
