//! Session Setup
//!
//! Brings up one conversation: starts the tool worker, discovers its tools,
//! seeds the conversation log and wires everything into an `AgentLoop`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use scribe_core::{ConversationLog, CoreResult, Role, ToolCatalog};
use scribe_llm::LlmProvider;
use scribe_tools::prompt::{build_tools_prompt, categories_line, RULES_PRIMER};

use super::agent_loop::AgentLoop;
use super::handle::AgentHandle;
use crate::models::settings::AppConfig;
use crate::services::tools::{BridgeConfig, ToolBridge, ToolInvoker};
use crate::storage::database::load_categories;
use crate::utils::error::{AppError, AppResult};

/// Build the initial log.
///
/// The base prompt comes first, followed by the tool catalog, the known
/// categories (when there are any) and the primer.
pub fn seed_log(
    system_prompt: &str,
    catalog: &ToolCatalog,
    categories: &[String],
    primer: &str,
) -> CoreResult<ConversationLog> {
    let mut log = ConversationLog::with_system(system_prompt);
    let mut position = log.insert_at(1, Role::System, build_tools_prompt(catalog))? + 1;
    if let Some(line) = categories_line(categories) {
        position = log.insert_at(position, Role::System, line)? + 1;
    }
    log.insert_at(position, Role::System, primer)?;
    Ok(log)
}

async fn read_categories(db_path: Option<PathBuf>) -> Vec<String> {
    let Some(path) = db_path else {
        return Vec::new();
    };
    match tokio::task::spawn_blocking(move || load_categories(&path)).await {
        Ok(categories) => categories,
        Err(e) => {
            tracing::warn!(error = %e, "Category lookup task failed");
            Vec::new()
        }
    }
}

/// Probe the generation backend once. An unreachable backend is only logged;
/// each turn still reports its own generation failures.
async fn check_backend(provider: &dyn LlmProvider, limit: Duration) -> bool {
    match tokio::time::timeout(limit, provider.health_check()).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!(provider = provider.name(), model = provider.model(), error = %e, "Generation backend health check failed");
            false
        }
        Err(_) => {
            tracing::warn!(
                provider = provider.name(),
                timeout_secs = limit.as_secs(),
                "Generation backend health check timed out"
            );
            false
        }
    }
}

/// A running conversation: the worker bridge plus the loop that uses it.
pub struct Session {
    config: Arc<AppConfig>,
    bridge: Arc<ToolBridge>,
    agent: AgentLoop,
}

impl Session {
    /// Start the tool worker and prepare the agent.
    ///
    /// The worker must become ready within the configured startup timeout.
    /// Any startup failure is returned to the caller and the worker is torn
    /// down first.
    pub async fn start(config: Arc<AppConfig>, provider: Arc<dyn LlmProvider>) -> AppResult<Self> {
        let loop_config = config.loop_config()?;
        check_backend(provider.as_ref(), config.tool_worker.startup_timeout()).await;
        let bridge = Arc::new(ToolBridge::new(BridgeConfig::from_app_config(&config)));

        let catalog = match Self::bring_up(&config, &bridge).await {
            Ok(catalog) => catalog,
            Err(e) => {
                bridge.close().await;
                return Err(e);
            }
        };

        let categories = read_categories(config.catalog.db_path.clone()).await;
        let primer = config.catalog.primer.as_deref().unwrap_or(RULES_PRIMER);
        let log = seed_log(config.system_prompt(), &catalog, &categories, primer)?;

        tracing::info!(
            tools = catalog.len(),
            categories = categories.len(),
            model = provider.model(),
            native_tools = provider.supports_tools(),
            "Session ready"
        );

        let agent = AgentLoop::new(
            log,
            catalog,
            provider,
            Arc::clone(&bridge) as Arc<dyn ToolInvoker>,
            loop_config,
            config.sampling(),
        );
        Ok(Self {
            config,
            bridge,
            agent,
        })
    }

    async fn bring_up(config: &AppConfig, bridge: &Arc<ToolBridge>) -> AppResult<Arc<ToolCatalog>> {
        let startup_timeout = config.tool_worker.startup_timeout();

        let starter: JoinHandle<AppResult<()>> = {
            let bridge = Arc::clone(bridge);
            tokio::spawn(async move { bridge.start().await })
        };

        let ready = tokio::time::timeout(startup_timeout, bridge.await_ready()).await;
        match ready {
            Ok(result) => result?,
            Err(_) => {
                starter.abort();
                return Err(AppError::bridge_start(format!(
                    "worker '{}' not ready within {}s",
                    bridge.name(),
                    startup_timeout.as_secs()
                )));
            }
        }
        match starter.await {
            Ok(result) => result?,
            Err(e) => return Err(AppError::bridge_start(format!("start task failed: {}", e))),
        }

        bridge.list_tools().await?;
        bridge
            .catalog()
            .ok_or_else(|| AppError::bridge_protocol("tool discovery produced no catalog"))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn bridge(&self) -> Arc<ToolBridge> {
        Arc::clone(&self.bridge)
    }

    pub fn agent(&self) -> &AgentLoop {
        &self.agent
    }

    /// Answer one user message on the calling task.
    pub async fn handle_turn(&mut self, user_text: &str) -> String {
        self.agent.handle_turn(user_text).await
    }

    /// Move the agent onto its own task behind a turn queue.
    pub fn into_handle(self) -> (AgentHandle, JoinHandle<()>) {
        AgentHandle::spawn(self.agent, self.config.agent.turn_queue_capacity)
    }

    /// Close the worker.
    pub async fn shutdown(self) {
        self.bridge.close().await;
    }
}
