//! Settings Models
//!
//! Application configuration loaded once at startup from `config.toml`,
//! then adjusted by environment variables. Read-only after startup.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use scribe_core::{CoreResult, LoopConfig, LoopConfigBuilder};
use scribe_llm::{ProviderConfig, SamplingParams, DEFAULT_CHAT_COMPLETIONS_URL};
use scribe_tools::prompt::BASE_SYSTEM_PROMPT;

/// Environment variable naming the rules database shared with the worker.
pub const DB_PATH_ENV: &str = "PF2E_DB_PATH";

/// Generation backend settings (`[model]`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// OpenAI-compatible chat-completions endpoint
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    /// Pass tool schemas for native tool selection
    pub native_tools: bool,
    pub request_timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        let sampling = SamplingParams::default();
        Self {
            base_url: DEFAULT_CHAT_COMPLETIONS_URL.to_string(),
            model: "local".to_string(),
            api_key: None,
            temperature: sampling.temperature,
            top_p: sampling.top_p,
            max_tokens: sampling.max_tokens,
            native_tools: true,
            request_timeout_secs: 300,
        }
    }
}

/// Tool worker subprocess settings (`[tool_worker]`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolWorkerSettings {
    /// Name used in logs
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    /// Extra environment for the worker, on top of the inherited one
    pub env: BTreeMap<String, String>,
    pub startup_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for ToolWorkerSettings {
    fn default() -> Self {
        Self {
            name: "pf2e".to_string(),
            command: "python3".to_string(),
            args: vec!["-m".to_string(), "pf2e_mcp.server".to_string()],
            env: BTreeMap::new(),
            startup_timeout_secs: 30,
            request_timeout_secs: 60,
        }
    }
}

impl ToolWorkerSettings {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Agent loop settings (`[agent]`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub max_hops: u32,
    pub hop_timeout_secs: u64,
    pub max_tool_content_chars: usize,
    pub max_search_results_inline: usize,
    pub search_tool: Option<String>,
    pub detail_tool: Option<String>,
    /// Replaces the built-in persona prompt
    pub system_prompt: Option<String>,
    /// Turns that may wait while one is being answered
    pub turn_queue_capacity: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        let loop_defaults = LoopConfig::default();
        Self {
            max_hops: loop_defaults.max_hops,
            hop_timeout_secs: loop_defaults.hop_timeout.as_secs(),
            max_tool_content_chars: loop_defaults.max_tool_content_chars,
            max_search_results_inline: loop_defaults.max_search_results_inline,
            search_tool: Some("pf2e_db_search".to_string()),
            detail_tool: Some("pf2e_db_get".to_string()),
            system_prompt: None,
            turn_queue_capacity: 32,
        }
    }
}

/// Session-setup context settings (`[catalog]`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    /// SQLite database whose `docs` categories are listed to the generator
    pub db_path: Option<PathBuf>,
    /// Replaces the built-in rules primer
    pub primer: Option<String>,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            db_path: Some(PathBuf::from("pf2e.db")),
            primer: None,
        }
    }
}

/// Application configuration stored in config.toml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Fallback tracing filter when RUST_LOG is unset
    pub log_level: String,
    pub model: ModelSettings,
    pub tool_worker: ToolWorkerSettings,
    pub agent: AgentSettings,
    pub catalog: CatalogSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            model: ModelSettings::default(),
            tool_worker: ToolWorkerSettings::default(),
            agent: AgentSettings::default(),
            catalog: CatalogSettings::default(),
        }
    }
}

impl AppConfig {
    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup("SCRIBE_MODEL_URL") {
            self.model.base_url = url;
        }
        if let Some(model) = lookup("SCRIBE_MODEL") {
            self.model.model = model;
        }
        if let Some(key) = lookup("SCRIBE_API_KEY") {
            self.model.api_key = Some(key);
        }
        if let Some(command) = lookup("MCP_SERVER_COMMAND") {
            self.tool_worker.command = command;
        }
        if let Some(module) = lookup("MCP_SERVER_MODULE") {
            self.tool_worker.args = vec!["-m".to_string(), module];
        }
        if let Some(db_path) = lookup(DB_PATH_ENV) {
            self.catalog.db_path = Some(PathBuf::from(db_path));
        }
        if let Some(hops) = lookup("SCRIBE_MAX_HOPS") {
            self.agent.max_hops = hops
                .trim()
                .parse()
                .map_err(|_| format!("SCRIBE_MAX_HOPS must be a positive integer, got '{}'", hops))?;
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(self.model.base_url.starts_with("http://") || self.model.base_url.starts_with("https://"))
        {
            return Err(format!(
                "model.base_url must be an http(s) URL, got '{}'",
                self.model.base_url
            ));
        }
        if self.model.model.trim().is_empty() {
            return Err("model.model cannot be empty".to_string());
        }
        if self.model.request_timeout_secs == 0 {
            return Err("model.request_timeout_secs must be > 0".to_string());
        }
        self.sampling().validate().map_err(|e| e.to_string())?;

        if self.tool_worker.command.trim().is_empty() {
            return Err("tool_worker.command cannot be empty".to_string());
        }
        if self.tool_worker.startup_timeout_secs == 0 || self.tool_worker.request_timeout_secs == 0
        {
            return Err("tool_worker timeouts must be > 0".to_string());
        }

        if self.agent.turn_queue_capacity == 0 {
            return Err("agent.turn_queue_capacity must be > 0".to_string());
        }
        self.loop_config().map_err(|e| e.to_string())?;

        Ok(())
    }

    /// Sampling parameters sent with every generation call.
    pub fn sampling(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.model.temperature,
            top_p: self.model.top_p,
            max_tokens: self.model.max_tokens,
        }
    }

    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            base_url: self.model.base_url.clone(),
            model: self.model.model.clone(),
            api_key: self.model.api_key.clone(),
            native_tools: self.model.native_tools,
            request_timeout: Duration::from_secs(self.model.request_timeout_secs),
        }
    }

    /// Build the validated agent-loop configuration.
    pub fn loop_config(&self) -> CoreResult<LoopConfig> {
        let agent = &self.agent;
        let mut builder = LoopConfigBuilder::new()
            .max_hops(agent.max_hops)
            .hop_timeout(Duration::from_secs(agent.hop_timeout_secs))
            .max_tool_content_chars(agent.max_tool_content_chars)
            .max_search_results_inline(agent.max_search_results_inline);
        if let Some(tool) = &agent.search_tool {
            builder = builder.search_tool(tool.clone());
        }
        if let Some(tool) = &agent.detail_tool {
            builder = builder.detail_tool(tool.clone());
        }
        builder.build()
    }

    /// Persona prompt seeded as the first system message.
    pub fn system_prompt(&self) -> &str {
        self.agent
            .system_prompt
            .as_deref()
            .unwrap_or(BASE_SYSTEM_PROMPT)
    }

    /// Worker environment: configured entries plus the database path.
    pub fn worker_env(&self) -> BTreeMap<String, String> {
        let mut env = self.tool_worker.env.clone();
        if let Some(db_path) = &self.catalog.db_path {
            env.entry(DB_PATH_ENV.to_string())
                .or_insert_with(|| db_path.display().to_string());
        }
        env
    }
}
