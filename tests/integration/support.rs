//! Shared fakes for the integration tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use scribe_core::{LoopConfig, LoopConfigBuilder, Message, Role, ToolCatalog, ToolDefinition, ValidatedToolCall};
use scribe_llm::{Generation, GenerationRequest, LlmError, LlmProvider, LlmResult, SamplingParams};
use society_scribe::services::agent::seed_log;
use society_scribe::{AgentLoop, AppResult, ToolInvocationResult, ToolInvoker};

pub const SEARCH_TOOL: &str = "pf2e_db_search";
pub const DETAIL_TOOL: &str = "pf2e_db_get";

/// One scripted generation step.
pub enum Step {
    Reply(Generation),
    Fail(LlmError),
    Stall(Duration, Generation),
}

/// Provider that replays a script, then repeats a fallback reply.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Step>>,
    fallback: Generation,
    native_tools: bool,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: Generation::text("(script exhausted)"),
            native_tools: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replies(replies: Vec<Generation>) -> Self {
        Self::new(replies.into_iter().map(Step::Reply).collect())
    }

    /// Always answer with `reply`.
    pub fn repeating(reply: Generation) -> Self {
        let mut provider = Self::new(Vec::new());
        provider.fallback = reply;
        provider
    }

    pub fn with_native_tools(mut self) -> Self {
        self.native_tools = true;
        self
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted"
    }

    fn supports_tools(&self) -> bool {
        self.native_tools
    }

    async fn generate(&self, request: GenerationRequest) -> LlmResult<Generation> {
        self.requests.lock().unwrap().push(request);
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(generation)) => Ok(generation),
            Some(Step::Fail(error)) => Err(error),
            Some(Step::Stall(delay, generation)) => {
                tokio::time::sleep(delay).await;
                Ok(generation)
            }
            None => Ok(self.fallback.clone()),
        }
    }
}

type Handler = dyn Fn(&ValidatedToolCall) -> AppResult<ToolInvocationResult> + Send + Sync;

/// In-process tool worker recording every call it receives.
pub struct MockInvoker {
    handler: Box<Handler>,
    calls: Mutex<Vec<(String, Value)>>,
    shutdowns: AtomicUsize,
}

impl MockInvoker {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&ValidatedToolCall) -> AppResult<ToolInvocationResult> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
            shutdowns: AtomicUsize::new(0),
        }
    }

    /// Every call returns `payload` as a structured item.
    pub fn returning(payload: Value) -> Self {
        Self::new(move |_| Ok(ToolInvocationResult::structured(payload.clone())))
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolInvoker for MockInvoker {
    async fn invoke(&self, call: &ValidatedToolCall) -> AppResult<ToolInvocationResult> {
        self.calls
            .lock()
            .unwrap()
            .push((call.name().to_string(), call.arguments_value()));
        (self.handler)(call)
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn catalog() -> Arc<ToolCatalog> {
    Arc::new(
        ToolCatalog::from_definitions(vec![
            ToolDefinition::new(
                SEARCH_TOOL,
                "Full-text search over the rules database",
                json!({
                    "type": "object",
                    "properties": {"query": {"type": "string"}, "section": {"type": "string"}},
                    "required": ["query"]
                }),
            ),
            ToolDefinition::new(
                DETAIL_TOOL,
                "Fetch one rules entry",
                json!({
                    "type": "object",
                    "properties": {"category": {"type": "string"}, "aon_id": {"type": "integer"}}
                }),
            ),
        ])
        .unwrap(),
    )
}

pub fn loop_config(max_hops: u32) -> LoopConfig {
    LoopConfigBuilder::new()
        .max_hops(max_hops)
        .hop_timeout(Duration::from_secs(5))
        .search_tool(SEARCH_TOOL)
        .detail_tool(DETAIL_TOOL)
        .build()
        .unwrap()
}

pub fn agent_with(
    provider: Arc<ScriptedProvider>,
    invoker: Arc<MockInvoker>,
    config: LoopConfig,
) -> AgentLoop {
    let catalog = catalog();
    let log = seed_log("You are a test scribe.", &catalog, &[], "primer").unwrap();
    AgentLoop::new(
        log,
        catalog,
        provider,
        invoker,
        config,
        SamplingParams::default(),
    )
}

pub fn agent(provider: Arc<ScriptedProvider>, invoker: Arc<MockInvoker>, max_hops: u32) -> AgentLoop {
    agent_with(provider, invoker, loop_config(max_hops))
}

/// Generated text carrying a fenced tool-call envelope.
pub fn fenced_call(name: &str, arguments: Value) -> Generation {
    Generation::text(format!(
        "```json\n{}\n```",
        json!({"tool_call": {"name": name, "arguments": arguments}})
    ))
}

pub fn empty_search(query: &str) -> Value {
    json!({"query": query, "section": null, "results": []})
}

pub fn messages_with_role(messages: &[Message], role: Role) -> Vec<&Message> {
    messages.iter().filter(|m| m.role == role).collect()
}

/// No two tool results may be adjacent.
pub fn assert_no_adjacent_tool_results(messages: &[Message]) {
    for pair in messages.windows(2) {
        assert!(
            !(pair[0].role == Role::Tool && pair[1].role == Role::Tool),
            "adjacent tool results: {:?}",
            pair
        );
    }
}
