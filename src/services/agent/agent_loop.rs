//! Agent Loop
//!
//! Drives one user turn to completion. Each hop generates once, classifies
//! the output and then does exactly one of:
//!
//! - finalize: no tool-call envelope, the text is the answer
//! - retry: an envelope that fails to parse even after repair
//! - nudge: the same call as the previous hop
//! - dispatch: run the call and feed the compacted result back
//!
//! The hop bound always ends the turn with the loop-guard message, and no
//! failure inside a hop escapes `handle_turn`.

use std::sync::Arc;
use std::time::Instant;

use scribe_core::{
    ConversationLog, LoopConfig, Role, ToolCallRecord, ToolCatalog, ToolDefinition,
};
use scribe_llm::{Generation, GenerationRequest, LlmError, LlmProvider, SamplingParams};
use scribe_tools::prompt::{
    duplicate_nudge, GENERATION_FAILURE_MESSAGE, LOOP_GUARD_MESSAGE, NO_CONTENT, RETRY_INSTRUCTION,
};
use scribe_tools::{
    error_payload, extract_candidate, parse_tool_call, truncate_chars, CompactionPolicy,
    DuplicateCallGuard, ParsedToolCall, ToolCallSignature,
};

use crate::services::tools::ToolInvoker;
use crate::utils::error::AppError;

const PREVIEW_CHARS: usize = 250;

/// What a single generation produced, once classified.
#[derive(Debug, Clone, PartialEq)]
enum Classification {
    /// Plain answer text
    Final(String),
    /// Envelope present but unparseable, or a native call with bad arguments
    Malformed,
    /// A structurally valid call plus the assistant text that carried it
    Call {
        call: ParsedToolCall,
        envelope: String,
        /// Set for native calls that came with a backend id
        call_id: Option<String>,
    },
}

fn classify(generation: Generation) -> Classification {
    match generation {
        Generation::Text(text) => {
            let parsed = extract_candidate(&text).map(|candidate| {
                tracing::info!(
                    form = candidate.form.as_str(),
                    raw_len = candidate.raw.len(),
                    raw = truncate_chars(candidate.raw, PREVIEW_CHARS),
                    "Detected tool_call envelope"
                );
                parse_tool_call(candidate.raw)
            });
            match parsed {
                None => Classification::Final(text),
                Some(Some(call)) => Classification::Call {
                    call,
                    envelope: text,
                    call_id: None,
                },
                Some(None) => Classification::Malformed,
            }
        }
        Generation::ToolCall {
            id,
            name,
            arguments,
        } => match ParsedToolCall::from_native(&name, &arguments) {
            Some(call) => {
                let envelope = call.to_envelope();
                Classification::Call {
                    call,
                    envelope,
                    call_id: id,
                }
            }
            None => {
                tracing::warn!(tool = %name, arguments = %arguments, "Native tool call with unusable arguments");
                Classification::Malformed
            }
        },
    }
}

/// Outcome of the generation step of a hop.
enum HopGeneration {
    Done(Generation),
    TimedOut,
    Failed(LlmError),
}

/// Per-conversation orchestrator.
///
/// Owns the conversation log and the duplicate-call guard; shares the tool
/// catalog, the provider and the invoker.
pub struct AgentLoop {
    log: ConversationLog,
    guard: DuplicateCallGuard,
    catalog: Arc<ToolCatalog>,
    native_tools: Vec<ToolDefinition>,
    provider: Arc<dyn LlmProvider>,
    invoker: Arc<dyn ToolInvoker>,
    config: LoopConfig,
    policy: CompactionPolicy,
    sampling: SamplingParams,
}

impl AgentLoop {
    pub fn new(
        log: ConversationLog,
        catalog: Arc<ToolCatalog>,
        provider: Arc<dyn LlmProvider>,
        invoker: Arc<dyn ToolInvoker>,
        config: LoopConfig,
        sampling: SamplingParams,
    ) -> Self {
        let native_tools = if provider.supports_tools() {
            catalog.iter().cloned().collect()
        } else {
            Vec::new()
        };
        Self {
            log,
            guard: DuplicateCallGuard::new(),
            native_tools,
            policy: CompactionPolicy::from(&config),
            catalog,
            provider,
            invoker,
            config,
            sampling,
        }
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Release the tool worker behind this loop.
    pub async fn shutdown(&self) {
        self.invoker.shutdown().await;
    }

    /// Answer one user message.
    ///
    /// Always returns text: the model's answer, the loop-guard message, or a
    /// fixed apology when generation fails.
    pub async fn handle_turn(&mut self, user_text: &str) -> String {
        self.push(Role::User, user_text);
        self.guard.clear();

        let turn_started = Instant::now();
        let max_hops = self.config.max_hops;
        tracing::debug!(chars = user_text.len(), messages = self.log.len(), "Turn started");

        for hop in 1..=max_hops {
            tracing::debug!(hop, max_hops, "Tool hop");

            let generation = match self.generate(hop).await {
                HopGeneration::Done(generation) => generation,
                HopGeneration::TimedOut => {
                    tracing::warn!(
                        hop,
                        timeout_secs = self.config.hop_timeout.as_secs(),
                        "Generation timed out; asking for a retry"
                    );
                    self.push(Role::System, RETRY_INSTRUCTION);
                    continue;
                }
                HopGeneration::Failed(e) => {
                    tracing::error!(hop, error = %e, "Generation failed; ending turn");
                    self.push(Role::Assistant, GENERATION_FAILURE_MESSAGE);
                    return GENERATION_FAILURE_MESSAGE.to_string();
                }
            };

            match classify(generation) {
                Classification::Final(text) => {
                    let answer = if text.trim().is_empty() {
                        NO_CONTENT.to_string()
                    } else {
                        text
                    };
                    self.push(Role::Assistant, answer.clone());
                    tracing::info!(
                        hops = hop,
                        chars = answer.len(),
                        elapsed_ms = turn_started.elapsed().as_millis() as u64,
                        "Turn finalized"
                    );
                    return answer;
                }
                Classification::Malformed => {
                    tracing::warn!(hop, "Malformed tool_call after repair; asking for a retry");
                    self.push(Role::System, RETRY_INSTRUCTION);
                }
                Classification::Call {
                    call,
                    envelope,
                    call_id,
                } => {
                    let signature = ToolCallSignature::new(&call.name, &call.arguments);
                    if self.guard.observe(signature.clone()) {
                        tracing::info!(hop, signature = %signature, "Same tool call repeated; nudging to finalize");
                        self.push(
                            Role::System,
                            duplicate_nudge(self.config.detail_tool.as_deref()),
                        );
                        continue;
                    }
                    self.dispatch(call, envelope, call_id).await;
                }
            }
        }

        tracing::warn!(max_hops, "Tool-call loop guard triggered");
        self.push(Role::Assistant, LOOP_GUARD_MESSAGE);
        LOOP_GUARD_MESSAGE.to_string()
    }

    async fn generate(&self, hop: u32) -> HopGeneration {
        let request = GenerationRequest::new(self.log.snapshot(), self.sampling)
            .with_tools(self.native_tools.clone());
        let last = self.log.last();
        tracing::debug!(
            hop,
            messages = request.messages.len(),
            last_role = last.map(|m| m.role.as_str()).unwrap_or("-"),
            last_len = last.map(|m| m.content.len()).unwrap_or(0),
            "Generation call"
        );

        let started = Instant::now();
        let outcome =
            match tokio::time::timeout(self.config.hop_timeout, self.provider.generate(request))
                .await
            {
                Ok(Ok(generation)) => HopGeneration::Done(generation),
                Ok(Err(e)) => HopGeneration::Failed(e),
                Err(_) => HopGeneration::TimedOut,
            };
        if let HopGeneration::Done(generation) = &outcome {
            let chars = match generation {
                Generation::Text(text) => text.len(),
                Generation::ToolCall { .. } => 0,
            };
            tracing::debug!(
                hop,
                native_call = generation.is_tool_call(),
                chars,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Generation completed"
            );
        }
        outcome
    }

    /// Run one call and append its result.
    ///
    /// The assistant envelope goes in first so a tool result never directly
    /// follows another one. Native calls keep their id on both messages.
    /// Failures become an error payload.
    async fn dispatch(&mut self, call: ParsedToolCall, envelope: String, call_id: Option<String>) {
        let call_id = call_id.filter(|id| !id.is_empty());
        match &call_id {
            Some(id) => {
                let record = ToolCallRecord {
                    id: id.clone(),
                    name: call.name.clone(),
                    arguments: serde_json::Value::Object(call.arguments.clone()),
                };
                if let Err(e) = self.log.append_tool_call(envelope, record) {
                    tracing::error!(tool = %call.name, error = %e, "Could not append tool call");
                }
            }
            None => self.push(Role::Assistant, envelope),
        }

        let ParsedToolCall { name, arguments } = call;
        let payload = match self.catalog.resolve(&name, arguments) {
            Ok(validated) => {
                let started = Instant::now();
                match self.invoker.invoke(&validated).await {
                    Ok(result) => {
                        tracing::info!(
                            tool = %name,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "Tool dispatched"
                        );
                        result.payload()
                    }
                    Err(e) => {
                        tracing::warn!(tool = %name, error = %e, "Tool call failed");
                        let cause = match e {
                            AppError::ToolExecution { cause, .. } => cause,
                            other => other.to_string(),
                        };
                        error_payload(&name, &cause)
                    }
                }
            }
            Err(e) => {
                tracing::warn!(tool = %name, error = %e, "Rejected call to unknown tool");
                error_payload(&name, &e.to_string())
            }
        };

        let content = self.policy.render_tool_message(&name, &payload);
        tracing::debug!(tool = %name, chars = content.len(), "Appending tool result");
        let appended = match &call_id {
            Some(id) => self.log.append_native_tool_result(id, name.as_str(), content),
            None => self.log.append_tool_result(name.as_str(), content),
        };
        if let Err(e) = appended {
            tracing::error!(tool = %name, error = %e, "Could not append tool result");
        }
    }

    fn push(&mut self, role: Role, content: impl Into<String>) {
        if let Err(e) = self.log.append(role, content) {
            tracing::error!(role = %role, error = %e, "Could not append message");
        }
    }
}
