//! OpenAI-Compatible Provider
//!
//! Implementation of the LlmProvider trait for any server speaking the
//! OpenAI chat-completions dialect (llama.cpp server, vLLM, Ollama's `/v1`,
//! the hosted OpenAI API).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;

use super::provider::{parse_http_error, LlmProvider};
use super::types::{Generation, GenerationRequest, LlmError, LlmResult};
use crate::http_client::build_http_client;
use scribe_core::{Message, Role, ToolDefinition};

/// Default endpoint of a local llama.cpp server
pub const DEFAULT_CHAT_COMPLETIONS_URL: &str = "http://127.0.0.1:8080/v1/chat/completions";

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Whether to advertise tools for native selection
    pub native_tools: bool,
    pub request_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CHAT_COMPLETIONS_URL.to_string(),
            model: "local".to_string(),
            api_key: None,
            native_tools: true,
            request_timeout: Duration::from_secs(300),
        }
    }
}

/// OpenAI-compatible chat-completions provider
pub struct OpenAICompatProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl OpenAICompatProvider {
    /// Create a new provider with the given configuration
    pub fn new(config: ProviderConfig) -> LlmResult<Self> {
        let client = build_http_client(config.request_timeout)?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Build the request body for the API
    fn build_request_body(&self, request: &GenerationRequest) -> serde_json::Value {
        let messages: Vec<serde_json::Value> =
            request.messages.iter().map(message_to_openai).collect();

        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": request.sampling.temperature,
            "top_p": request.sampling.top_p,
            "max_tokens": request.sampling.max_tokens,
            "stream": false,
        });

        if self.config.native_tools && !request.tools.is_empty() {
            let tools: Vec<serde_json::Value> =
                request.tools.iter().map(ToolDefinition::to_native_schema).collect();
            body["tools"] = serde_json::json!(tools);
            body["tool_choice"] = serde_json::json!("auto");
        }

        body
    }

    /// Parse a response from the API
    fn parse_response(&self, response: OpenAIResponse) -> LlmResult<Generation> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ParseError {
                message: "response contained no choices".to_string(),
            })?;

        if let Some(msg) = choice.message {
            if let Some(tc) = msg.tool_calls.and_then(|calls| calls.into_iter().next()) {
                // Unparseable argument strings are passed through as a string so the
                // loop classifies them as a malformed call instead of failing the turn.
                let arguments = serde_json::from_str(&tc.function.arguments)
                    .unwrap_or(serde_json::Value::String(tc.function.arguments));
                return Ok(Generation::ToolCall {
                    id: tc.id.filter(|id| !id.is_empty()),
                    name: tc.function.name,
                    arguments,
                });
            }
            if let Some(content) = msg.content {
                return Ok(Generation::Text(content));
            }
        }

        Ok(Generation::Text(
            choice.text.map(|t| t.trim().to_string()).unwrap_or_default(),
        ))
    }
}

/// Convert a Message to OpenAI API format
fn message_to_openai(message: &Message) -> serde_json::Value {
    match message.role {
        Role::Assistant => {
            if let Some(call) = &message.tool_call {
                return serde_json::json!({
                    "role": "assistant",
                    "content": serde_json::Value::Null,
                    "tool_calls": [{
                        "id": call.id,
                        "type": "function",
                        "function": {
                            "name": call.name,
                            "arguments": call.arguments.to_string(),
                        }
                    }],
                });
            }
        }
        Role::Tool => {
            return match &message.tool_call_id {
                Some(id) => serde_json::json!({
                    "role": "tool",
                    "tool_call_id": id,
                    "content": message.content,
                }),
                // A tool message must answer a call id; text-envelope results go back as user text
                None => serde_json::json!({
                    "role": "user",
                    "content": format!(
                        "Tool result ({}):\n{}",
                        message.name.as_deref().unwrap_or("tool"),
                        message.content
                    ),
                }),
            };
        }
        Role::System | Role::User => {}
    }
    serde_json::json!({
        "role": message.role.as_str(),
        "content": message.content,
    })
}

#[async_trait]
impl LlmProvider for OpenAICompatProvider {
    fn name(&self) -> &'static str {
        "openai-compatible"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn supports_tools(&self) -> bool {
        self.config.native_tools
    }

    async fn generate(&self, request: GenerationRequest) -> LlmResult<Generation> {
        request.sampling.validate()?;
        let body = self.build_request_body(&request);

        tracing::debug!(
            messages = request.messages.len(),
            last_role = request.messages.last().map(|m| m.role.as_str()).unwrap_or("-"),
            tools = request.tools.len(),
            "LLM call"
        );
        let started = Instant::now();

        let mut builder = self
            .client
            .post(&self.config.base_url)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(api_key) = &self.config.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = builder.send().await.map_err(|e| LlmError::NetworkError {
            message: e.to_string(),
        })?;

        let status = response.status().as_u16();
        let body_text = response.text().await.map_err(|e| LlmError::NetworkError {
            message: e.to_string(),
        })?;

        if status != 200 {
            return Err(parse_http_error(status, &body_text, self.name()));
        }

        let parsed: OpenAIResponse =
            serde_json::from_str(&body_text).map_err(|e| LlmError::ParseError {
                message: format!("Failed to parse response: {}", e),
            })?;

        tracing::debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "LLM completed"
        );
        self.parse_response(parsed)
    }

    async fn health_check(&self) -> LlmResult<()> {
        let request = GenerationRequest::new(
            vec![Message::user("ping")],
            super::types::SamplingParams {
                max_tokens: 1,
                ..Default::default()
            },
        );
        self.generate(request).await.map(|_| ())
    }
}

/// OpenAI API response format
#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
    /// Legacy completion-style payloads
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    #[serde(default)]
    id: Option<String>,
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    arguments: String,
}
