//! MCP Stdio Bridge
//!
//! Owns one tool-worker subprocess speaking newline-delimited JSON-RPC 2.0
//! (MCP) over stdio:
//!
//! 1. `start()` spawns the worker and performs the handshake
//!    (`initialize`, then `notifications/initialized`)
//! 2. `await_ready()` lets other tasks wait for the handshake to finish
//! 3. `list_tools()` / `call()` issue `tools/list` / `tools/call`
//! 4. `close()` tears the worker down; repeated calls are no-ops
//!
//! Requests are serialized by the transport mutex: one call is in flight
//! at a time and a second caller waits for the first response.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{watch, Mutex};

use scribe_core::{ToolCatalog, ToolDefinition, ValidatedToolCall};

use super::mcp_types::{
    JsonRpcFrame, JsonRpcRequest, McpServerInfo, ToolInvocationResult, PROTOCOL_VERSION,
};
use super::ToolInvoker;
use crate::models::settings::AppConfig;
use crate::utils::error::{AppError, AppResult};

/// How to launch the tool worker.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// Worker name (for logs)
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    /// Added on top of the inherited environment
    pub env: BTreeMap<String, String>,
    /// Deadline for a single response frame
    pub request_timeout: Duration,
}

impl BridgeConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            name: config.tool_worker.name.clone(),
            command: config.tool_worker.command.clone(),
            args: config.tool_worker.args.clone(),
            env: config.worker_env(),
            request_timeout: config.tool_worker.request_timeout(),
        }
    }
}

/// Lifecycle of the worker session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeState {
    Unstarted,
    Starting,
    Ready,
    Closed,
    Failed(String),
}

impl BridgeState {
    fn is_settled(&self) -> bool {
        matches!(
            self,
            BridgeState::Ready | BridgeState::Closed | BridgeState::Failed(_)
        )
    }
}

/// Internal transport state for the stdio connection
struct StdioTransport {
    process: Child,
    stdin: ChildStdin,
    stdout_reader: BufReader<ChildStdout>,
}

/// Client side of a single MCP tool worker.
pub struct ToolBridge {
    config: BridgeConfig,
    state: watch::Sender<BridgeState>,
    transport: Mutex<Option<StdioTransport>>,
    request_id: AtomicU64,
    server_info: OnceLock<McpServerInfo>,
    catalog: OnceLock<Arc<ToolCatalog>>,
}

impl ToolBridge {
    pub fn new(config: BridgeConfig) -> Self {
        let (state, _) = watch::channel(BridgeState::Unstarted);
        Self {
            config,
            state,
            transport: Mutex::new(None),
            request_id: AtomicU64::new(1),
            server_info: OnceLock::new(),
            catalog: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn state(&self) -> BridgeState {
        self.state.borrow().clone()
    }

    /// Server metadata from the handshake, once started.
    pub fn server_info(&self) -> Option<&McpServerInfo> {
        self.server_info.get()
    }

    /// Spawn the worker and perform the handshake.
    ///
    /// Must be called once. Any failure leaves the bridge `Failed`, which is
    /// fatal for the session.
    pub async fn start(&self) -> AppResult<()> {
        let mut claimed = false;
        self.state.send_if_modified(|state| {
            if *state == BridgeState::Unstarted {
                *state = BridgeState::Starting;
                claimed = true;
            }
            claimed
        });
        if !claimed {
            return match self.state() {
                BridgeState::Closed => Err(AppError::BridgeClosed),
                other => Err(AppError::bridge_start(format!(
                    "worker '{}' already started (state: {:?})",
                    self.config.name, other
                ))),
            };
        }

        let started = Instant::now();
        tracing::info!(
            worker = %self.config.name,
            command = %self.config.command,
            args = ?self.config.args,
            "Starting tool worker"
        );

        match self.spawn_and_handshake().await {
            Ok((transport, info)) => {
                let mut guard = self.transport.lock().await;
                if *self.state.borrow() != BridgeState::Starting {
                    // close() ran while the handshake was in flight
                    drop(guard);
                    Self::shutdown_transport(transport).await;
                    return Err(AppError::BridgeClosed);
                }
                *guard = Some(transport);
                drop(guard);

                tracing::info!(
                    worker = %self.config.name,
                    protocol = %info.protocol_version,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Tool worker ready"
                );
                let _ = self.server_info.set(info);
                self.state.send_replace(BridgeState::Ready);
                Ok(())
            }
            Err(e) => {
                tracing::error!(worker = %self.config.name, error = %e, "Tool worker failed to start");
                let reason = match &e {
                    AppError::BridgeStart(reason) => reason.clone(),
                    other => other.to_string(),
                };
                self.state.send_replace(BridgeState::Failed(reason));
                Err(e)
            }
        }
    }

    /// Wait until `start()` has finished.
    ///
    /// Returns immediately once the bridge is ready; reports the start
    /// failure or closure otherwise.
    pub async fn await_ready(&self) -> AppResult<()> {
        let mut rx = self.state.subscribe();
        let settled = rx
            .wait_for(BridgeState::is_settled)
            .await
            .map_err(|_| AppError::BridgeClosed)?
            .clone();
        match settled {
            BridgeState::Ready => Ok(()),
            BridgeState::Failed(reason) => Err(AppError::bridge_start(reason)),
            _ => Err(AppError::BridgeClosed),
        }
    }

    async fn spawn_and_handshake(&self) -> AppResult<(StdioTransport, McpServerInfo)> {
        let name = &self.config.name;
        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args)
            .envs(&self.config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut process = cmd.spawn().map_err(|e| {
            AppError::bridge_start(format!(
                "failed to spawn worker '{}' (command: {}): {}",
                name, self.config.command, e
            ))
        })?;

        let stdin = process.stdin.take().ok_or_else(|| {
            AppError::bridge_start(format!("failed to capture stdin for worker '{}'", name))
        })?;
        let stdout = process.stdout.take().ok_or_else(|| {
            AppError::bridge_start(format!("failed to capture stdout for worker '{}'", name))
        })?;

        // Drain stderr so a chatty worker never blocks on a full pipe
        if let Some(stderr) = process.stderr.take() {
            let worker = name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(worker = %worker, "{}", line);
                }
            });
        }

        let mut transport = StdioTransport {
            process,
            stdin,
            stdout_reader: BufReader::new(stdout),
        };

        match self.handshake(&mut transport).await {
            Ok(info) => Ok((transport, info)),
            Err(e) => {
                Self::shutdown_transport(transport).await;
                Err(e)
            }
        }
    }

    async fn handshake(&self, transport: &mut StdioTransport) -> AppResult<McpServerInfo> {
        let name = &self.config.name;
        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION")
            }
        });

        let frame = self
            .roundtrip(transport, "initialize", Some(params))
            .await
            .map_err(|e| AppError::bridge_start(format!("worker '{}' initialize: {}", name, e)))?;

        let result = match (frame.result, frame.error) {
            (_, Some(err)) => {
                return Err(AppError::bridge_start(format!(
                    "worker '{}' rejected initialize: {}",
                    name, err
                )))
            }
            (Some(result), None) => result,
            (None, None) => {
                return Err(AppError::bridge_start(format!(
                    "worker '{}' sent no initialize result",
                    name
                )))
            }
        };

        let notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized",
            "params": {}
        });
        Self::write_line(&mut transport.stdin, &notification.to_string())
            .await
            .map_err(|e| AppError::bridge_start(format!("worker '{}': {}", name, e)))?;

        Ok(McpServerInfo {
            name: name.clone(),
            protocol_version: result
                .get("protocolVersion")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            capabilities: result
                .get("capabilities")
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new())),
            server_info: result
                .get("serverInfo")
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new())),
        })
    }

    /// Send one request and read frames until its response arrives.
    ///
    /// Frames for other ids (late answers to timed-out requests), worker
    /// notifications and non-JSON lines are skipped.
    async fn roundtrip(
        &self,
        transport: &mut StdioTransport,
        method: &str,
        params: Option<Value>,
    ) -> Result<JsonRpcFrame, String> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(id, method, params);
        let msg = serde_json::to_string(&request)
            .map_err(|e| format!("failed to serialize request: {}", e))?;
        Self::write_line(&mut transport.stdin, &msg).await?;

        let deadline = tokio::time::Instant::now() + self.config.request_timeout;
        let mut line = String::new();
        loop {
            line.clear();
            let bytes_read =
                tokio::time::timeout_at(deadline, transport.stdout_reader.read_line(&mut line))
                    .await
                    .map_err(|_| {
                        format!(
                            "timed out after {}s waiting for '{}'",
                            self.config.request_timeout.as_secs(),
                            method
                        )
                    })?
                    .map_err(|e| format!("failed to read worker stdout: {}", e))?;

            if bytes_read == 0 {
                return Err("worker closed stdout (process may have exited)".to_string());
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<JsonRpcFrame>(trimmed) {
                Ok(frame) if frame.answers(id) => return Ok(frame),
                Ok(frame) => {
                    tracing::debug!(
                        worker = %self.config.name,
                        method = frame.method.as_deref().unwrap_or("-"),
                        "Skipping unrelated frame"
                    );
                }
                Err(_) => {
                    tracing::debug!(worker = %self.config.name, "Skipping non-JSON stdout line");
                }
            }
        }
    }

    async fn write_line(stdin: &mut ChildStdin, msg: &str) -> Result<(), String> {
        stdin
            .write_all(msg.as_bytes())
            .await
            .map_err(|e| format!("failed to write to worker stdin: {}", e))?;
        stdin
            .write_all(b"\n")
            .await
            .map_err(|e| format!("failed to write newline: {}", e))?;
        stdin
            .flush()
            .await
            .map_err(|e| format!("failed to flush stdin: {}", e))
    }

    /// Send a request on the live transport, holding the lock for the
    /// whole request/response exchange.
    async fn request(&self, method: &str, params: Option<Value>) -> AppResult<JsonRpcFrame> {
        let mut guard = self.transport.lock().await;
        let transport = match guard.as_mut() {
            Some(transport) => transport,
            None => {
                return Err(match self.state() {
                    BridgeState::Closed => AppError::BridgeClosed,
                    other => AppError::internal(format!(
                        "worker '{}' is not ready (state: {:?})",
                        self.config.name, other
                    )),
                })
            }
        };

        match self.roundtrip(transport, method, params).await {
            Ok(frame) => Ok(frame),
            Err(cause) => {
                if let Ok(Some(status)) = transport.process.try_wait() {
                    tracing::error!(worker = %self.config.name, %status, "Tool worker exited");
                    self.state
                        .send_replace(BridgeState::Failed(format!("worker exited: {}", status)));
                }
                Err(AppError::internal(cause))
            }
        }
    }

    /// Discover the worker's tools.
    ///
    /// The first successful listing is cached as the bridge's catalog.
    pub async fn list_tools(&self) -> AppResult<Vec<ToolDefinition>> {
        let started = Instant::now();
        let frame = self
            .request("tools/list", None)
            .await
            .map_err(|e| match e {
                AppError::BridgeClosed => e,
                other => AppError::bridge_protocol(format!("tools/list: {}", other)),
            })?;

        if let Some(err) = frame.error {
            return Err(AppError::bridge_protocol(format!("tools/list failed: {}", err)));
        }
        let result = frame
            .result
            .ok_or_else(|| AppError::bridge_protocol("tools/list returned no result"))?;
        let definitions = parse_tool_list(&result)?;

        let catalog = ToolCatalog::from_definitions(definitions.clone())
            .map_err(|e| AppError::bridge_protocol(format!("tools/list: {}", e)))?;
        let _ = self.catalog.set(Arc::new(catalog));

        tracing::info!(
            worker = %self.config.name,
            tools = ?definitions.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Listed tools"
        );
        Ok(definitions)
    }

    /// Catalog from the last successful `list_tools()`.
    pub fn catalog(&self) -> Option<Arc<ToolCatalog>> {
        self.catalog.get().cloned()
    }

    /// Invoke a tool by name, validating it against the discovered catalog.
    pub async fn call(&self, name: &str, arguments: Map<String, Value>) -> AppResult<ToolInvocationResult> {
        let catalog = self.catalog().ok_or_else(|| {
            AppError::tool_execution(name, "tools have not been listed yet")
        })?;
        let call = catalog
            .resolve(name, arguments)
            .map_err(|e| AppError::tool_execution(name, e.to_string()))?;
        self.call_validated(&call).await
    }

    /// Invoke an already validated tool call.
    ///
    /// Only a `Ready` bridge dispatches; any other state fails the call
    /// without touching the worker's pipes.
    pub async fn call_validated(&self, call: &ValidatedToolCall) -> AppResult<ToolInvocationResult> {
        let name = call.name();
        match self.state() {
            BridgeState::Ready => {}
            BridgeState::Closed => {
                return Err(AppError::tool_execution(name, AppError::BridgeClosed.to_string()))
            }
            other => {
                return Err(AppError::tool_execution(
                    name,
                    format!("worker '{}' is not ready (state: {:?})", self.config.name, other),
                ))
            }
        }
        let started = Instant::now();
        tracing::info!(worker = %self.config.name, tool = %name, args = %call.arguments_value(), "Calling tool");

        let params = serde_json::json!({
            "name": name,
            "arguments": call.arguments_value(),
        });
        let frame = self
            .request("tools/call", Some(params))
            .await
            .map_err(|e| AppError::tool_execution(name, e.to_string()))?;

        if let Some(err) = frame.error {
            return Err(AppError::tool_execution(name, err.to_string()));
        }
        let result = ToolInvocationResult::from_result(frame.result.unwrap_or(Value::Null));
        if result.is_error {
            return Err(AppError::tool_execution(name, result.text_summary()));
        }

        tracing::info!(
            tool = %name,
            items = result.content.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Tool completed"
        );
        Ok(result)
    }

    /// Tear down the session and terminate the worker. Idempotent.
    pub async fn close(&self) {
        let transport = self.transport.lock().await.take();
        let previous = self.state.send_replace(BridgeState::Closed);
        if let Some(transport) = transport {
            tracing::info!(worker = %self.config.name, "Shutting down tool worker");
            Self::shutdown_transport(transport).await;
        } else if previous != BridgeState::Closed {
            tracing::debug!(worker = %self.config.name, state = ?previous, "Bridge closed without a live worker");
        }
    }

    async fn shutdown_transport(mut transport: StdioTransport) {
        let _ = transport.stdin.shutdown().await;
        drop(transport.stdin);
        // Give the worker a moment to exit on EOF before killing it
        match tokio::time::timeout(Duration::from_millis(500), transport.process.wait()).await {
            Ok(_) => {}
            Err(_) => {
                let _ = transport.process.kill().await;
            }
        }
    }
}

impl Drop for ToolBridge {
    fn drop(&mut self) {
        if let Some(transport) = self.transport.get_mut().as_mut() {
            tracing::warn!(worker = %self.config.name, "Bridge dropped without close(); killing worker");
            let _ = transport.process.start_kill();
        }
    }
}

#[async_trait]
impl ToolInvoker for ToolBridge {
    async fn invoke(&self, call: &ValidatedToolCall) -> AppResult<ToolInvocationResult> {
        self.call_validated(call).await
    }

    async fn shutdown(&self) {
        self.close().await;
    }
}

/// Decode a `tools/list` result into tool definitions.
fn parse_tool_list(result: &Value) -> AppResult<Vec<ToolDefinition>> {
    let tools = result
        .get("tools")
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::bridge_protocol("tools/list result has no 'tools' array"))?;

    tools
        .iter()
        .map(|tool| -> AppResult<ToolDefinition> {
            let name = tool
                .get("name")
                .and_then(Value::as_str)
                .filter(|n| !n.trim().is_empty())
                .ok_or_else(|| AppError::bridge_protocol(format!("tool entry without a name: {}", tool)))?;
            let description = tool
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let schema = tool.get("inputSchema").cloned().unwrap_or(Value::Null);
            Ok(ToolDefinition::new(name, description, schema))
        })
        .collect()
}
