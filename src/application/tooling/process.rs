use super::error::ToolInvokeError;
use super::interface::ToolProvider;
use crate::config::ServerConfig;
use crate::types::{ProviderResult, TextBlock, ToolDescriptor};
use async_trait::async_trait;
use serde_json::{Map as JsonMap, Value, json};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tracing::{Instrument, Span, debug, info, info_span, warn};

const PROTOCOL_VERSION: &str = "2025-06-18";

/// An MCP server running as a child process, spoken to over stdio with
/// newline-delimited JSON-RPC.
///
/// The child is spawned with `kill_on_drop`, so dropping the last handle
/// releases the process even when `disconnect` never ran.
#[derive(Clone)]
pub struct McpProcess {
    inner: Arc<McpProcessInner>,
}

struct McpProcessInner {
    server: ServerConfig,
    span: Span,
    state: AsyncMutex<Option<RunningState>>,
    writer: AsyncMutex<Option<BufWriter<ChildStdin>>>,
    pending: AsyncMutex<HashMap<String, oneshot::Sender<Result<Value, ToolInvokeError>>>>,
    id_counter: AtomicU64,
    /// Bumped on every spawn; a reader only resets the connection it was started for.
    generation: AtomicU64,
    instructions: AsyncMutex<Option<String>>,
}

struct RunningState {
    child: Child,
}

impl McpProcess {
    pub fn new(server: ServerConfig) -> Self {
        let span = info_span!("mcp", server = %server.name);
        Self::with_span(server, span)
    }

    /// Creates the process handle logging under the given span.
    pub fn with_span(server: ServerConfig, span: Span) -> Self {
        Self {
            inner: Arc::new(McpProcessInner {
                server,
                span,
                state: AsyncMutex::new(None),
                writer: AsyncMutex::new(None),
                pending: AsyncMutex::new(HashMap::new()),
                id_counter: AtomicU64::new(1),
                generation: AtomicU64::new(0),
                instructions: AsyncMutex::new(None),
            }),
        }
    }

    /// Instructions the server returned from `initialize`, if any.
    pub async fn instructions(&self) -> Option<String> {
        self.inner.instructions.lock().await.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.state.lock().await.is_some()
    }
}

#[async_trait]
impl ToolProvider for McpProcess {
    async fn connect(&self) -> Result<(), ToolInvokeError> {
        let span = self.inner.span.clone();
        self.inner.ensure_running().instrument(span).await
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolInvokeError> {
        let span = self.inner.span.clone();
        async {
            self.inner.require_connected().await?;
            debug!("Requesting available tools from MCP server");
            let mut tools = Vec::new();
            let mut cursor: Option<String> = None;
            loop {
                let params = match &cursor {
                    Some(cursor) => json!({ "cursor": cursor }),
                    None => json!({}),
                };
                let result = self.inner.send_request("tools/list", params).await?;
                tools.extend(parse_tool_descriptors(&result));
                let next = result
                    .get("nextCursor")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                match next {
                    Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
                    _ => break,
                }
            }
            debug!(count = tools.len(), "Received tools from MCP server");
            Ok(tools)
        }
        .instrument(span)
        .await
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: JsonMap<String, Value>,
    ) -> Result<ProviderResult, ToolInvokeError> {
        let span = self.inner.span.clone();
        async {
            self.inner.require_connected().await?;
            debug!(tool = name, "Calling MCP tool");
            let params = json!({
                "name": name,
                "arguments": Value::Object(arguments),
            });
            let result = self.inner.send_request("tools/call", params).await?;
            if result.get("isError").and_then(Value::as_bool) == Some(true) {
                warn!(tool = name, "MCP server reported a tool-level error");
            }
            Ok(classify_tool_result(result))
        }
        .instrument(span)
        .await
    }

    async fn disconnect(&self) {
        let span = self.inner.span.clone();
        async {
            self.inner.reset().await;
            info!("Disconnected from MCP server");
        }
        .instrument(span)
        .await
    }
}

impl McpProcessInner {
    async fn ensure_running(self: &Arc<Self>) -> Result<(), ToolInvokeError> {
        {
            let state = self.state.lock().await;
            if state.is_some() {
                return Ok(());
            }
        }

        debug!(command = %self.server.command.display(), "Spawning MCP server");
        let mut command = Command::new(&self.server.command);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &self.server.workdir {
            command.current_dir(dir);
        }
        if !self.server.args.is_empty() {
            command.args(&self.server.args);
        }
        for (key, value) in &self.server.env {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|source| ToolInvokeError::Spawn {
            server: self.server.name.clone(),
            source,
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| self.transport_error("failed to capture server stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| self.transport_error("failed to capture server stdout"))?;

        {
            let mut writer = self.writer.lock().await;
            *writer = Some(BufWriter::new(stdin));
        }

        {
            let mut state = self.state.lock().await;
            *state = Some(RunningState { child });
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let reader = Arc::downgrade(self);
        let span = self.span.clone();
        tokio::spawn(reader_loop(reader, stdout, generation).instrument(span));

        match self.initialize_sequence().await {
            Ok(_) => {
                info!("Connected to MCP server");
                Ok(())
            }
            Err(err) => {
                self.reset().await;
                Err(err)
            }
        }
    }

    async fn initialize_sequence(&self) -> Result<(), ToolInvokeError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
            "capabilities": {}
        });
        let init_result = self.send_request("initialize", params).await?;
        if let Some(text) = init_result.get("instructions").and_then(Value::as_str) {
            let mut instructions = self.instructions.lock().await;
            *instructions = Some(text.to_string());
        }
        self.send_notification("notifications/initialized", json!({}))
            .await
    }

    async fn require_connected(&self) -> Result<(), ToolInvokeError> {
        if self.state.lock().await.is_some() {
            Ok(())
        } else {
            Err(ToolInvokeError::NotConnected {
                server: self.server.name.clone(),
            })
        }
    }

    async fn process_inbound_message(&self, value: Value) -> Result<(), ToolInvokeError> {
        if let Some(id) = value.get("id").cloned() {
            if value.get("method").is_some() {
                self.handle_server_request(id, value).await
            } else {
                self.handle_response(id, value).await;
                Ok(())
            }
        } else {
            if let Some(method) = value.get("method").and_then(Value::as_str) {
                debug!(method, "received notification from server");
            }
            Ok(())
        }
    }

    async fn handle_response(&self, id: Value, value: Value) {
        let Some(key) = response_key(&id) else {
            return;
        };

        let responder = {
            let mut pending = self.pending.lock().await;
            pending.remove(&key)
        };

        let Some(sender) = responder else {
            debug!(response_id = key, "received response for unknown request");
            return;
        };

        let outcome = match value.get("error") {
            Some(error) => {
                let code = error.get("code").and_then(Value::as_i64).unwrap_or(-32000);
                let message = error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string();
                Err(ToolInvokeError::Rpc {
                    server: self.server.name.clone(),
                    code,
                    message,
                })
            }
            None => Ok(value.get("result").cloned().unwrap_or(Value::Null)),
        };
        let _ = sender.send(outcome);
    }

    async fn handle_server_request(&self, id: Value, value: Value) -> Result<(), ToolInvokeError> {
        let method = value
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default();
        match method {
            "ping" => self.send_response(id, json!({})).await,
            other => {
                warn!(method = other, "server sent unsupported request");
                let error = json!({
                    "code": -32601,
                    "message": format!("client does not implement method '{other}'"),
                });
                self.send_error(id, error).await
            }
        }
    }

    async fn send_request(&self, method: &str, params: Value) -> Result<Value, ToolInvokeError> {
        let id = self.next_id();
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(id.clone(), tx);
        }

        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });
        if let Err(err) = self.write_message(&payload).await {
            self.pending.lock().await.remove(&id);
            return Err(err);
        }

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ToolInvokeError::Cancelled {
                server: self.server.name.clone(),
            }),
        }
    }

    async fn send_notification(&self, method: &str, params: Value) -> Result<(), ToolInvokeError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params
        });
        self.write_message(&payload).await
    }

    async fn send_response(&self, id: Value, result: Value) -> Result<(), ToolInvokeError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": result
        });
        self.write_message(&payload).await
    }

    async fn send_error(&self, id: Value, error: Value) -> Result<(), ToolInvokeError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": error
        });
        self.write_message(&payload).await
    }

    async fn write_message(&self, message: &Value) -> Result<(), ToolInvokeError> {
        let mut encoded =
            serde_json::to_vec(message).map_err(|source| ToolInvokeError::InvalidJson {
                server: self.server.name.clone(),
                source,
            })?;
        encoded.push(b'\n');

        let mut writer = self.writer.lock().await;
        let stream = writer
            .as_mut()
            .ok_or_else(|| ToolInvokeError::NotConnected {
                server: self.server.name.clone(),
            })?;
        stream
            .write_all(&encoded)
            .await
            .map_err(|source| self.transport_error(source.to_string()))?;
        stream
            .flush()
            .await
            .map_err(|source| self.transport_error(source.to_string()))?;
        Ok(())
    }

    async fn reset(&self) {
        {
            let mut writer = self.writer.lock().await;
            *writer = None;
        }

        let mut state = self.state.lock().await;
        if let Some(mut running) = state.take() {
            if let Err(err) = running.child.kill().await {
                debug!(%err, "failed to kill MCP server process (may have already exited)");
            }
            let _ = running.child.wait().await;
        }
        drop(state);

        self.fail_all_pending().await;
        self.instructions.lock().await.take();
    }

    async fn fail_all_pending(&self) {
        let mut pending = self.pending.lock().await;
        for (_, sender) in pending.drain() {
            let _ = sender.send(Err(ToolInvokeError::Terminated {
                server: self.server.name.clone(),
            }));
        }
    }

    fn next_id(&self) -> String {
        let id = self.id_counter.fetch_add(1, Ordering::SeqCst);
        format!("req-{id}")
    }

    fn transport_error(&self, message: impl Into<String>) -> ToolInvokeError {
        ToolInvokeError::Transport {
            server: self.server.name.clone(),
            message: message.into(),
        }
    }
}

/// Reads server output until EOF. Holds only a weak handle between lines so
/// dropping the last `McpProcess` still drops (and kills) the child.
async fn reader_loop(inner: Weak<McpProcessInner>, stdout: ChildStdout, generation: u64) {
    let mut lines = BufReader::new(stdout).lines();
    while let Ok(Some(raw)) = lines.next_line().await {
        if raw.trim().is_empty() {
            continue;
        }
        let Some(inner) = inner.upgrade() else {
            return;
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => {
                if let Err(err) = inner.process_inbound_message(value).await {
                    warn!(%err, "failed to process message from MCP server");
                }
            }
            Err(source) => {
                warn!(line = raw, %source, "received invalid JSON from MCP server");
            }
        }
    }

    if let Some(inner) = inner.upgrade() {
        if inner.generation.load(Ordering::SeqCst) == generation {
            debug!("MCP server closed its output");
            inner.reset().await;
        } else {
            debug!(generation, "Output of a replaced MCP server closed");
        }
    }
}

fn response_key(id: &Value) -> Option<String> {
    match id {
        Value::String(value) => Some(value.clone()),
        Value::Number(num) => Some(num.to_string()),
        _ => None,
    }
}

/// Reads the `tools` array of a `tools/list` result.
pub(crate) fn parse_tool_descriptors(result: &Value) -> Vec<ToolDescriptor> {
    let Some(array) = result.get("tools").and_then(Value::as_array) else {
        return Vec::new();
    };
    array
        .iter()
        .map(|tool| ToolDescriptor {
            name: tool.get("name").and_then(Value::as_str).map(str::to_string),
            description: tool
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
            input_schema: tool.get("inputSchema").filter(|schema| !schema.is_null()).cloned(),
        })
        .collect()
}

/// Classifies a `tools/call` result so callers never probe its shape.
pub(crate) fn classify_tool_result(result: Value) -> ProviderResult {
    match result {
        Value::String(text) => ProviderResult::PlainText(text),
        Value::Object(map) => match map.get("content").and_then(Value::as_array) {
            Some(blocks) => ProviderResult::StructuredBlocks(
                blocks
                    .iter()
                    .filter_map(|block| block.get("text").and_then(Value::as_str))
                    .map(|text| TextBlock {
                        text: text.to_string(),
                    })
                    .collect(),
            ),
            None => ProviderResult::Opaque(Value::Object(map).to_string()),
        },
        other => ProviderResult::Opaque(other.to_string()),
    }
}
