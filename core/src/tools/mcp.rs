//! MCP (Model Context Protocol) subprocess binding
//!
//! Line-delimited JSON-RPC 2.0 over a child's stdio. A reader task routes each
//! response to the request that is waiting for it, so calls may overlap.

use super::base::{ToolDescriptor, ToolExecutor};
use crate::config::{ExecutorBinding, ResolvedExecutorConfig};
use crate::conversation::ToolOutcome;
use crate::error::{ConfigError, Result, ToolError};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

const PROTOCOL_VERSION: &str = "2024-11-05";

/// Upper bound on `tools/list` pages fetched during discovery
const MAX_LIST_PAGES: usize = 64;

type RpcReply = std::result::Result<Value, String>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A JSON-RPC channel over any byte stream pair
#[derive(Clone)]
pub struct McpChannel {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    name: String,
    writer: Mutex<Option<BoxedWriter>>,
    pending: Mutex<HashMap<u64, oneshot::Sender<RpcReply>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
    request_timeout: Duration,
}

impl McpChannel {
    /// Wrap a reader/writer pair and start routing responses
    pub fn new<R, W>(name: impl Into<String>, reader: R, writer: W, request_timeout: Duration) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let inner = Arc::new(ChannelInner {
            name: name.into(),
            writer: Mutex::new(Some(Box::new(writer))),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            request_timeout,
        });

        let reader_inner = Arc::clone(&inner);
        tokio::spawn(async move {
            reader_inner.reader_loop(reader).await;
        });

        Self { inner }
    }

    /// Send a request and wait for its result
    pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
        self.inner.request(method, params).await
    }

    /// Send a notification; no response is expected
    pub async fn notify(&self, method: &str, params: Value) -> Result<()> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        self.inner.write_message(&payload).await
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Drop the writer and fail every waiting request
    pub async fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        if let Some(mut writer) = self.inner.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        self.inner.pending.lock().await.clear();
    }
}

impl ChannelInner {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(self.transport_error("channel is closed"));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        if let Err(err) = self.write_message(&payload).await {
            self.pending.lock().await.remove(&id);
            return Err(err);
        }

        match timeout(self.request_timeout, rx).await {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(message))) => Err(ToolError::ExecutionFailed {
                name: method.to_string(),
                message,
            }
            .into()),
            Ok(Err(_)) => Err(self.transport_error("server closed the connection")),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(ToolError::Timeout {
                    name: method.to_string(),
                }
                .into())
            }
        }
    }

    async fn write_message(&self, payload: &Value) -> Result<()> {
        let mut line = serde_json::to_string(payload)?;
        line.push('\n');

        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| self.transport_error("channel is closed"))?;

        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| self.transport_error(&e.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|e| self.transport_error(&e.to_string()))?;
        Ok(())
    }

    async fn reader_loop<R: AsyncRead + Unpin>(self: Arc<Self>, reader: R) {
        let mut lines = BufReader::new(reader).lines();

        while let Ok(Some(raw)) = lines.next_line().await {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<Value>(trimmed) {
                Ok(message) => self.dispatch(message).await,
                Err(_) => {
                    debug!(server = %self.name, line = trimmed, "skipping non-JSON line");
                }
            }
        }

        debug!(server = %self.name, "MCP stream ended");
        self.closed.store(true, Ordering::SeqCst);
        self.pending.lock().await.clear();
    }

    async fn dispatch(&self, message: Value) {
        let method = message.get("method").and_then(Value::as_str);

        match (message.get("id"), method) {
            (Some(id), None) => {
                let Some(id) = id.as_u64() else {
                    debug!(server = %self.name, %id, "response with foreign id");
                    return;
                };

                let Some(sender) = self.pending.lock().await.remove(&id) else {
                    debug!(server = %self.name, id, "response for unknown request");
                    return;
                };

                let reply = match message.get("error") {
                    Some(error) => Err(error
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error")
                        .to_string()),
                    None => Ok(message.get("result").cloned().unwrap_or(Value::Null)),
                };
                let _ = sender.send(reply);
            }
            (Some(id), Some(method)) => {
                let response = if method == "ping" {
                    json!({"jsonrpc": "2.0", "id": id, "result": {}})
                } else {
                    warn!(server = %self.name, method, "unsupported server request");
                    json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "error": {"code": -32601, "message": format!("method '{}' not supported", method)},
                    })
                };
                if let Err(err) = self.write_message(&response).await {
                    warn!(server = %self.name, %err, "failed to answer server request");
                }
            }
            (None, Some(method)) => {
                debug!(server = %self.name, method, "notification from server");
            }
            (None, None) => {}
        }
    }

    fn transport_error(&self, message: &str) -> crate::error::Error {
        ToolError::Transport {
            message: format!("{}: {}", self.name, message),
        }
        .into()
    }
}

/// Tool executor backed by an MCP server subprocess
pub struct McpExecutor {
    channel: McpChannel,
    child: Mutex<Option<Child>>,
}

impl McpExecutor {
    /// Spawn the server described by `config` and complete the handshake
    pub async fn launch(config: &ResolvedExecutorConfig) -> Result<Self> {
        let ExecutorBinding::Subprocess { command, args } = &config.binding else {
            return Err(ConfigError::InvalidValue {
                field: "executor".to_string(),
                value: config.binding.name().to_string(),
            }
            .into());
        };

        let headers = json!({
            "API-Key": config.api_key,
            "Content-Type": "application/json",
        });

        let mut cmd = Command::new(command);
        cmd.args(args)
            .env("ENDPOINT", &config.endpoint)
            .env("HEADERS", headers.to_string())
            .env("ALLOW_MUTATIONS", config.allow_mutations.to_string())
            .env("NODE_OPTIONS", "--disable-warning=ExperimentalWarning")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| ToolError::Spawn {
            command: command.clone(),
            source,
        })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill().await;
            return Err(ToolError::Transport {
                message: "failed to capture server stdio".to_string(),
            }
            .into());
        };

        let channel = McpChannel::new(
            command.clone(),
            stdout,
            stdin,
            Duration::from_secs(config.timeout_secs),
        );
        let executor = Self {
            channel,
            child: Mutex::new(Some(child)),
        };

        if let Err(err) = executor.initialize().await {
            warn!(%err, "MCP initialization failed");
            let _ = executor.shutdown().await;
            return Err(err);
        }

        info!(command = %command, "connected to MCP server");
        Ok(executor)
    }

    /// Run over an existing channel with no owned process
    pub async fn connect(channel: McpChannel) -> Result<Self> {
        let executor = Self {
            channel,
            child: Mutex::new(None),
        };
        executor.initialize().await?;
        Ok(executor)
    }

    async fn initialize(&self) -> Result<()> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            }
        });

        self.channel.request("initialize", params).await?;
        self.channel
            .notify("notifications/initialized", json!({}))
            .await
    }
}

#[async_trait]
impl ToolExecutor for McpExecutor {
    fn binding(&self) -> &str {
        "subprocess"
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen_cursors = HashSet::new();

        loop {
            let params = match &cursor {
                Some(cursor) => json!({ "cursor": cursor }),
                None => json!({}),
            };
            let result = self.channel.request("tools/list", params).await?;

            let page: Vec<ToolDescriptor> = result
                .get("tools")
                .cloned()
                .map(serde_json::from_value)
                .transpose()?
                .unwrap_or_default();
            tools.extend(page);

            cursor = match result.get("nextCursor").and_then(Value::as_str) {
                None => break,
                Some(next) if !seen_cursors.insert(next.to_string()) => {
                    warn!(cursor = next, "tools/list repeated a cursor; stopping discovery");
                    break;
                }
                Some(_) if seen_cursors.len() >= MAX_LIST_PAGES => {
                    warn!(pages = MAX_LIST_PAGES, "tools/list page limit reached");
                    break;
                }
                Some(next) => Some(next.to_string()),
            };
        }

        Ok(tools)
    }

    async fn call(&self, name: &str, arguments: &Map<String, Value>) -> Result<ToolOutcome> {
        let params = json!({
            "name": name,
            "arguments": arguments,
        });
        let result = self.channel.request("tools/call", params).await?;

        let text = content_text(&result);
        let is_error = result
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if is_error {
            return Ok(ToolOutcome::Error(
                text.unwrap_or_else(|| "tool reported an error".to_string()),
            ));
        }

        Ok(ToolOutcome::Value(text.map(Value::String).unwrap_or(result)))
    }

    async fn shutdown(&self) -> Result<()> {
        self.channel.close().await;

        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(err) = child.kill().await {
                debug!(%err, "MCP server already exited");
            }
        }
        Ok(())
    }
}

/// Joined text of a `tools/call` result's content items
fn content_text(result: &Value) -> Option<String> {
    let texts: Vec<&str> = result
        .get("content")?
        .as_array()?
        .iter()
        .filter_map(|item| item.get("text").and_then(Value::as_str))
        .collect();

    if texts.is_empty() {
        None
    } else {
        Some(texts.join("\n"))
    }
}
