use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fnord_core::ToolSpec;
use fnord_settings::document::{McpServerConfig, TransportKind};
use futures_util::{SinkExt, StreamExt};
use rmcp::model::{CallToolRequestParam, Tool as RmcpTool};
use rmcp::service::{RunningService, ServiceExt};
use rmcp::RoleClient;
use serde_json::Value;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::tool::{Tool, ToolOutcome};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Upper bound on a remote tool's per-call timeout regardless of what a
/// server config requests, so a misconfigured MCP server can't wedge the
/// completion loop indefinitely.
const MAX_CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// One connected remote tool server (§4.3 "remote tools"). Holds the
/// `rmcp` client service for `stdio`/streamable-HTTP, or a raw WebSocket
/// connection for the `websocket` transport.
enum RemoteConnection {
    Rmcp(Mutex<RunningService<RoleClient, ()>>),
    WebSocket(Mutex<WsStream>),
}

/// Opens the configured transport and enumerates the server's tools,
/// matching the teacher's stdio-spawn-then-handshake shape in
/// `csa-mcp-hub::registry`.
pub async fn connect(server_name: &str, config: &McpServerConfig) -> anyhow::Result<(RemoteConnection, Vec<RmcpTool>)> {
    match config.transport {
        TransportKind::Stdio => {
            let command = config
                .command
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("server '{server_name}' missing stdio command"))?;
            let mut cmd = Command::new(command);
            cmd.args(&config.args);
            for (key, value) in &config.env {
                cmd.env(key, value);
            }
            cmd.stdin(std::process::Stdio::piped());
            cmd.stdout(std::process::Stdio::piped());
            cmd.stderr(std::process::Stdio::null());

            let mut child = cmd.spawn()?;
            let stdout = child.stdout.take().expect("piped stdout");
            let stdin = child.stdin.take().expect("piped stdin");
            let service: RunningService<RoleClient, ()> = ().serve((stdout, stdin)).await?;
            let tools = service.list_tools(None).await?.tools;
            Ok((RemoteConnection::Rmcp(Mutex::new(service)), tools))
        }
        TransportKind::StreamableHttp => {
            let url = config
                .url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("server '{server_name}' missing HTTP url"))?;
            let transport = rmcp::transport::StreamableHttpClientTransport::from_uri(url);
            let service: RunningService<RoleClient, ()> = ().serve(transport).await?;
            let tools = service.list_tools(None).await?.tools;
            Ok((RemoteConnection::Rmcp(Mutex::new(service)), tools))
        }
        TransportKind::WebSocket => {
            let url = config
                .url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("server '{server_name}' missing websocket url"))?;
            let (mut stream, _response) = tokio_tungstenite::connect_async(url).await?;
            let result = ws_request(&mut stream, "tools/list", Value::Object(Default::default())).await?;
            let tools: Vec<RmcpTool> = serde_json::from_value(
                result.get("tools").cloned().unwrap_or(Value::Array(Vec::new())),
            )
            .map_err(|e| anyhow::anyhow!("server '{server_name}' returned malformed tools/list: {e}"))?;
            Ok((RemoteConnection::WebSocket(Mutex::new(stream)), tools))
        }
    }
}

/// Sends one JSON-RPC 2.0 request over a WebSocket frame and waits for the
/// response carrying the same id, skipping any unrelated frames (e.g.
/// server-initiated notifications) in between.
async fn ws_request(stream: &mut WsStream, method: &str, params: Value) -> anyhow::Result<Value> {
    const REQUEST_ID: i64 = 1;
    let request = serde_json::json!({
        "jsonrpc": "2.0",
        "id": REQUEST_ID,
        "method": method,
        "params": params,
    });
    stream.send(WsMessage::Text(request.to_string())).await?;

    loop {
        match stream.next().await {
            Some(Ok(WsMessage::Text(text))) => {
                let response: Value = serde_json::from_str(&text)?;
                if response.get("id").and_then(Value::as_i64) != Some(REQUEST_ID) {
                    continue;
                }
                if let Some(error) = response.get("error") {
                    anyhow::bail!("mcp server returned error for '{method}': {error}");
                }
                return Ok(response.get("result").cloned().unwrap_or(Value::Null));
            }
            Some(Ok(WsMessage::Close(_))) | None => {
                anyhow::bail!("websocket closed before a response to '{method}' arrived");
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

/// A remote tool installed as a synthetic built-in named
/// `"<server>_<tool>"` (§4.3), dispatching through its transport with a
/// bounded per-call timeout.
pub struct RemoteTool {
    pub server_name: String,
    pub remote_name: String,
    pub description: String,
    pub parameters_schema: Value,
    pub connection: Arc<RemoteConnection>,
    pub call_timeout: Duration,
}

#[async_trait]
impl Tool for RemoteTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: format!("{}_{}", self.server_name, self.remote_name),
            description: self.description.clone(),
            parameters_schema: self.parameters_schema.clone(),
        }
    }

    fn is_async(&self) -> bool {
        true
    }

    async fn call(&self, args: Value) -> ToolOutcome {
        let result = tokio::time::timeout(self.call_timeout, self.dispatch(args)).await;
        match result {
            Ok(Ok(value)) => ToolOutcome::Ok(value),
            Ok(Err(e)) => ToolOutcome::Error(e.to_string()),
            Err(_) => ToolOutcome::Error(format!("{}: call timed out", self.spec().name)),
        }
    }
}

impl RemoteTool {
    async fn dispatch(&self, args: Value) -> anyhow::Result<Value> {
        match self.connection.as_ref() {
            RemoteConnection::Rmcp(service) => {
                let guard = service.lock().await;
                let arguments = args.as_object().cloned();
                let result = guard
                    .call_tool(CallToolRequestParam {
                        name: self.remote_name.clone().into(),
                        arguments,
                    })
                    .await?;
                Ok(serde_json::to_value(result.content)?)
            }
            RemoteConnection::WebSocket(stream) => {
                let mut guard = stream.lock().await;
                let params = serde_json::json!({
                    "name": self.remote_name,
                    "arguments": args,
                });
                let result = ws_request(&mut guard, "tools/call", params).await?;
                Ok(result.get("content").cloned().unwrap_or(result))
            }
        }
    }
}

/// Connects every configured server for a project and returns the
/// resulting set of synthetic tools, skipping (and logging) any server
/// that fails to connect rather than failing the whole registry build.
pub async fn discover_all(servers: HashMap<String, McpServerConfig>) -> Vec<RemoteTool> {
    let mut tools = Vec::new();
    for (name, config) in servers {
        match connect(&name, &config).await {
            Ok((connection, remote_tools)) => {
                let connection = Arc::new(connection);
                let timeout = Duration::from_millis(config.timeout_ms).min(MAX_CALL_TIMEOUT);
                for remote_tool in remote_tools {
                    tools.push(RemoteTool {
                        server_name: name.clone(),
                        remote_name: remote_tool.name.to_string(),
                        description: remote_tool.description.as_deref().unwrap_or_default().to_string(),
                        parameters_schema: serde_json::Value::Object((*remote_tool.input_schema).clone()),
                        connection: connection.clone(),
                        call_timeout: timeout,
                    });
                }
            }
            Err(e) => {
                tracing::warn!(server = %name, error = %e, "failed to connect to MCP server");
            }
        }
    }
    tools
}
