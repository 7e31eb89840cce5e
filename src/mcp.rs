use std::sync::Arc;

use anyhow::Context as _;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, ListToolsResult, PaginatedRequestParams,
    ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{ErrorData as McpError, ServerHandler, ServiceExt};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::browser::CdpEngine;
use crate::describe::OllamaDescriber;
use crate::dispatch::Dispatcher;
use crate::envelope::ResponseEnvelope;
use crate::error::ToolError;
use crate::schema::{self, ToolDefinition};

#[derive(Clone)]
pub struct BrowserToolServer {
    dispatcher: Arc<Mutex<Dispatcher>>,
    ct: CancellationToken,
}

impl BrowserToolServer {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(Mutex::new(dispatcher)),
            ct: CancellationToken::new(),
        }
    }

    /// Run one tool call against the shared session. Calls are serialized;
    /// once shutdown starts, running and queued calls end with a cancellation
    /// error instead of touching the browser.
    pub async fn call(&self, name: &str, arguments: Option<Value>) -> ResponseEnvelope {
        let envelope = tokio::select! {
            biased;
            _ = self.ct.cancelled() => {
                warn!(tool = name, "tool call cancelled by shutdown");
                ResponseEnvelope::failure(&ToolError::Cancelled)
            }
            envelope = async {
                self.dispatcher
                    .lock()
                    .await
                    .dispatch(name, arguments.as_ref())
                    .await
            } => envelope,
        };
        debug!(tool = name, is_error = envelope.is_error, "call finished");
        envelope
    }

    /// Cancel any running call, then close page, context and browser.
    /// The session lock is released as soon as the running call is dropped,
    /// so teardown always runs.
    pub async fn shutdown(&self) {
        self.ct.cancel();
        self.dispatcher.lock().await.shutdown().await;
    }
}

/// Registry entry as an MCP tool descriptor.
pub fn to_mcp_tool(def: &ToolDefinition) -> Tool {
    Tool::new(def.name, def.description, Arc::new(def.input_schema()))
}

/// The registry rendered as `{name, description, inputSchema}` objects.
pub fn tool_manifest() -> Vec<Value> {
    schema::list_tools()
        .iter()
        .map(|def| {
            serde_json::json!({
                "name": def.name,
                "description": def.description,
                "inputSchema": Value::Object(def.input_schema()),
            })
        })
        .collect()
}

fn to_call_result(envelope: ResponseEnvelope) -> CallToolResult {
    let content = vec![Content::text(envelope.text())];
    if envelope.is_error {
        CallToolResult::error(content)
    } else {
        CallToolResult::success(content)
    }
}

impl ServerHandler for BrowserToolServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "browser-tools-mcp: browser automation tools. \
                 Call 'launch_browser' first, then 'navigate' to open a URL. \
                 Interact with 'click_element', 'type_text' and 'wait_for_element' using CSS selectors. \
                 Inspect with 'get_element_text', 'get_page_info', 'evaluate_javascript' and 'get_console_logs'. \
                 Use 'scroll' and 'check_scrollability' for long pages. \
                 'screenshot' captures the page; 'analyze_screenshot' also asks a local vision model to describe it. \
                 Call 'close_browser' when done."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _params: Option<PaginatedRequestParams>,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let tools = schema::list_tools().iter().map(to_mcp_tool).collect();
        Ok(ListToolsResult::with_all_items(tools))
    }

    async fn call_tool(
        &self,
        params: CallToolRequestParams,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let arguments = params.arguments.map(Value::Object);
        let envelope = self.call(&params.name, arguments).await;
        Ok(to_call_result(envelope))
    }
}

pub async fn run_mcp_server(describer_url: &str) -> anyhow::Result<()> {
    info!(describer_url = %describer_url, "starting MCP server over stdio");
    let server = BrowserToolServer::new(Dispatcher::new(
        CdpEngine,
        OllamaDescriber::new(describer_url),
    ));

    let service = server
        .clone()
        .serve(rmcp::transport::stdio())
        .await
        .context("Failed to start MCP server")?;

    info!("MCP server running, waiting for requests");
    let service_ct = service.cancellation_token();
    let outcome = tokio::select! {
        result = service.waiting() => {
            info!("client disconnected");
            result
                .map(drop)
                .context("MCP service terminated abnormally")
        }
        signal = shutdown_signal() => {
            info!("shutdown signal received");
            service_ct.cancel();
            signal
        }
    };

    server.shutdown().await;
    info!("MCP server shut down");
    outcome
}

#[cfg(unix)]
async fn shutdown_signal() -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("Failed to listen for ctrl-c")?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> anyhow::Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")
}
