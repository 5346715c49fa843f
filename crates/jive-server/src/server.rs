//! MCP server over stdio
//!
//! Reads newline-delimited JSON-RPC requests from stdin, dispatches them,
//! and writes responses to stdout. Logging goes to stderr; stdout carries
//! only protocol frames.

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use jive_domain::error::{Error, Result};
use jive_infrastructure::AppContext;

use crate::protocol::{
    ContentBlock, ErrorCode, InitializeResult, JSONRPC_VERSION, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, MCP_PROTOCOL_VERSION, ServerCapabilities, ServerInfo, ToolCallParams,
    ToolCallResult, ToolsCapability, ToolsListResult, methods,
};
use crate::registry::ToolRegistry;

/// Server identity reported during the initialize handshake.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server name
    pub name: String,
    /// Server version
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "mcp-jive".to_owned(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
        }
    }
}

/// The stdio MCP server.
pub struct McpServer {
    config: ServerConfig,
    registry: Arc<ToolRegistry>,
}

impl McpServer {
    /// Build the server and its tool registry over the application context.
    ///
    /// # Errors
    ///
    /// Internal errors from registry construction.
    pub fn new(app: Arc<AppContext>, config: ServerConfig) -> Result<Self> {
        Ok(Self {
            config,
            registry: Arc::new(ToolRegistry::new(app)?),
        })
    }

    /// The registry, for transports and tests that dispatch directly.
    #[must_use]
    pub fn registry(&self) -> Arc<ToolRegistry> {
        Arc::clone(&self.registry)
    }

    /// Run the stdio loop until stdin closes.
    ///
    /// # Errors
    ///
    /// I/O errors on stdin/stdout.
    pub async fn run(&self) -> Result<()> {
        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut lines = BufReader::new(stdin).lines();

        tracing::info!(
            name = %self.config.name,
            version = %self.config.version,
            "MCP server listening on stdio"
        );

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| Error::io_with_source("Cannot read from stdin", e))?
        {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(response) = self.handle_line(&line).await {
                let serialized = serde_json::to_string(&response)?;
                stdout
                    .write_all(serialized.as_bytes())
                    .await
                    .map_err(|e| Error::io_with_source("Cannot write to stdout", e))?;
                stdout
                    .write_all(b"\n")
                    .await
                    .map_err(|e| Error::io_with_source("Cannot write to stdout", e))?;
                stdout
                    .flush()
                    .await
                    .map_err(|e| Error::io_with_source("Cannot flush stdout", e))?;
            }
        }
        tracing::info!("stdin closed; MCP server shutting down");
        Ok(())
    }

    /// Handle one raw line; `None` for notifications (no response).
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "unparsable request line");
                return Some(JsonRpcResponse::error(
                    None,
                    JsonRpcError::new(ErrorCode::ParseError, format!("Invalid JSON: {e}")),
                ));
            }
        };
        self.handle_request(request).await
    }

    /// Handle one parsed request.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(
                request.id,
                JsonRpcError::new(ErrorCode::InvalidRequest, "jsonrpc must be \"2.0\""),
            ));
        }

        match request.method.as_str() {
            methods::INITIALIZE => {
                let result = InitializeResult {
                    protocol_version: MCP_PROTOCOL_VERSION.to_owned(),
                    capabilities: ServerCapabilities {
                        tools: Some(ToolsCapability {
                            list_changed: false,
                        }),
                    },
                    server_info: ServerInfo {
                        name: self.config.name.clone(),
                        version: self.config.version.clone(),
                    },
                };
                Some(JsonRpcResponse::success(
                    request.id,
                    serde_json::to_value(result).unwrap_or(Value::Null),
                ))
            }
            methods::INITIALIZED => None,
            methods::PING => Some(JsonRpcResponse::success(
                request.id,
                serde_json::json!({}),
            )),
            methods::TOOLS_LIST => {
                let result = ToolsListResult {
                    tools: self.registry.list_tools(),
                };
                Some(JsonRpcResponse::success(
                    request.id,
                    serde_json::to_value(result).unwrap_or(Value::Null),
                ))
            }
            methods::TOOLS_CALL => {
                let params: ToolCallParams =
                    match serde_json::from_value(request.params.unwrap_or(Value::Null)) {
                        Ok(params) => params,
                        Err(e) => {
                            return Some(JsonRpcResponse::error(
                                request.id,
                                JsonRpcError::new(
                                    ErrorCode::InvalidParams,
                                    format!("Invalid tools/call params: {e}"),
                                ),
                            ));
                        }
                    };
                let outcome = self.registry.dispatch(&params.name, params.arguments).await;
                let text = serde_json::to_string(&outcome.envelope)
                    .unwrap_or_else(|_| "{\"success\":false}".to_owned());
                let result = ToolCallResult {
                    content: vec![ContentBlock::text(text)],
                    is_error: !outcome.success,
                };
                Some(JsonRpcResponse::success(
                    request.id,
                    serde_json::to_value(result).unwrap_or(Value::Null),
                ))
            }
            other => Some(JsonRpcResponse::error(
                request.id,
                JsonRpcError::new(ErrorCode::MethodNotFound, format!("Unknown method: {other}")),
            )),
        }
    }
}
