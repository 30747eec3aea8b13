//! Stdio JSON-RPC server exposing the log store tools
//!
//! Reads one JSON-RPC message per line and writes one response per line.
//! Handled methods:
//!
//! - `initialize` -- protocol version, `tools` capability, server info.
//! - `notifications/initialized` and any other notification -- no response.
//! - `ping` -- empty result.
//! - `tools/list` -- the registry's tool definitions.
//! - `tools/call` -- runs a tool; tool failures come back as
//!   `isError: true` content rather than JSON-RPC errors.
//! - anything else -- `-32601 Method not found`.
//!
//! Malformed frames get a `-32700` error and the loop continues.

pub mod types;

use crate::error::Result;
use crate::tools::ToolRegistry;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use types::{
    CallToolParams, CallToolResponse, Implementation, InitializeResponse, JsonRpcRequest,
    JsonRpcResponse, ListToolsResponse, McpTool, ServerCapabilities, ToolResponseContent,
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_INITIALIZE, METHOD_INITIALIZED,
    METHOD_NOT_FOUND, METHOD_PING, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST, PARSE_ERROR,
    PROTOCOL_VERSION,
};

/// Server name reported in `initialize`
pub const SERVER_NAME: &str = "convlog";

/// JSON-RPC dispatcher over a tool registry
pub struct McpServer {
    registry: ToolRegistry,
}

impl McpServer {
    /// Create a server dispatching to `registry`
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    /// Handle one framed message, returning the serialized response if any
    ///
    /// Notifications return `None`.
    pub async fn handle_message(&self, line: &str) -> Option<String> {
        let response = match serde_json::from_str::<serde_json::Value>(line) {
            Err(e) => {
                tracing::debug!(error = %e, "Malformed JSON-RPC frame");
                Some(JsonRpcResponse::error(
                    serde_json::Value::Null,
                    PARSE_ERROR,
                    "Parse error",
                ))
            }
            Ok(value) => match serde_json::from_value::<JsonRpcRequest>(value.clone()) {
                Err(_) => Some(JsonRpcResponse::error(
                    value.get("id").cloned().unwrap_or(serde_json::Value::Null),
                    INVALID_REQUEST,
                    "Invalid Request",
                )),
                Ok(request) => self.dispatch(request).await,
            },
        };

        response.and_then(|resp| match serde_json::to_string(&resp) {
            Ok(s) => Some(s),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize response");
                None
            }
        })
    }

    async fn dispatch(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id else {
            if request.method == METHOD_INITIALIZED {
                tracing::info!("Client initialized");
            } else {
                tracing::debug!(method = %request.method, "Notification received");
            }
            return None;
        };

        tracing::debug!(method = %request.method, "Request received");

        let response = match request.method.as_str() {
            METHOD_INITIALIZE => to_result(id, &self.initialize()),
            METHOD_PING => JsonRpcResponse::result(id, serde_json::json!({})),
            METHOD_TOOLS_LIST => to_result(id, &self.list_tools()),
            METHOD_TOOLS_CALL => {
                let params = request
                    .params
                    .map(serde_json::from_value::<CallToolParams>);
                match params {
                    Some(Ok(params)) => {
                        let result = self.call_tool(params).await;
                        to_result(id, &result)
                    }
                    Some(Err(e)) => JsonRpcResponse::error(
                        id,
                        INVALID_PARAMS,
                        format!("Invalid tools/call params: {}", e),
                    ),
                    None => {
                        JsonRpcResponse::error(id, INVALID_PARAMS, "Missing tools/call params")
                    }
                }
            }
            other => JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            ),
        };

        Some(response)
    }

    fn initialize(&self) -> InitializeResponse {
        InitializeResponse {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(serde_json::json!({})),
            },
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    fn list_tools(&self) -> ListToolsResponse {
        let tools = self
            .registry
            .all_definitions()
            .into_iter()
            .map(|def| McpTool {
                name: def["name"].as_str().unwrap_or_default().to_string(),
                description: def["description"].as_str().map(str::to_string),
                input_schema: def["parameters"].clone(),
            })
            .collect();
        ListToolsResponse { tools }
    }

    async fn call_tool(&self, params: CallToolParams) -> CallToolResponse {
        let args = params.arguments.unwrap_or_else(|| serde_json::json!({}));
        let result = self.registry.call(&params.name, args).await;
        CallToolResponse {
            content: vec![ToolResponseContent::Text {
                text: result.to_message(),
            }],
            is_error: Some(!result.success),
        }
    }

    /// Serve newline-delimited JSON-RPC until `reader` reaches end of input
    ///
    /// A frame that is not valid UTF-8 gets a parse error like any other
    /// malformed frame.
    ///
    /// # Errors
    ///
    /// Returns error if reading or writing the streams fails
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = Vec::new();
        let mut handled = 0usize;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }

            let response = match std::str::from_utf8(&buf) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    self.handle_message(trimmed).await
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Frame is not valid UTF-8");
                    serde_json::to_string(&JsonRpcResponse::error(
                        serde_json::Value::Null,
                        PARSE_ERROR,
                        "Parse error",
                    ))
                    .ok()
                }
            };
            handled += 1;

            if let Some(response) = response {
                writer.write_all(response.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }

        tracing::info!(messages = handled, "Input closed, server stopping");
        Ok(())
    }
}

fn to_result<T: serde::Serialize>(id: serde_json::Value, value: &T) -> JsonRpcResponse {
    match serde_json::to_value(value) {
        Ok(v) => JsonRpcResponse::result(id, v),
        Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, format!("Internal error: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LogStore;
    use serde_json::Value;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn server(temp: &TempDir) -> McpServer {
        McpServer::new(ToolRegistry::with_log_store(Arc::new(LogStore::new(
            temp.path(),
        ))))
    }

    async fn call(server: &McpServer, request: Value) -> Value {
        let line = serde_json::to_string(&request).unwrap();
        let response = server.handle_message(&line).await.expect("response");
        serde_json::from_str(&response).unwrap()
    }

    #[tokio::test]
    async fn test_initialize() {
        let temp = TempDir::new().unwrap();
        let resp = call(
            &server(&temp),
            serde_json::json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
        )
        .await;
        assert_eq!(resp["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(resp["result"]["serverInfo"]["name"], SERVER_NAME);
        assert!(resp["result"]["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_notification_gets_no_response() {
        let temp = TempDir::new().unwrap();
        let out = server(&temp)
            .handle_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn test_null_id_is_a_request() {
        let temp = TempDir::new().unwrap();
        let out = server(&temp)
            .handle_message(r#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#)
            .await
            .expect("null id still gets a response");
        let resp: Value = serde_json::from_str(&out).unwrap();
        assert!(resp["id"].is_null());
        assert_eq!(resp["result"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_parse_error() {
        let temp = TempDir::new().unwrap();
        let out = server(&temp).handle_message("{not json").await.unwrap();
        let resp: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(resp["error"]["code"], PARSE_ERROR);
        assert!(resp["id"].is_null());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let temp = TempDir::new().unwrap();
        let resp = call(
            &server(&temp),
            serde_json::json!({"jsonrpc": "2.0", "id": "a", "method": "resources/list"}),
        )
        .await;
        assert_eq!(resp["error"]["code"], METHOD_NOT_FOUND);
        assert_eq!(resp["id"], "a");
    }

    #[tokio::test]
    async fn test_tools_list_uses_input_schema() {
        let temp = TempDir::new().unwrap();
        let resp = call(
            &server(&temp),
            serde_json::json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
        )
        .await;
        let tools = resp["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 3);
        assert!(tools.iter().all(|t| t["inputSchema"]["type"] == "object"));
    }

    #[tokio::test]
    async fn test_tools_call_validation_failure_is_tool_error() {
        let temp = TempDir::new().unwrap();
        let resp = call(
            &server(&temp),
            serde_json::json!({
                "jsonrpc": "2.0", "id": 3, "method": "tools/call",
                "params": {"name": "save_conversation", "arguments": {}}
            }),
        )
        .await;
        assert_eq!(resp["result"]["isError"], true);
        let text = resp["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("messages is required"));
    }

    #[tokio::test]
    async fn test_tools_call_missing_params() {
        let temp = TempDir::new().unwrap();
        let resp = call(
            &server(&temp),
            serde_json::json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call"}),
        )
        .await;
        assert_eq!(resp["error"]["code"], INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_serve_round_trip() {
        let temp = TempDir::new().unwrap();
        let srv = server(&temp);
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"save_conversation","arguments":{"messages":[{"role":"user","content":"hi there"}]}}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"query_logs","arguments":{"keyword":"HI"}}}"#,
            "\n"
        );
        let mut output = Vec::new();
        srv.serve(tokio::io::BufReader::new(input.as_bytes()), &mut output)
            .await
            .unwrap();

        let responses: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[1]["result"]["isError"], false);
        let query_text = responses[2]["result"]["content"][0]["text"].as_str().unwrap();
        let query: Value = serde_json::from_str(query_text).unwrap();
        assert_eq!(query["count"], 1);
        assert_eq!(query["logs"][0]["tokens"], 2);
    }
}
