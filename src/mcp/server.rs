use super::protocol::{error_response, success_response, Protocol};
use super::types::*;
use crate::config::Config;
use crate::editor::registry::EditorRegistry;
use crate::handlers::tool_handlers::ToolHandlers;
use anyhow::Result;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncWrite};

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "code-block-mcp";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

const CATEGORY_HELP: &str = "Category label as reported by generate_code_summary: \
    Python uses imports, vars, functions, classes, fields, methods; \
    C++ headers (.h) use imports, vars, functions, classes, fields, properties, methods; \
    C++ sources (.cpp) use includes, functions, methods, static_members, global_vars.";

/// Main MCP Server
pub struct McpServer {
    tool_handlers: ToolHandlers,
}

impl McpServer {
    pub fn new(config: Config, registry: EditorRegistry) -> Self {
        tracing::info!(
            "Project path: {}, languages: {}",
            config.project_path.display(),
            registry.supported_extensions().join(", ")
        );

        Self {
            tool_handlers: ToolHandlers::new(config, registry),
        }
    }

    /// Serve requests from stdin until the client disconnects
    pub async fn start(self) -> Result<()> {
        let mut protocol = Protocol::stdio();
        self.serve(&mut protocol).await
    }

    pub async fn serve<R, W>(&self, protocol: &mut Protocol<R, W>) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!("MCP server started, waiting for requests...");

        loop {
            match protocol.read_request().await {
                Ok(Some(request)) => {
                    let Some(response) = self.handle_request(request).await else {
                        continue;
                    };
                    if let Err(e) = protocol.send_response(response).await {
                        tracing::error!("Failed to send response: {}", e);
                    }
                }
                Ok(None) => {
                    tracing::info!("Client disconnected");
                    break;
                }
                Err(e) => {
                    tracing::error!("Failed to read request: {}", e);
                    let response = error_response(Value::Null, JsonRpcError::parse_error());
                    let _ = protocol.send_response(response).await;
                }
            }
        }

        Ok(())
    }

    /// Dispatch one request; notifications get no response
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        tracing::debug!("Received request: method={}, id={:?}", request.method, request.id);

        if request.is_notification() {
            tracing::debug!("Notification {} acknowledged", request.method);
            return None;
        }

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.id, request.params),
            "tools/list" => self.handle_tools_list(request.id),
            "tools/call" => self.handle_tools_call(request.id, request.params).await,
            _ => error_response(request.id, JsonRpcError::method_not_found()),
        };
        Some(response)
    }

    fn handle_initialize(&self, id: Value, params: Value) -> JsonRpcResponse {
        match serde_json::from_value::<InitializeRequest>(params) {
            Ok(req) => {
                tracing::info!("Client connected: {} v{}", req.clientInfo.name, req.clientInfo.version);
            }
            Err(e) => {
                return error_response(
                    id,
                    JsonRpcError::invalid_params(format!("Invalid initialize params: {}", e)),
                );
            }
        }

        let response = InitializeResponse {
            protocolVersion: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    listChanged: Some(false),
                },
            },
            serverInfo: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
            },
        };

        success_response(id, json!(response))
    }

    fn handle_tools_list(&self, id: Value) -> JsonRpcResponse {
        let block_address = json!({
            "filename": {
                "type": "string",
                "description": "File path relative to the project root."
            },
            "category": {
                "type": "string",
                "description": CATEGORY_HELP
            },
            "name": {
                "type": "string",
                "description": "Block name. Imports and includes are named by their full statement text."
            },
            "class_name": {
                "type": "string",
                "description": "Owning class for class-level categories (methods, fields, properties, static_members)."
            }
        });

        let with_code = |mut properties: Value| {
            properties["new_code"] = json!({
                "type": "string",
                "description": "Complete source text of the block, indented as it should appear in the file."
            });
            properties
        };

        let tools = vec![
            Tool {
                name: "get_file_tree".to_string(),
                description: "List the project directory as a nested object; files map to null.".to_string(),
                inputSchema: json!({ "type": "object", "properties": {} }),
            },
            Tool {
                name: "generate_code_summary".to_string(),
                description: r#"Summarize the blocks of a source file.

Returns a JSON object: free-standing categories map to name lists, and every class maps to its own categories (methods, fields, ...)."#.to_string(),
                inputSchema: json!({
                    "type": "object",
                    "properties": { "filename": block_address["filename"].clone() },
                    "required": ["filename"]
                }),
            },
            Tool {
                name: "get_code".to_string(),
                description: "Read the source lines of one block, addressed by category, name and optional class.".to_string(),
                inputSchema: json!({
                    "type": "object",
                    "properties": block_address.clone(),
                    "required": ["filename", "category", "name"]
                }),
            },
            Tool {
                name: "modify_code".to_string(),
                description: r#"Replace one block with new source text.

⚠️ **IMPORTANT**:
- Submit the entire block (for a function or method, the full definition), not just the changed lines.
- Fails when the addressed block does not exist."#.to_string(),
                inputSchema: json!({
                    "type": "object",
                    "properties": with_code(block_address.clone()),
                    "required": ["filename", "category", "name", "new_code"]
                }),
            },
            Tool {
                name: "add_new_code".to_string(),
                description: r#"Insert a new block after the last block of the same category (and class).

✨ **Usage Guidance**:
- With no block of that category the code is appended at the end of the file.
- A missing file is created."#.to_string(),
                inputSchema: json!({
                    "type": "object",
                    "properties": with_code(block_address),
                    "required": ["filename", "category", "name", "new_code"]
                }),
            },
        ];

        let response = ListToolsResponse { tools };
        success_response(id, json!(response))
    }

    async fn handle_tools_call(&self, id: Value, params: Value) -> JsonRpcResponse {
        let call_request: CallToolRequest = match serde_json::from_value(params) {
            Ok(req) => req,
            Err(e) => {
                return error_response(
                    id,
                    JsonRpcError::invalid_params(format!("Invalid params: {}", e)),
                );
            }
        };

        let handlers = &self.tool_handlers;
        let args = &call_request.arguments;
        let result = match call_request.name.as_str() {
            "get_file_tree" => handlers.handle_get_file_tree(args).await,
            "generate_code_summary" => handlers.handle_generate_code_summary(args).await,
            "get_code" => handlers.handle_get_code(args).await,
            "modify_code" => handlers.handle_modify_code(args).await,
            "add_new_code" => handlers.handle_add_new_code(args).await,
            _ => {
                return error_response(
                    id,
                    JsonRpcError::invalid_params(format!("Unknown tool: {}", call_request.name)),
                );
            }
        };

        let response = match result {
            Ok(content) => CallToolResponse {
                content,
                isError: None,
            },
            Err(e) => {
                tracing::warn!("Tool {} failed: {:#}", call_request.name, e);
                CallToolResponse {
                    content: vec![Content::Text {
                        text: format!("Error: {:#}", e),
                    }],
                    isError: Some(true),
                }
            }
        };
        success_response(id, json!(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn server(dir: &TempDir) -> McpServer {
        McpServer::new(Config::new(dir.path()), EditorRegistry::default())
    }

    fn request(id: Value, method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.to_string(),
            params,
        }
    }

    #[tokio::test]
    async fn test_tools_list_names() {
        let dir = TempDir::new().unwrap();
        let response = server(&dir)
            .handle_request(request(json!(1), "tools/list", Value::Null))
            .await
            .unwrap();

        let result = response.result.unwrap();
        let names: Vec<&str> = result["tools"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|t| t["name"].as_str())
            .collect();
        assert_eq!(
            names,
            vec!["get_file_tree", "generate_code_summary", "get_code", "modify_code", "add_new_code"]
        );
    }

    #[tokio::test]
    async fn test_notification_gets_no_response() {
        let dir = TempDir::new().unwrap();
        let response = server(&dir)
            .handle_request(request(Value::Null, "notifications/initialized", json!({})))
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_tool_failure_is_reported_in_content() {
        let dir = TempDir::new().unwrap();
        let response = server(&dir)
            .handle_request(request(
                json!(2),
                "tools/call",
                json!({ "name": "get_code", "arguments": { "filename": "missing.py" } }),
            ))
            .await
            .unwrap();

        let result = response.result.unwrap();
        assert_eq!(result["isError"], json!(true));
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .starts_with("Error: Missing 'category' argument"));
    }

    #[tokio::test]
    async fn test_serve_round_trip() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("app.py"), "def main():\n    pass\n").unwrap();

        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"test","version":"1"}}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"generate_code_summary","arguments":{"filename":"app.py"}}}"#,
            "\n"
        );
        let mut protocol = Protocol::new(input.as_bytes(), Vec::new());
        server(&dir).serve(&mut protocol).await.unwrap();

        let output = String::from_utf8(protocol.into_writer()).unwrap();
        let responses: Vec<Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["result"]["serverInfo"]["name"], json!(SERVER_NAME));

        let summary: Value =
            serde_json::from_str(responses[1]["result"]["content"][0]["text"].as_str().unwrap())
                .unwrap();
        assert_eq!(summary["functions"], json!(["main"]));
    }
}
