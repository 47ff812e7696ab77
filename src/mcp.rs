//! MCP stdio 传输层:按行读取 JSON-RPC 请求,逐条处理并写回响应帧。

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::config::ConnectionConfig;
use crate::error::{Result, SplunkSearchError};
use crate::model::{SearchIndexParams, SearchParams, SearchSplunkParams};
use crate::search;

/// JSON-RPC 请求帧。stdio 与 HTTP /message 两条通道共用。
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Serialize)]
pub struct RpcError {
    code: i32,
    message: String,
}

pub async fn run_stdio() -> Result<()> {
    let stdin = tokio::io::stdin();
    let mut reader = BufReader::new(stdin).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = reader.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let req: RpcRequest = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                write_response(
                    &mut stdout,
                    RpcResponse {
                        jsonrpc: "2.0",
                        id: Value::Null,
                        result: None,
                        error: Some(RpcError {
                            code: -32700,
                            message: format!("parse error: {e}"),
                        }),
                    },
                )
                .await?;
                continue;
            }
        };

        if let Some(resp) = process_request(req).await {
            write_response(&mut stdout, resp).await?;
        }
    }

    Ok(())
}

/// 处理一条请求并构造响应。通知帧(无 id)返回 `None`,不产生输出。
pub async fn process_request(req: RpcRequest) -> Option<RpcResponse> {
    let resp = match req.method.as_str() {
        "initialize" => handle_initialize(&req),
        "notifications/initialized" => {
            if req.id.is_null() {
                return None;
            }
            // 规范里 initialized 是通知;客户端带了 id 就按请求确认。
            RpcResponse {
                jsonrpc: "2.0",
                id: req.id,
                result: Some(Value::Bool(true)),
                error: None,
            }
        }
        "tools/list" | "list_tools" => handle_list_tools(&req), // Support both standard and custom method name if needed
        "tools/call" => handle_tool_call(&req).await,
        "list_indexes" | "search_splunk" | "search" | "search_index" | "greet" => {
            handle_direct(&req).await
        }
        _ => RpcResponse {
            jsonrpc: "2.0",
            id: req.id,
            result: None,
            error: Some(RpcError {
                code: -32601,
                message: format!("method not found: {}", req.method),
            }),
        },
    };

    Some(resp)
}

fn handle_initialize(req: &RpcRequest) -> RpcResponse {
    RpcResponse {
        jsonrpc: "2.0",
        id: req.id.clone(),
        result: Some(serde_json::json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": "splunk-search-mcp",
                "version": "0.1.0"
            }
        })),
        error: None,
    }
}

/// 标准 `tools/call`:结果按 MCP 规定包装成 text content。
async fn handle_tool_call(req: &RpcRequest) -> RpcResponse {
    let name = req
        .params
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let args = req
        .params
        .get("arguments")
        .cloned()
        .unwrap_or_else(|| json!({}));

    match dispatch_tool(name, args).await {
        Ok(value) => {
            let text = serde_json::to_string(&value).unwrap_or_else(|_| "null".to_string());
            RpcResponse {
                jsonrpc: "2.0",
                id: req.id.clone(),
                result: Some(json!({
                    "content": [
                        { "type": "text", "text": text }
                    ]
                })),
                error: None,
            }
        }
        Err(e) => rpc_error(req, error_code(&e), e.to_string()),
    }
}

/// 工具名直接作为方法名调用时,结果不做 content 包装。
async fn handle_direct(req: &RpcRequest) -> RpcResponse {
    match dispatch_tool(&req.method, req.params.clone()).await {
        Ok(value) => RpcResponse {
            jsonrpc: "2.0",
            id: req.id.clone(),
            result: Some(value),
            error: None,
        },
        Err(e) => rpc_error(req, error_code(&e), e.to_string()),
    }
}

/// 按工具名执行一次调用。连接配置在每次调用时重新从环境变量读取,
/// 凭据轮换后无需重启进程。
async fn dispatch_tool(name: &str, args: Value) -> Result<Value> {
    match name {
        "list_indexes" => {
            let config = ConnectionConfig::from_env();
            let names = search::list_indexes(&config).await?;
            Ok(serde_json::to_value(names).unwrap_or(Value::Null))
        }
        "search_splunk" => {
            let params: SearchSplunkParams = parse_params(args)?;
            let config = ConnectionConfig::from_env();
            let messages = search::search_splunk(&config, params).await?;
            Ok(serde_json::to_value(messages).unwrap_or(Value::Null))
        }
        "search" => {
            let params: SearchParams = parse_params(args)?;
            let config = ConnectionConfig::from_env();
            let outcome = search::search(&config, params).await?;
            Ok(serde_json::to_value(outcome).unwrap_or(Value::Null))
        }
        "search_index" => {
            let params: SearchIndexParams = parse_params(args)?;
            let config = ConnectionConfig::from_env();
            let outcome = search::search_index(&config, params).await?;
            Ok(serde_json::to_value(outcome).unwrap_or(Value::Null))
        }
        "greet" => {
            let params: GreetParams = parse_params(args)?;
            Ok(Value::String(search::greet(&params.name)))
        }
        _ => Err(SplunkSearchError::InvalidInput(format!(
            "unknown tool: {name}"
        ))),
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(args: Value) -> Result<T> {
    serde_json::from_value(args)
        .map_err(|e| SplunkSearchError::InvalidInput(format!("invalid params: {e}")))
}

fn error_code(err: &SplunkSearchError) -> i32 {
    match err {
        SplunkSearchError::InvalidInput(_) => -32602,
        _ => -32002,
    }
}

async fn write_response(stdout: &mut tokio::io::Stdout, resp: RpcResponse) -> Result<()> {
    let line = serde_json::to_string(&resp).unwrap_or_else(|_| "{}".to_string());
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}

fn rpc_error(req: &RpcRequest, code: i32, message: String) -> RpcResponse {
    RpcResponse {
        jsonrpc: "2.0",
        id: req.id.clone(),
        result: None,
        error: Some(RpcError { code, message }),
    }
}

#[derive(Debug, Deserialize)]
struct GreetParams {
    pub name: String,
}

fn handle_list_tools(req: &RpcRequest) -> RpcResponse {
    let tools = vec![
        serde_json::json!({
            "name": "list_indexes",
            "description": "List the names of all indexes visible to the configured Splunk account.",
            "inputSchema": {
                "type": "object",
                "properties": {}
            }
        }),
        serde_json::json!({
            "name": "search_splunk",
            "description": "Run a Splunk search as a blocking job and return the raw text of each matching event.",
            "inputSchema": {
                "type": "object",
                "required": ["search_query"],
                "properties": {
                    "search_query": { "type": "string" },
                    "earliest_time": { "type": "string", "default": "-24h" },
                    "latest_time": { "type": "string", "default": "now" },
                    "max_results": { "type": "integer", "default": 100 }
                }
            }
        }),
        serde_json::json!({
            "name": "search",
            "description": "Run a oneshot Splunk search. Accepts bare terms, 'search ...' strings or '| ...' pipelines.",
            "inputSchema": {
                "type": "object",
                "required": ["query"],
                "properties": {
                    "query": { "type": "string" },
                    "earliest": { "type": "string", "default": "-7d" },
                    "latest": { "type": "string", "default": "now" },
                    "count": { "type": "integer", "default": 200 }
                }
            }
        }),
        serde_json::json!({
            "name": "search_index",
            "description": "Search one Splunk index with an optional filter, field projection and row limit.",
            "inputSchema": {
                "type": "object",
                "required": ["index"],
                "properties": {
                    "index": { "type": "string" },
                    "filter": { "type": "string", "default": "" },
                    "earliest": { "type": "string", "default": "-5d" },
                    "latest": { "type": "string", "default": "now" },
                    "fields": { "type": ["array", "null"], "items": { "type": "string" } },
                    "limit": { "type": "integer", "default": 100 }
                }
            }
        }),
        serde_json::json!({
            "name": "greet",
            "description": "Return a greeting for the given name. Handy as an end-to-end liveness check.",
            "inputSchema": {
                "type": "object",
                "required": ["name"],
                "properties": {
                    "name": { "type": "string" }
                }
            }
        }),
    ];

    RpcResponse {
        jsonrpc: "2.0",
        id: req.id.clone(),
        result: Some(serde_json::json!({ "tools": tools })),
        error: None,
    }
}
