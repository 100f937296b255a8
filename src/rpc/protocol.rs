//! JSON-RPC 2.0 frames for the tool-server wire protocol.
//!
//! Newline-delimited UTF-8 JSON, no batching. Every loosely-typed payload is
//! validated into a typed struct; schema violations come back as
//! `RpcError::InvalidResponse` instead of trapping on a missing field.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RpcError;

pub const JSONRPC_VERSION: &str = "2.0";

/// Default protocol version offered during the handshake.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

// ─── Requests ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: i64,
    pub method: String,
    pub params: Value,
}

impl JsonRpcRequest {
    #[must_use]
    pub fn initialize(id: i64, protocol_version: &str) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method: "initialize".to_string(),
            params: serde_json::json!({
                "protocolVersion": protocol_version,
                "capabilities": {},
            }),
        }
    }

    #[must_use]
    pub fn tool_call(id: i64, name: &str, arguments: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method: "tools/call".to_string(),
            params: serde_json::json!({
                "name": name,
                "arguments": arguments,
            }),
        }
    }

    pub fn to_line(&self) -> Result<String, RpcError> {
        serde_json::to_string(self)
            .map_err(|e| RpcError::InvalidResponse(format!("failed to encode request: {e}")))
    }
}

// ─── Responses ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<WireError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireError {
    #[serde(default)]
    pub code: Option<i64>,
    pub message: String,
}

impl JsonRpcResponse {
    #[must_use]
    pub fn correlation_id(&self) -> Option<i64> {
        self.id.as_ref().and_then(Value::as_i64)
    }
}

/// Parse one newline-delimited frame. Empty or unparsable bytes are a
/// protocol failure, never a timeout.
pub fn parse_response(line: &str) -> Result<JsonRpcResponse, RpcError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(RpcError::InvalidResponse("empty frame".to_string()));
    }
    serde_json::from_str(trimmed)
        .map_err(|e| RpcError::InvalidResponse(format!("unparsable frame: {e}")))
}

// ─── initialize result ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Capabilities {
    tools: Vec<ToolDescriptor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializeResult {
    server_info: ServerInfo,
    #[serde(default)]
    protocol_version: Option<String>,
    capabilities: Capabilities,
}

/// Outcome of a successful handshake.
#[derive(Debug, Clone)]
pub struct Handshake {
    pub server_info: ServerInfo,
    pub protocol_version: Option<String>,
    pub tools: Vec<String>,
}

pub fn parse_handshake(response: &JsonRpcResponse) -> Result<Handshake, RpcError> {
    if let Some(error) = &response.error {
        return Err(RpcError::Server {
            message: error.message.clone(),
        });
    }
    let result = response
        .result
        .as_ref()
        .ok_or_else(|| RpcError::InvalidResponse("initialize: missing result".to_string()))?;

    let parsed: InitializeResult = serde_json::from_value(result.clone())
        .map_err(|e| RpcError::InvalidResponse(format!("initialize result: {e}")))?;

    Ok(Handshake {
        server_info: parsed.server_info,
        protocol_version: parsed.protocol_version,
        tools: parsed
            .capabilities
            .tools
            .into_iter()
            .map(|tool| tool.name)
            .collect(),
    })
}

// ─── tools/call result ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ContentItem {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallToolResult {
    content: Vec<ContentItem>,
}

/// Extract the joined text output of a `tools/call` response. A wire-level
/// `error.message` surfaces verbatim as a server failure.
pub fn parse_tool_output(response: &JsonRpcResponse) -> Result<String, RpcError> {
    if let Some(error) = &response.error {
        return Err(RpcError::Server {
            message: error.message.clone(),
        });
    }
    let result = response
        .result
        .as_ref()
        .ok_or_else(|| RpcError::InvalidResponse("tools/call: missing result".to_string()))?;

    let parsed: CallToolResult = serde_json::from_value(result.clone())
        .map_err(|e| RpcError::InvalidResponse(format!("tools/call result: {e}")))?;

    Ok(parsed
        .content
        .into_iter()
        .filter_map(|item| item.text)
        .collect::<Vec<_>>()
        .join("\n"))
}
