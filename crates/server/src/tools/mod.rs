//! MCP tool implementations.
//!
//! This module contains all tools exposed by the sitecache server.

pub mod cache;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;
use sitecache_core::Error;

/// Render a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Body as text when it is valid UTF-8.
pub(crate) fn body_text(body: &[u8]) -> Option<String> {
    std::str::from_utf8(body).ok().map(str::to_string)
}
