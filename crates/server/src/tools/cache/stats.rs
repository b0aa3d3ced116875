//! cache_stats tool implementation.
//!
//! Reports hit/miss counters and occupancy of the content cache.

use quire_client::ContentLoader;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};

use crate::error::ToolError;

/// Implementation of the cache_stats tool.
pub async fn stats_impl(loader: &ContentLoader) -> Result<CallToolResult, McpError> {
    let stats = loader.stats().await;
    let json = serde_json::to_string_pretty(&stats).map_err(ToolError::Serialize)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
