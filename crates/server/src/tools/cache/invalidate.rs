//! cache_invalidate tool implementation.
//!
//! Drops cached content of one model, or the whole cache.

use quire_client::ContentLoader;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// Parameters for the cache_invalidate tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheInvalidateParams {
    /// Model whose entries to drop; omit to clear everything.
    #[serde(default)]
    pub model: Option<String>,
}

/// Output from the cache_invalidate tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheInvalidateOutput {
    /// Number of entries removed.
    pub removed: usize,
}

/// Implementation of the cache_invalidate tool.
pub async fn invalidate_impl(
    loader: &ContentLoader, params: CacheInvalidateParams,
) -> Result<CallToolResult, McpError> {
    let removed = loader.invalidate(params.model.as_deref()).await;
    let json = serde_json::to_string_pretty(&CacheInvalidateOutput { removed }).map_err(ToolError::Serialize)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
