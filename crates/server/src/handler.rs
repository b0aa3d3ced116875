//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use quire_client::ContentLoader;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

use crate::tools::cache::{CacheInvalidateParams, invalidate_impl, stats_impl};
use crate::tools::{ContentQueryParams, query_impl};

/// The main MCP server handler for quire-mcp.
#[derive(Clone)]
pub struct QuireServer {
    loader: Arc<ContentLoader>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl QuireServer {
    /// Create a new server handler serving `loader`.
    pub fn new(loader: Arc<ContentLoader>) -> Self {
        Self { loader, tool_router: Self::tool_router() }
    }

    /// Query a content model.
    ///
    /// Filters combine with AND. Includes attach related records, optionally
    /// nested and with their own locale.
    #[tool(description = "Query a content model with filters, sorting, pagination, relation includes and locale. \
                          Returns {data, total, pagination}.")]
    async fn content_query(&self, params: Parameters<ContentQueryParams>) -> Result<CallToolResult, McpError> {
        query_impl(&self.loader, params.0).await
    }

    #[tool(description = "Report content cache statistics: hits, misses, size in bytes, entries and last cleanup.")]
    async fn cache_stats(&self) -> Result<CallToolResult, McpError> {
        stats_impl(&self.loader).await
    }

    #[tool(description = "Invalidate cached content for one model, or the whole cache when no model is given. \
                          Returns the number of entries removed.")]
    async fn cache_invalidate(&self, params: Parameters<CacheInvalidateParams>) -> Result<CallToolResult, McpError> {
        invalidate_impl(&self.loader, params.0).await
    }
}

impl ServerHandler for QuireServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "quire-mcp".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Read-only access to CMS content. Use content_query to fetch records; \
                 cache tools inspect and reset the in-process cache."
                    .into(),
            ),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
