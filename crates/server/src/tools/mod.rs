//! MCP tool implementations.
//!
//! This module contains all tools exposed by the quire-mcp server.

pub mod cache;
pub mod query;

pub use query::{ContentQueryParams, query_impl};
