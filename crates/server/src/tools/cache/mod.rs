//! Cache-related MCP tools.
//!
//! This module provides tools for inspecting and invalidating the content cache.

pub mod invalidate;
pub mod stats;

pub use invalidate::{CacheInvalidateParams, invalidate_impl};
pub use stats::stats_impl;
