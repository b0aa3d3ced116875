//! In-process cache shared by the content managers.
//!
//! This module provides a bounded, TTL-aware cache:
//!
//! - Size budget measured on serialized values
//! - Oldest-first eviction after expired entries are purged
//! - Lazy expiry on access, no background timers
//! - Keys grouped per model for targeted invalidation

pub mod bounded;
pub mod hash;

use std::sync::Arc;

use serde::Serialize;

use crate::model::{ModelDescriptor, Record};
use crate::query::QueryResult;

pub use bounded::{BoundedCache, CacheConfig, CacheStats};
pub use hash::{cache_key, compute_digest, key_mentions_model};

/// Values the content layer memoizes.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CachedValue {
    Model(Arc<ModelDescriptor>),
    Records(Arc<Vec<Record>>),
    Names(Arc<Vec<String>>),
    Flag(bool),
    Result(Arc<QueryResult>),
}

/// The cache instance threaded through managers and builders.
pub type ContentCache = BoundedCache<CachedValue>;

impl BoundedCache<CachedValue> {
    /// Drop every entry that depends on `model`; returns how many.
    pub async fn invalidate_model(&self, model: &str) -> usize {
        self.delete_matching(|key| key_mentions_model(key, model)).await
    }
}
