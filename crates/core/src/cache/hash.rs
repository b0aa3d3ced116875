//! Cache key construction.
//!
//! Keys have the shape `kind:model[,model...]:rest` so entries touching a
//! model can be dropped together when that model's content changes.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::Error;

/// Build a cache key for `kind` touching `models`.
pub fn cache_key(kind: &str, models: &[&str], rest: &str) -> String {
    format!("{kind}:{}:{rest}", models.join(","))
}

/// Whether `key` was built for (or depends on) `model`.
pub fn key_mentions_model(key: &str, model: &str) -> bool {
    key.split(':').nth(1).is_some_and(|models| models.split(',').any(|m| m == model))
}

/// Compute a stable digest of a serializable declaration.
///
/// # Errors
///
/// Returns `Error::Cache` if the value cannot be serialized.
pub fn compute_digest<T: Serialize>(value: &T) -> Result<String, Error> {
    let bytes = serde_json::to_vec(value).map_err(|e| Error::Cache(format!("failed to serialize cache key: {e}")))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}
