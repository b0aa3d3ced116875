//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Upper bound for the cache budget (1GiB).
const MAX_CACHE_BYTES: usize = 1024 * 1024 * 1024;

/// Upper bound for any cache TTL (24 hours).
const MAX_TTL_MS: u64 = 24 * 60 * 60 * 1000;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `cache_max_bytes` is 0 or exceeds 1GiB
    /// - `cache_ttl_ms` or `result_cache_ttl_ms` is 0 or exceeds 24 hours
    ///
    /// Returns `ConfigError::Missing` if `default_locale` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_max_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "cache_max_bytes".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.cache_max_bytes > MAX_CACHE_BYTES {
            return Err(ConfigError::Invalid { field: "cache_max_bytes".into(), reason: "must not exceed 1GiB".into() });
        }

        validate_ttl("cache_ttl_ms", self.cache_ttl_ms)?;
        if let Some(ttl) = self.result_cache_ttl_ms {
            validate_ttl("result_cache_ttl_ms", ttl)?;
        }

        if self.default_locale.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "default_locale".into(),
                hint: "Set QUIRE_DEFAULT_LOCALE environment variable".into(),
            });
        }

        if !self.cache_enabled && self.result_cache_ttl_ms.is_some() {
            tracing::warn!(
                result_cache_ttl_ms = self.result_cache_ttl_ms,
                "result_cache_ttl_ms is set but the cache is disabled; results will not be cached"
            );
        }

        Ok(())
    }
}

fn validate_ttl(field: &str, ttl_ms: u64) -> Result<(), ConfigError> {
    if ttl_ms == 0 {
        return Err(ConfigError::Invalid { field: field.into(), reason: "must be at least 1ms".into() });
    }
    if ttl_ms > MAX_TTL_MS {
        return Err(ConfigError::Invalid {
            field: field.into(),
            reason: "must not exceed 24 hours (86400000ms)".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_cache_max_bytes_zero() {
        let config = AppConfig { cache_max_bytes: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "cache_max_bytes"));
    }

    #[test]
    fn test_validate_cache_max_bytes_exceeds_limit() {
        let config = AppConfig { cache_max_bytes: MAX_CACHE_BYTES + 1, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "cache_max_bytes"));
    }

    #[test]
    fn test_validate_ttl_zero() {
        let config = AppConfig { cache_ttl_ms: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "cache_ttl_ms"));
    }

    #[test]
    fn test_validate_result_ttl_exceeds_limit() {
        let config = AppConfig { result_cache_ttl_ms: Some(MAX_TTL_MS + 1), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "result_cache_ttl_ms"));
    }

    #[test]
    fn test_validate_empty_locale() {
        let config = AppConfig { default_locale: "  ".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Missing { field, .. }) if field == "default_locale"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig { cache_max_bytes: 1, cache_ttl_ms: 1, ..Default::default() };
        assert!(config.validate().is_ok());

        let config = AppConfig { cache_max_bytes: MAX_CACHE_BYTES, cache_ttl_ms: MAX_TTL_MS, ..Default::default() };
        assert!(config.validate().is_ok());
    }
}
