//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (QUIRE_*)
//! 2. TOML config file (if QUIRE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;

mod validation;

pub use validation::ConfigError;

/// Which storage backend serves queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Json,
    Sqlite,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (QUIRE_*)
/// 2. TOML config file (if QUIRE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Storage backend to query.
    ///
    /// Set via QUIRE_BACKEND environment variable (`json` or `sqlite`).
    #[serde(default = "default_backend")]
    pub backend: BackendKind,

    /// Root directory of the JSON content tree.
    ///
    /// Set via QUIRE_CONTENT_DIR environment variable.
    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,

    /// Path to the read-only SQLite content database.
    ///
    /// Set via QUIRE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Locale used when a query or include names none.
    ///
    /// Set via QUIRE_DEFAULT_LOCALE environment variable.
    #[serde(default = "default_locale")]
    pub default_locale: String,

    /// Whether the in-process cache is active.
    ///
    /// Set via QUIRE_CACHE_ENABLED environment variable.
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    /// Cache size budget in bytes of serialized values.
    ///
    /// Set via QUIRE_CACHE_MAX_BYTES environment variable.
    #[serde(default = "default_cache_max_bytes")]
    pub cache_max_bytes: usize,

    /// Default cache entry lifetime in milliseconds.
    ///
    /// Set via QUIRE_CACHE_TTL_MS environment variable.
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,

    /// Lifetime of memoized query results; unset disables result caching
    /// unless a query asks for it.
    ///
    /// Set via QUIRE_RESULT_CACHE_TTL_MS environment variable.
    #[serde(default)]
    pub result_cache_ttl_ms: Option<u64>,
}

fn default_backend() -> BackendKind {
    BackendKind::Json
}

fn default_content_dir() -> PathBuf {
    PathBuf::from("./content")
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./content.sqlite")
}

fn default_locale() -> String {
    "en".into()
}

fn default_true() -> bool {
    true
}

fn default_cache_max_bytes() -> usize {
    52_428_800 // 50MB
}

fn default_cache_ttl_ms() -> u64 {
    300_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            content_dir: default_content_dir(),
            db_path: default_db_path(),
            default_locale: default_locale(),
            cache_enabled: true,
            cache_max_bytes: default_cache_max_bytes(),
            cache_ttl_ms: default_cache_ttl_ms(),
            result_cache_ttl_ms: None,
        }
    }
}

impl AppConfig {
    /// Default cache TTL as Duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    /// Result cache TTL as Duration, if result caching is on by default.
    pub fn result_cache_ttl(&self) -> Option<Duration> {
        self.result_cache_ttl_ms.map(Duration::from_millis)
    }

    /// Cache settings derived from this configuration.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig { max_size_bytes: self.cache_max_bytes, default_ttl: self.cache_ttl(), enabled: self.cache_enabled }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `QUIRE_`
    /// 2. TOML file from `QUIRE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("QUIRE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("QUIRE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
