//! Entry point that wires a storage backend to the shared cache.
//!
//! One `ContentLoader` owns the cache for its lifetime; every manager and
//! every query builder it hands out shares that instance.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use quire_core::cache::key_mentions_model;
use quire_core::{
    AppConfig, BackendKind, CacheConfig, CacheStats, ContentCache, Error, Query, QueryBuilder, QueryExecutor,
    QueryResult,
};
use tracing::{debug, info};

use crate::json::{JsonContentManager, JsonQueryExecutor};
use crate::sqlite::{SqliteContentManager, SqliteQueryExecutor, SqliteSource};

/// Settings shared by both backends.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    pub default_locale: String,
    pub cache: CacheConfig,
    /// Memoize query results for this long unless a query opts out.
    pub result_cache_ttl: Option<Duration>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self { default_locale: "en".into(), cache: CacheConfig::default(), result_cache_ttl: None }
    }
}

impl From<&AppConfig> for LoaderOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            default_locale: config.default_locale.clone(),
            cache: config.cache_config(),
            result_cache_ttl: config.result_cache_ttl(),
        }
    }
}

/// Hands out query builders bound to one backend and one cache.
#[derive(Clone)]
pub struct ContentLoader {
    executor: Arc<dyn QueryExecutor>,
    cache: Arc<ContentCache>,
    result_cache_ttl: Option<Duration>,
    backend: BackendKind,
}

impl ContentLoader {
    /// Serve content from the JSON tree under `root`.
    pub fn json(root: impl Into<PathBuf>, options: LoaderOptions) -> Self {
        let root = root.into();
        let cache = Arc::new(ContentCache::new(options.cache));
        info!(root = %root.display(), locale = %options.default_locale, "opening json content");

        let content = Arc::new(JsonContentManager::new(root, cache.clone(), options.default_locale));
        Self {
            executor: Arc::new(JsonQueryExecutor::new(content)),
            cache,
            result_cache_ttl: options.result_cache_ttl,
            backend: BackendKind::Json,
        }
    }

    /// Serve content from the SQLite database at `path`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the database cannot be opened read-only.
    pub async fn sqlite(path: impl AsRef<Path>, options: LoaderOptions) -> Result<Self, Error> {
        let path = path.as_ref();
        let source = SqliteSource::open(path).await?;
        let cache = Arc::new(ContentCache::new(options.cache));
        info!(path = %path.display(), locale = %options.default_locale, "opening sqlite content");

        let content = Arc::new(SqliteContentManager::new(source, cache.clone(), options.default_locale));
        Ok(Self {
            executor: Arc::new(SqliteQueryExecutor::new(content)),
            cache,
            result_cache_ttl: options.result_cache_ttl,
            backend: BackendKind::Sqlite,
        })
    }

    /// Build the backend `config` selects.
    pub async fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let options = LoaderOptions::from(config);
        match config.backend {
            BackendKind::Json => Ok(Self::json(&config.content_dir, options)),
            BackendKind::Sqlite => Self::sqlite(&config.db_path, options).await,
        }
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    /// A fresh builder for `model`.
    pub fn query(&self, model: impl Into<String>) -> QueryBuilder {
        self.builder(Query::new(model))
    }

    /// A builder seeded with a complete declaration.
    pub fn query_from(&self, query: Query) -> QueryBuilder {
        self.builder(query)
    }

    /// Run `query` once, memoizing the result for `cache_ttl` if given.
    pub async fn execute(&self, query: Query, cache_ttl: Option<Duration>) -> Result<QueryResult, Error> {
        let builder = self.builder(query);
        match cache_ttl {
            Some(ttl) => builder.cache(ttl).get().await,
            None => builder.get().await,
        }
    }

    fn builder(&self, query: Query) -> QueryBuilder {
        QueryBuilder::from_query(self.executor.clone(), query)
            .with_result_cache(self.cache.clone(), self.result_cache_ttl)
    }

    /// Drop cached data for `model`, or everything when `None`.
    ///
    /// Memoized query results are dropped either way since they may embed
    /// related records of any model. Returns the number of entries removed.
    pub async fn invalidate(&self, model: Option<&str>) -> usize {
        let removed = match model {
            Some(model) => {
                self.cache.delete_matching(|key| key.starts_with("query:") || key_mentions_model(key, model)).await
            }
            None => {
                let entries = self.cache.len().await;
                self.cache.clear().await;
                entries
            }
        };
        debug!(model = model.unwrap_or("*"), removed, "invalidated cache");
        removed
    }

    pub async fn clear(&self) {
        self.cache.clear().await;
    }

    pub async fn stats(&self) -> CacheStats {
        self.cache.stats().await
    }
}
