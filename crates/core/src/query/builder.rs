//! Fluent query declaration.
//!
//! Chained calls only accumulate the declaration; `get`, `first` and `count`
//! hand it to the executor. A builder can be executed any number of times.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::Error;
use crate::cache::{CachedValue, ContentCache, cache_key, compute_digest};
use crate::operator::Operator;
use crate::query::{Filter, Include, Pagination, Query, QueryExecutor, QueryResult, ResolvedRecord, Sort, SortDirection};

/// Accumulates a [`Query`] and executes it on demand.
#[derive(Clone)]
pub struct QueryBuilder {
    executor: Arc<dyn QueryExecutor>,
    query: Query,
    result_cache: Option<Arc<ContentCache>>,
    cache_ttl: Option<Duration>,
    /// First declaration error, reported when the query runs.
    invalid: Option<String>,
}

impl QueryBuilder {
    pub fn new(executor: Arc<dyn QueryExecutor>, model: impl Into<String>) -> Self {
        Self::from_query(executor, Query::new(model))
    }

    /// Start from a complete declaration, e.g. one deserialized from a request.
    pub fn from_query(executor: Arc<dyn QueryExecutor>, query: Query) -> Self {
        Self { executor, query, result_cache: None, cache_ttl: None, invalid: None }
    }

    /// Memoize results in `cache`; `default_ttl` turns caching on for every
    /// execution unless the caller opts out with [`no_cache`](Self::no_cache).
    pub fn with_result_cache(mut self, cache: Arc<ContentCache>, default_ttl: Option<Duration>) -> Self {
        self.result_cache = Some(cache);
        self.cache_ttl = default_ttl;
        self
    }

    pub fn where_(mut self, field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        self.query.filters.push(Filter { field: field.into(), operator, value: value.into() });
        self
    }

    /// Like [`where_`](Self::where_) with the operator given by name.
    pub fn where_op(self, field: impl Into<String>, operator: &str, value: impl Into<Value>) -> Self {
        match operator.parse::<Operator>() {
            Ok(op) => self.where_(field, op, value),
            Err(e) => self.invalidate(e.to_string()),
        }
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sorting.push(Sort { field: field.into(), direction });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.pagination.get_or_insert_with(Pagination::default).limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.query.pagination.get_or_insert_with(Pagination::default).offset = Some(offset);
        self
    }

    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.query.locale = Some(locale.into());
        self
    }

    pub fn include(self, relation: impl Into<String>) -> Self {
        self.include_with(Include::new(relation))
    }

    /// Include with a locale override or nested includes.
    pub fn include_with(mut self, include: Include) -> Self {
        self.query.includes.push(include);
        self
    }

    /// Cache results of this query for `ttl`.
    pub fn cache(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Always execute against storage.
    pub fn no_cache(mut self) -> Self {
        self.cache_ttl = None;
        self
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    fn invalidate(mut self, reason: String) -> Self {
        self.invalid.get_or_insert(reason);
        self
    }

    /// Run the query and return the page.
    pub async fn get(&self) -> Result<QueryResult, Error> {
        self.run(&self.query).await
    }

    /// First record of the result, if any.
    pub async fn first(&self) -> Result<Option<ResolvedRecord>, Error> {
        let mut query = self.query.clone();
        query.pagination.get_or_insert_with(Pagination::default).limit = Some(1);
        let result = self.run(&query).await?;
        Ok(result.data.into_iter().next())
    }

    /// Number of records matching the filters.
    pub async fn count(&self) -> Result<usize, Error> {
        Ok(self.get().await?.total)
    }

    async fn run(&self, query: &Query) -> Result<QueryResult, Error> {
        if let Some(reason) = &self.invalid {
            return Err(Error::Validation(reason.clone()));
        }
        query.validate()?;

        let (Some(cache), Some(ttl)) = (&self.result_cache, self.cache_ttl) else {
            return self.executor.execute(query).await;
        };

        let key = cache_key("query", &[&query.model], &compute_digest(query)?);
        if let Some(CachedValue::Result(result)) = cache.get(&key).await {
            return Ok(result.as_ref().clone());
        }

        let result = self.executor.execute(query).await?;
        cache.set(&key, CachedValue::Result(Arc::new(result.clone())), Some(ttl)).await?;
        Ok(result)
    }
}
