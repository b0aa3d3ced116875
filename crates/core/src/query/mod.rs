//! Backend-agnostic query declaration and result shape.
//!
//! A [`Query`] is plain data: it is accumulated by a [`QueryBuilder`] and
//! handed to a [`QueryExecutor`], which loads, filters, resolves includes,
//! sorts, counts and paginates in that order.

pub mod builder;

use std::collections::BTreeMap;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Error;
use crate::model::Record;
use crate::operator::Operator;

pub use builder::QueryBuilder;

/// One `field <op> value` condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// A request to attach related records, optionally with nested includes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Include {
    pub relation: String,
    /// Locale override for the related records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<Include>,
}

impl Include {
    pub fn new(relation: impl Into<String>) -> Self {
        Self { relation: relation.into(), locale: None, includes: Vec::new() }
    }

    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn include(mut self, nested: Include) -> Self {
        self.includes.push(nested);
        self
    }
}

/// A complete query declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub model: String,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub sorting: Vec<Sort>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
    #[serde(default)]
    pub includes: Vec<Include>,
    #[serde(default)]
    pub locale: Option<String>,
}

impl Query {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            filters: Vec::new(),
            sorting: Vec::new(),
            pagination: None,
            includes: Vec::new(),
            locale: None,
        }
    }

    pub fn limit(&self) -> Option<usize> {
        self.pagination.and_then(|p| p.limit)
    }

    pub fn offset(&self) -> usize {
        self.pagination.and_then(|p| p.offset).unwrap_or(0)
    }

    /// Checks that do not need any model metadata.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` for an empty model name, empty field names,
    /// or an empty locale.
    pub fn validate(&self) -> Result<(), Error> {
        if self.model.trim().is_empty() {
            return Err(Error::Validation("model must not be empty".into()));
        }
        if let Some(filter) = self.filters.iter().find(|f| f.field.is_empty()) {
            return Err(Error::Validation(format!("filter with operator '{}' has no field", filter.operator)));
        }
        if self.sorting.iter().any(|s| s.field.is_empty()) {
            return Err(Error::Validation("sort field must not be empty".into()));
        }
        if self.locale.as_deref().is_some_and(|l| l.trim().is_empty()) {
            return Err(Error::Validation("locale must not be empty".into()));
        }
        Ok(())
    }
}

/// Related data attached to a result record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Related {
    One(Box<ResolvedRecord>),
    Many(Vec<ResolvedRecord>),
}

impl Related {
    pub fn as_one(&self) -> Option<&ResolvedRecord> {
        match self {
            Related::One(record) => Some(record),
            Related::Many(_) => None,
        }
    }

    pub fn as_many(&self) -> Option<&[ResolvedRecord]> {
        match self {
            Related::One(_) => None,
            Related::Many(records) => Some(records),
        }
    }
}

/// A record paired with the relations resolved for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedRecord {
    #[serde(flatten)]
    pub record: Record,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub relations: BTreeMap<String, Related>,
}

impl ResolvedRecord {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.record.get(field)
    }

    pub fn relation(&self, name: &str) -> Option<&Related> {
        self.relations.get(name)
    }
}

impl From<Record> for ResolvedRecord {
    fn from(record: Record) -> Self {
        Self { record, relations: BTreeMap::new() }
    }
}

/// Pagination echo on a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub limit: Option<usize>,
    pub offset: usize,
    pub has_more: bool,
}

/// The uniform result of every query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub data: Vec<ResolvedRecord>,
    /// Matches after filtering, before pagination.
    pub total: usize,
    pub pagination: PageInfo,
}

impl QueryResult {
    /// Shape a page, computing `hasMore` from the page position.
    pub fn new(data: Vec<ResolvedRecord>, total: usize, limit: Option<usize>, offset: usize) -> Self {
        let has_more = offset + data.len() < total;
        Self { data, total, pagination: PageInfo { limit, offset, has_more } }
    }
}

/// Runs a query declaration against one storage backend.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, query: &Query) -> Result<QueryResult, Error>;
}

/// Slice `items` according to `offset` and `limit`.
pub fn paginate<T>(items: Vec<T>, limit: Option<usize>, offset: usize) -> Vec<T> {
    let iter = items.into_iter().skip(offset);
    match limit {
        Some(limit) => iter.take(limit).collect(),
        None => iter.collect(),
    }
}
