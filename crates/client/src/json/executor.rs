//! In-memory query execution over JSON content.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use quire_core::model::{ModelDescriptor, Record};
use quire_core::operator::{compare, evaluate};
use quire_core::query::{Query, QueryExecutor, QueryResult, Related, ResolvedRecord, Sort, SortDirection, paginate};
use quire_core::Error;
use serde_json::Value;
use tracing::debug;

use super::content::JsonContentManager;
use super::relation::JsonRelationManager;
use crate::relation::resolve_includes;

/// Executes queries by loading a model's records and working on them in memory.
#[derive(Clone)]
pub struct JsonQueryExecutor {
    content: Arc<JsonContentManager>,
    relations: JsonRelationManager,
}

impl JsonQueryExecutor {
    pub fn new(content: Arc<JsonContentManager>) -> Self {
        let relations = JsonRelationManager::new(content.clone());
        Self { content, relations }
    }

    pub fn content(&self) -> &Arc<JsonContentManager> {
        &self.content
    }

    pub fn relations(&self) -> &JsonRelationManager {
        &self.relations
    }
}

/// Reject declarations the model cannot answer before touching any content.
fn check_declaration(descriptor: &ModelDescriptor, query: &Query) -> Result<(), Error> {
    if query.locale.is_none() {
        let fields =
            query.filters.iter().map(|f| f.field.as_str()).chain(query.sorting.iter().map(|s| s.field.as_str()));
        for field in fields {
            if descriptor.is_translatable(field) {
                return Err(Error::Validation(format!(
                    "field '{field}' of model '{}' is localized; set a locale to filter or sort on it",
                    descriptor.model_id
                )));
            }
        }
    }
    for include in &query.includes {
        descriptor.relation(&include.relation)?;
    }
    Ok(())
}

/// Value of `path` on a record; dotted paths read through one-to-one relations.
fn sort_value<'a>(record: &'a ResolvedRecord, path: &str) -> Option<&'a Value> {
    if let Some(value) = record.get(path) {
        return Some(value);
    }
    let (relation, rest) = path.split_once('.')?;
    match record.relation(relation)? {
        Related::One(related) => sort_value(related, rest),
        Related::Many(_) => None,
    }
}

fn sort_records(records: &mut [ResolvedRecord], sorting: &[Sort]) {
    if sorting.is_empty() {
        return;
    }
    records.sort_by(|a, b| {
        for sort in sorting {
            let ord = compare(sort_value(a, &sort.field), sort_value(b, &sort.field));
            let ord = if sort.direction == SortDirection::Desc { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

#[async_trait]
impl QueryExecutor for JsonQueryExecutor {
    async fn execute(&self, query: &Query) -> Result<QueryResult, Error> {
        query.validate()?;
        let descriptor = self.content.load_model_config(&query.model).await?;
        check_declaration(&descriptor, query)?;

        let records = self.content.load_model_content(&query.model, query.locale.as_deref()).await?;
        let matched: Vec<Record> = records
            .iter()
            .filter(|r| query.filters.iter().all(|f| evaluate(r.get(&f.field), f.operator, &f.value)))
            .cloned()
            .collect();

        let mut resolved =
            resolve_includes(&self.relations, &query.model, matched, &query.includes, query.locale.as_deref()).await?;
        sort_records(&mut resolved, &query.sorting);

        let total = resolved.len();
        let page = paginate(resolved, query.limit(), query.offset());
        debug!(model = %query.model, total, returned = page.len(), "executed json query");
        Ok(QueryResult::new(page, total, query.limit(), query.offset()))
    }
}
