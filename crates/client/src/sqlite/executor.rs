//! Query execution against the content database.
//!
//! Top-level includes are joined into the main statement; their own nested
//! includes are resolved afterwards through the relation manager.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use quire_core::model::{ModelDescriptor, Record, RelationKind, id_key, to_snake_case};
use quire_core::query::{Include, Query, QueryExecutor, QueryResult, Related, ResolvedRecord};
use quire_core::Error;
use serde_json::Value;
use tracing::debug;

use super::compiler::{JoinPlan, LINK_COLUMN, RELATION_SEPARATOR, TableShape, compile};
use super::connection::Row;
use super::content::SqliteContentManager;
use super::relation::SqliteRelationManager;
use crate::relation::resolve_includes;

/// Compiles queries to SQL and shapes the joined rows into records.
#[derive(Clone)]
pub struct SqliteQueryExecutor {
    content: Arc<SqliteContentManager>,
    relations: SqliteRelationManager,
}

impl SqliteQueryExecutor {
    pub fn new(content: Arc<SqliteContentManager>) -> Self {
        let relations = SqliteRelationManager::new(content.clone());
        Self { content, relations }
    }

    pub fn content(&self) -> &Arc<SqliteContentManager> {
        &self.content
    }

    pub fn relations(&self) -> &SqliteRelationManager {
        &self.relations
    }

    async fn shape(&self, model_id: &str) -> Result<TableShape, Error> {
        let main_columns = self.content.get_main_columns(model_id).await?.as_ref().clone();
        let translation_columns = if self.content.has_translations(model_id).await {
            Some(self.content.get_translation_columns(model_id).await?.as_ref().clone())
        } else {
            None
        };
        Ok(TableShape { model_id: model_id.to_string(), main_columns, translation_columns })
    }

    async fn plan_joins(
        &self,
        descriptor: &ModelDescriptor,
        shape: &TableShape,
        query: &Query,
    ) -> Result<Vec<JoinPlan>, Error> {
        let mut joins = Vec::with_capacity(query.includes.len());
        for include in &query.includes {
            let spec = descriptor.relation(&include.relation)?;
            self.content.load_model_config(&spec.target_model).await?;
            let target = self.shape(&spec.target_model).await?;
            let requested = include.locale.as_deref().or(query.locale.as_deref());
            let locale = self.content.resolve_locale(&spec.target_model, requested).await?;

            let foreign_key = format!("{}_id", to_snake_case(&spec.field_id));
            let foreign_key = (spec.kind == RelationKind::OneToOne && shape.main_columns.contains(&foreign_key))
                .then_some(foreign_key);

            joins.push(JoinPlan { name: include.relation.clone(), spec, target, locale, foreign_key });
        }
        Ok(joins)
    }

    /// Resolve the nested includes of one joined relation for every parent.
    async fn resolve_nested(
        &self,
        data: &mut [ResolvedRecord],
        join: &JoinPlan,
        include: &Include,
        locale: Option<&str>,
    ) -> Result<(), Error> {
        let mut seen = HashSet::new();
        let mut targets = Vec::new();
        for parent in data.iter() {
            let related: &[ResolvedRecord] = match parent.relation(&join.name) {
                Some(Related::One(target)) => std::slice::from_ref(target.as_ref()),
                Some(Related::Many(items)) => items,
                None => &[],
            };
            for target in related {
                if target.record.id_key().is_some_and(|id| seen.insert(id)) {
                    targets.push(target.record.clone());
                }
            }
        }

        let locale = include.locale.as_deref().or(locale);
        let resolved =
            resolve_includes(&self.relations, &join.spec.target_model, targets, &include.includes, locale).await?;
        let by_id: HashMap<String, ResolvedRecord> =
            resolved.into_iter().filter_map(|r| Some((r.record.id_key()?, r))).collect();

        let replace = |target: &mut ResolvedRecord| {
            if let Some(resolved) = target.record.id_key().and_then(|id| by_id.get(&id)) {
                *target = resolved.clone();
            }
        };
        for parent in data.iter_mut() {
            match parent.relations.get_mut(&join.name) {
                Some(Related::One(target)) => replace(target.as_mut()),
                Some(Related::Many(items)) => items.iter_mut().for_each(replace),
                None => {}
            }
        }
        Ok(())
    }
}

/// Split a joined row into the main record's columns and each join's columns.
fn split_row(row: Row, joins: &[JoinPlan]) -> (Row, Vec<Row>) {
    let mut main = Row::new();
    let mut related = vec![Row::new(); joins.len()];
    for (column, value) in row {
        let join = column
            .split_once(RELATION_SEPARATOR)
            .and_then(|(name, field)| Some((joins.iter().position(|j| j.name == name)?, field.to_string())));
        match join {
            Some((i, field)) => {
                related[i].insert(field, value);
            }
            None => {
                main.insert(column, value);
            }
        }
    }
    (main, related)
}

/// The joined target of one row, if the row links to one.
///
/// A link or foreign key whose target row is absent is a dangling relation.
fn joined_target(model_id: &str, join: &JoinPlan, main: &Row, mut row: Row) -> Result<Option<Record>, Error> {
    let link = match &join.foreign_key {
        Some(foreign_key) => main.get(foreign_key).cloned(),
        None => row.remove(LINK_COLUMN),
    };
    let Some(link) = link.filter(|v| !v.is_null()) else {
        return Ok(None);
    };
    if row.get("id").is_none_or(Value::is_null) {
        return Err(Error::Relation(format!(
            "relation '{}' of model '{model_id}' points at missing {} record '{}'",
            join.name,
            join.spec.target_model,
            id_key(&link).unwrap_or_default()
        )));
    }
    Ok(Some(Record::new(row)))
}

/// Fold joined rows into one record per main id, in row order.
fn group_rows(model_id: &str, rows: Vec<Row>, joins: &[JoinPlan]) -> Result<Vec<ResolvedRecord>, Error> {
    let mut records: Vec<ResolvedRecord> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut linked = vec![false; joins.len()];

    for row in rows {
        let (main, related) = split_row(row, joins);
        let targets = joins
            .iter()
            .zip(related)
            .map(|(join, row)| joined_target(model_id, join, &main, row))
            .collect::<Result<Vec<_>, _>>()?;
        for (seen, target) in linked.iter_mut().zip(&targets) {
            *seen |= target.is_some();
        }

        let Some(id) = main.get("id").and_then(id_key) else {
            continue;
        };
        let position = match positions.get(&id) {
            Some(&position) => position,
            None => {
                let mut record = ResolvedRecord::from(Record::new(main));
                for join in joins.iter().filter(|j| j.spec.kind == RelationKind::OneToMany) {
                    record.relations.insert(join.name.clone(), Related::Many(Vec::new()));
                }
                records.push(record);
                positions.insert(id, records.len() - 1);
                records.len() - 1
            }
        };

        let parent = &mut records[position];
        for (join, target) in joins.iter().zip(targets) {
            let Some(target) = target else {
                continue;
            };
            match parent.relations.get_mut(&join.name) {
                Some(Related::Many(items)) => {
                    if !items.iter().any(|item| item.record.id() == target.id()) {
                        items.push(target.into());
                    }
                }
                Some(Related::One(_)) => {}
                None => {
                    parent.relations.insert(join.name.clone(), Related::One(Box::new(target.into())));
                }
            }
        }
    }

    // Link-table relations with no link for any parent, as the relation manager reports them.
    if !records.is_empty() {
        let unlinked = joins.iter().zip(&linked).find(|(join, seen)| join.foreign_key.is_none() && !**seen);
        if let Some((join, _)) = unlinked {
            return Err(Error::Relation(format!(
                "no relations found for field '{}' of model '{model_id}'",
                join.spec.field_id
            )));
        }
    }
    Ok(records)
}

#[async_trait]
impl QueryExecutor for SqliteQueryExecutor {
    async fn execute(&self, query: &Query) -> Result<QueryResult, Error> {
        query.validate()?;
        let descriptor = self.content.load_model_config(&query.model).await?;
        let shape = self.shape(&query.model).await?;
        let locale = self.content.resolve_locale(&query.model, query.locale.as_deref()).await?;
        let joins = self.plan_joins(&descriptor, &shape, query).await?;

        let compiled = compile(query, &descriptor, &shape, locale.as_deref(), &joins)?;
        debug!(model = %query.model, sql = %compiled.sql, params = compiled.params.len(), "compiled query");

        let source = self.content.source();
        let rows = source
            .query(compiled.sql, compiled.params)
            .await
            .map_err(|e| e.context(format!("querying model '{}'", query.model)))?;
        let total = source
            .get(compiled.count_sql, compiled.count_params)
            .await
            .map_err(|e| e.context(format!("counting model '{}'", query.model)))?
            .and_then(|row| row.get("total").and_then(Value::as_u64))
            .map_or(0, |n| usize::try_from(n).unwrap_or(usize::MAX));

        let mut data = group_rows(&query.model, rows, &joins)?;
        for (join, include) in joins.iter().zip(&query.includes) {
            if !include.includes.is_empty() {
                self.resolve_nested(&mut data, join, include, query.locale.as_deref()).await?;
            }
        }

        debug!(model = %query.model, total, returned = data.len(), "executed sqlite query");
        Ok(QueryResult::new(data, total, query.limit(), query.offset()))
    }
}
