//! Relation resolution through the `tbl_relations` link table.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use quire_core::cache::{CachedValue, cache_key, compute_digest};
use quire_core::model::{Record, RelationKind, id_key};
use quire_core::Error;
use tokio_rusqlite::rusqlite::types::Value as SqlValue;

use super::content::{RELATIONS_TABLE, SqliteContentManager, quote_ident};
use crate::relation::{RelationResolver, ResolvedRelation, select_targets};

/// Resolves relation fields from stored links.
#[derive(Clone)]
pub struct SqliteRelationManager {
    content: Arc<SqliteContentManager>,
}

impl SqliteRelationManager {
    pub fn new(content: Arc<SqliteContentManager>) -> Self {
        Self { content }
    }

    /// Link rows `(source_id, target_id)` of `field_id` for `source_ids`, in
    /// insertion order.
    async fn load_links(
        &self,
        model_id: &str,
        target_model: &str,
        field_id: &str,
        source_ids: &[String],
    ) -> Result<Arc<Vec<Record>>, Error> {
        let digest = compute_digest(&source_ids)?;
        let key = cache_key("links", &[model_id, target_model], &format!("{field_id}:{digest}"));
        if let Some(CachedValue::Records(links)) = self.content.cache().get(&key).await {
            return Ok(links);
        }

        let sql = format!(
            "SELECT source_id, target_id FROM {} \
             WHERE source_model = ? AND field_id = ? AND source_id IN ({}) ORDER BY rowid",
            quote_ident(RELATIONS_TABLE),
            vec!["?"; source_ids.len()].join(", ")
        );
        let mut params = vec![SqlValue::Text(model_id.to_string()), SqlValue::Text(field_id.to_string())];
        params.extend(source_ids.iter().cloned().map(SqlValue::Text));

        let links: Vec<Record> = self
            .content
            .source()
            .query(sql, params)
            .await
            .map_err(|e| e.context(format!("loading links of '{field_id}' on model '{model_id}'")))?
            .into_iter()
            .map(Record::new)
            .collect();

        let links = Arc::new(links);
        self.content.cache().set(&key, CachedValue::Records(links.clone()), None).await?;
        Ok(links)
    }
}

#[async_trait]
impl RelationResolver for SqliteRelationManager {
    async fn resolve_relation(
        &self,
        model_id: &str,
        relation: &str,
        sources: &[Record],
        locale: Option<&str>,
    ) -> Result<ResolvedRelation, Error> {
        let descriptor = self.content.load_model_config(model_id).await?;
        let spec = descriptor.relation(relation)?;

        let mut seen = HashSet::new();
        let source_ids: Vec<String> =
            sources.iter().filter_map(Record::id_key).filter(|id| seen.insert(id.clone())).collect();
        if source_ids.is_empty() {
            return Ok(ResolvedRelation::empty(spec));
        }

        let rows = self.load_links(model_id, &spec.target_model, &spec.field_id, &source_ids).await?;
        if rows.is_empty() {
            return Err(Error::Relation(format!("no relations found for field '{relation}' of model '{model_id}'")));
        }

        let mut links: HashMap<String, Vec<String>> = HashMap::new();
        let mut wanted = Vec::new();
        let mut wanted_seen = HashSet::new();
        for row in rows.iter() {
            let (Some(source), Some(target)) =
                (row.get("source_id").and_then(id_key), row.get("target_id").and_then(id_key))
            else {
                continue;
            };
            if wanted_seen.insert(target.clone()) {
                wanted.push(target.clone());
            }
            let targets = links.entry(source).or_default();
            if spec.kind == RelationKind::OneToMany || targets.is_empty() {
                targets.push(target);
            }
        }

        let records = self.content.load_model_content(&spec.target_model, locale).await?;
        let targets = select_targets(model_id, &spec, &wanted, &records)?;
        Ok(ResolvedRelation::new(spec, targets, links))
    }
}
