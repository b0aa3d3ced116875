//! Relation resolution for JSON content.
//!
//! Foreign keys live on the source record under the relation field id: a
//! single id for one-to-one relations, an id or a list of ids for
//! one-to-many relations.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use quire_core::model::{Record, RelationKind, id_key};
use quire_core::Error;
use serde_json::Value;

use super::content::JsonContentManager;
use crate::relation::{RelationResolver, ResolvedRelation, select_targets};

/// Resolves relation fields against target model content files.
#[derive(Clone)]
pub struct JsonRelationManager {
    content: Arc<JsonContentManager>,
}

impl JsonRelationManager {
    pub fn new(content: Arc<JsonContentManager>) -> Self {
        Self { content }
    }
}

fn foreign_keys(value: &Value, kind: RelationKind) -> Vec<String> {
    match (value, kind) {
        (Value::Array(items), RelationKind::OneToMany) => items.iter().filter_map(id_key).collect(),
        (Value::Array(items), RelationKind::OneToOne) => items.first().and_then(id_key).into_iter().collect(),
        (value, _) => id_key(value).into_iter().collect(),
    }
}

#[async_trait]
impl RelationResolver for JsonRelationManager {
    async fn resolve_relation(
        &self,
        model_id: &str,
        relation: &str,
        sources: &[Record],
        locale: Option<&str>,
    ) -> Result<ResolvedRelation, Error> {
        let descriptor = self.content.load_model_config(model_id).await?;
        let spec = descriptor.relation(relation)?;

        let mut links = HashMap::new();
        let mut wanted = Vec::new();
        let mut seen = HashSet::new();
        for source in sources {
            let Some(value) = source.get(&spec.field_id).filter(|v| !v.is_null()) else {
                continue;
            };
            let ids = foreign_keys(value, spec.kind);
            for id in &ids {
                if seen.insert(id.clone()) {
                    wanted.push(id.clone());
                }
            }
            if let Some(source_id) = source.id_key() {
                links.insert(source_id, ids);
            }
        }
        if wanted.is_empty() {
            return Ok(ResolvedRelation::new(spec, Vec::new(), links));
        }

        let targets = self.content.load_model_content(&spec.target_model, locale).await?;
        let records = select_targets(model_id, &spec, &wanted, &targets)?;
        Ok(ResolvedRelation::new(spec, records, links))
    }
}
