//! Include resolution shared by both backends.
//!
//! A backend only has to answer "which target records does this relation
//! point at for these sources"; attaching them to the parents and walking
//! nested includes is the same everywhere.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use quire_core::model::{Record, RelationKind, RelationSpec};
use quire_core::query::{Include, Related, ResolvedRecord};
use quire_core::Error;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Targets of one relation field for a batch of source records.
#[derive(Debug, Clone)]
pub struct ResolvedRelation {
    pub spec: RelationSpec,
    /// Unique target records, in first-referenced order.
    records: Vec<Record>,
    /// Source id to target ids, in link order.
    links: HashMap<String, Vec<String>>,
}

impl ResolvedRelation {
    pub fn new(spec: RelationSpec, records: Vec<Record>, links: HashMap<String, Vec<String>>) -> Self {
        Self { spec, records, links }
    }

    pub fn empty(spec: RelationSpec) -> Self {
        Self::new(spec, Vec::new(), HashMap::new())
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Target ids linked from `source_id`, if the source has any link.
    pub fn targets_of(&self, source_id: &str) -> Option<&[String]> {
        self.links.get(source_id).map(Vec::as_slice)
    }
}

/// Resolves relation fields of one storage backend.
#[async_trait]
pub trait RelationResolver: Send + Sync {
    /// Resolve `relation` of `model_id` for `sources`, loading targets in
    /// `locale` (or the default locale).
    ///
    /// # Errors
    ///
    /// Returns `Error::Relation` for an unknown relation field or a link
    /// that points at a missing target record.
    async fn resolve_relation(
        &self,
        model_id: &str,
        relation: &str,
        sources: &[Record],
        locale: Option<&str>,
    ) -> Result<ResolvedRelation, Error>;
}

/// Pick the records with ids in `wanted` out of `targets`, in `wanted` order.
///
/// # Errors
///
/// Returns `Error::Relation` naming the missing ids if any is absent.
pub fn select_targets(
    model_id: &str,
    spec: &RelationSpec,
    wanted: &[String],
    targets: &[Record],
) -> Result<Vec<Record>, Error> {
    let index: HashMap<String, &Record> = targets.iter().filter_map(|r| Some((r.id_key()?, r))).collect();

    let missing: Vec<&str> = wanted.iter().filter(|id| !index.contains_key(*id)).map(String::as_str).collect();
    if let Some(first) = missing.first() {
        let relation = &spec.field_id;
        return Err(match spec.kind {
            RelationKind::OneToOne => Error::Relation(format!(
                "relation '{relation}' of model '{model_id}' points at missing {} record '{first}'",
                spec.target_model
            )),
            RelationKind::OneToMany => Error::Relation(format!(
                "relation '{relation}' of model '{model_id}' expected {} {} records, found {}; missing ids: {}",
                wanted.len(),
                spec.target_model,
                wanted.len() - missing.len(),
                missing.join(", ")
            )),
        });
    }

    Ok(wanted.iter().filter_map(|id| index.get(id).map(|r| (*r).clone())).collect())
}

/// Attach every include (and nested include) to `records`.
///
/// An include's own locale overrides the inherited one for that subtree.
pub fn resolve_includes<'a>(
    resolver: &'a dyn RelationResolver,
    model_id: &'a str,
    records: Vec<Record>,
    includes: &'a [Include],
    locale: Option<&'a str>,
) -> BoxFuture<'a, Result<Vec<ResolvedRecord>, Error>> {
    Box::pin(async move {
        if includes.is_empty() || records.is_empty() {
            return Ok(records.into_iter().map(ResolvedRecord::from).collect());
        }

        let mut resolved: Vec<ResolvedRecord> = records.iter().cloned().map(ResolvedRecord::from).collect();
        for include in includes {
            let locale = include.locale.as_deref().or(locale);
            let relation = resolver
                .resolve_relation(model_id, &include.relation, &records, locale)
                .await
                .map_err(|e| e.context(format!("including '{}' on model '{model_id}'", include.relation)))?;

            let targets = resolve_includes(
                resolver,
                &relation.spec.target_model,
                relation.records.clone(),
                &include.includes,
                locale,
            )
            .await?;

            attach(&mut resolved, &include.relation, &relation, targets);
        }
        Ok(resolved)
    })
}

/// Attach resolved `targets` to each parent under `name`.
///
/// Parents without links get nothing for one-to-one relations and an empty
/// list for one-to-many relations.
pub fn attach(parents: &mut [ResolvedRecord], name: &str, relation: &ResolvedRelation, targets: Vec<ResolvedRecord>) {
    let by_id: HashMap<String, ResolvedRecord> =
        targets.into_iter().filter_map(|t| Some((t.record.id_key()?, t))).collect();

    for parent in parents {
        let target_ids = parent.record.id_key().and_then(|id| relation.targets_of(&id)).unwrap_or_default();
        let related = match relation.spec.kind {
            RelationKind::OneToOne => target_ids
                .first()
                .and_then(|id| by_id.get(id))
                .map(|target| Related::One(Box::new(target.clone()))),
            RelationKind::OneToMany => {
                Some(Related::Many(target_ids.iter().filter_map(|id| by_id.get(id).cloned()).collect()))
            }
        };
        if let Some(related) = related {
            parent.relations.insert(name.to_string(), related);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_core::ErrorKind;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        Record::from_value(value).unwrap()
    }

    /// Resolves `author` (one-to-one) on posts and `country` on authors.
    struct StaticResolver;

    #[async_trait]
    impl RelationResolver for StaticResolver {
        async fn resolve_relation(
            &self,
            model_id: &str,
            relation: &str,
            sources: &[Record],
            locale: Option<&str>,
        ) -> Result<ResolvedRelation, Error> {
            let (target, targets) = match (model_id, relation) {
                ("posts", "author") => (
                    "authors",
                    vec![record(json!({ "id": "a1", "name": "Ada", "locale": locale }))],
                ),
                ("authors", "country") => ("countries", vec![record(json!({ "id": "uk", "locale": locale }))]),
                _ => return Err(Error::Relation(format!("unknown relation '{relation}'"))),
            };
            let links = sources
                .iter()
                .filter_map(|s| s.id_key())
                .map(|id| (id, targets.iter().filter_map(Record::id_key).collect()))
                .collect();
            let spec =
                RelationSpec { field_id: relation.into(), target_model: target.into(), kind: RelationKind::OneToOne };
            Ok(ResolvedRelation::new(spec, targets, links))
        }
    }

    #[tokio::test]
    async fn test_nested_includes_inherit_locale() {
        let posts = vec![record(json!({ "id": "p1" }))];
        let includes = vec![Include::new("author").locale("tr").include(Include::new("country"))];

        let resolved = resolve_includes(&StaticResolver, "posts", posts, &includes, Some("en")).await.unwrap();

        let author = resolved[0].relation("author").and_then(Related::as_one).unwrap();
        assert_eq!(author.get("locale"), Some(&json!("tr")));
        let country = author.relation("country").and_then(Related::as_one).unwrap();
        assert_eq!(country.get("id"), Some(&json!("uk")));
        assert_eq!(country.get("locale"), Some(&json!("tr")));
    }

    #[tokio::test]
    async fn test_unknown_include_is_relation_error() {
        let posts = vec![record(json!({ "id": "p1" }))];
        let includes = vec![Include::new("editor")];
        let err = resolve_includes(&StaticResolver, "posts", posts, &includes, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Relation);
    }

    #[test]
    fn test_attach_one_to_many_without_links() {
        let spec = RelationSpec { field_id: "tags".into(), target_model: "tags".into(), kind: RelationKind::OneToMany };
        let links = HashMap::from([("p1".to_string(), vec!["t2".to_string(), "t1".to_string()])]);
        let relation = ResolvedRelation::new(spec, Vec::new(), links);
        let targets = vec![record(json!({ "id": "t1" })).into(), record(json!({ "id": "t2" })).into()];

        let mut parents: Vec<ResolvedRecord> =
            vec![record(json!({ "id": "p1" })).into(), record(json!({ "id": "p2" })).into()];
        attach(&mut parents, "tags", &relation, targets);

        let tags = parents[0].relation("tags").and_then(Related::as_many).unwrap();
        let ids: Vec<_> = tags.iter().map(|t| t.get("id").cloned().unwrap()).collect();
        assert_eq!(ids, vec![json!("t2"), json!("t1")]);
        assert_eq!(parents[1].relation("tags").and_then(Related::as_many).map(<[_]>::len), Some(0));
    }
}
