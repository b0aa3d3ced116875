//! content_query tool implementation.
//!
//! Translates tool parameters into a query declaration and runs it through
//! the loader.

use std::time::Duration;

use quire_client::ContentLoader;
use quire_core::{Error, Include, QueryBuilder, SortDirection};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ToolError;

/// Input parameters for the content_query tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ContentQueryParams {
    /// Model (content collection) to query.
    pub model: String,

    /// Conditions combined with AND.
    #[serde(default)]
    pub filters: Vec<FilterParam>,

    /// Sort keys, most significant first.
    #[serde(default)]
    pub sort: Vec<SortParam>,

    /// Page size; omit for all matches.
    #[serde(default)]
    pub limit: Option<i64>,

    /// Records to skip before the page starts.
    #[serde(default)]
    pub offset: Option<i64>,

    /// Relations to attach to each record.
    #[serde(default)]
    pub include: Vec<IncludeParam>,

    /// Locale for translatable fields; falls back to the default locale.
    #[serde(default)]
    pub locale: Option<String>,

    /// Memoize the result for this many milliseconds.
    #[serde(default)]
    pub cache_ttl_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FilterParam {
    pub field: String,
    /// One of eq, ne, gt, gte, lt, lte, in, nin, contains, startsWith, endsWith.
    pub operator: String,
    pub value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SortParam {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IncludeParam {
    /// Relation field name on the parent model.
    pub relation: String,
    /// Locale override for the related records.
    #[serde(default)]
    pub locale: Option<String>,
    /// Relations of the related records.
    #[serde(default)]
    pub include: Vec<IncludeParam>,
}

impl From<IncludeParam> for Include {
    fn from(param: IncludeParam) -> Self {
        let mut include = Include::new(param.relation);
        include.locale = param.locale;
        include.includes = param.include.into_iter().map(Include::from).collect();
        include
    }
}

fn non_negative(name: &str, value: i64) -> Result<usize, Error> {
    usize::try_from(value).map_err(|_| Error::Validation(format!("{name} must not be negative, got {value}")))
}

impl ContentQueryParams {
    /// Build the declaration on a loader-bound builder.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` for a negative limit or offset.
    pub fn into_builder(self, loader: &ContentLoader) -> Result<QueryBuilder, Error> {
        let mut builder = loader.query(self.model);
        for filter in self.filters {
            builder = builder.where_op(filter.field, &filter.operator, filter.value);
        }
        for sort in self.sort {
            builder = builder.order_by(sort.field, sort.direction);
        }
        if let Some(limit) = self.limit {
            builder = builder.limit(non_negative("limit", limit)?);
        }
        if let Some(offset) = self.offset {
            builder = builder.offset(non_negative("offset", offset)?);
        }
        for include in self.include {
            builder = builder.include_with(include.into());
        }
        if let Some(locale) = self.locale {
            builder = builder.locale(locale);
        }
        if let Some(ttl) = self.cache_ttl_ms {
            builder = builder.cache(Duration::from_millis(ttl));
        }
        Ok(builder)
    }
}

/// Implementation of the content_query tool.
pub async fn query_impl(loader: &ContentLoader, params: ContentQueryParams) -> Result<CallToolResult, McpError> {
    let model = params.model.clone();
    let result = params.into_builder(loader)?.get().await?;
    tracing::debug!(%model, total = result.total, returned = result.data.len(), "content_query");

    let json = serde_json::to_string_pretty(&result).map_err(ToolError::Serialize)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use quire_client::LoaderOptions;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(root: &std::path::Path, relative: &str, value: &Value) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, serde_json::to_string(value).unwrap()).unwrap();
    }

    /// Notes linked to one author each, in a JSON content tree.
    pub(crate) fn fixture() -> (TempDir, ContentLoader) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "models/metadata.json",
            &json!([
                { "modelId": "notes", "name": "Notes", "localization": false },
                { "modelId": "authors", "name": "Authors", "localization": false },
            ]),
        );
        write(
            root,
            "models/notes.json",
            &json!([
                { "fieldId": "title", "fieldType": "string" },
                { "fieldId": "rank", "fieldType": "number" },
                { "fieldId": "author", "fieldType": "relation", "componentId": "one-to-one",
                  "options": { "reference": "authors" } },
            ]),
        );
        write(root, "models/authors.json", &json!([{ "fieldId": "name", "fieldType": "string" }]));
        write(
            root,
            "content/notes/notes.json",
            &json!([
                { "id": "n1", "status": "publish", "title": "Alpha", "rank": 2, "author": "a1" },
                { "id": "n2", "status": "draft", "title": "Beta", "rank": 3, "author": "a2" },
                { "id": "n3", "status": "publish", "title": "Gamma", "rank": 1, "author": "a1" },
            ]),
        );
        write(
            root,
            "content/authors/authors.json",
            &json!([{ "id": "a1", "name": "Ada" }, { "id": "a2", "name": "Grace" }]),
        );

        let loader = ContentLoader::json(root, LoaderOptions::default());
        (dir, loader)
    }

    fn params(value: Value) -> ContentQueryParams {
        serde_json::from_value(value).unwrap()
    }

    pub(crate) fn text(result: &CallToolResult) -> Value {
        let content_val = serde_json::to_value(&result.content[0]).unwrap();
        let text = content_val.get("text").and_then(|v| v.as_str()).expect("Expected text field in content");
        serde_json::from_str(text).unwrap()
    }

    #[tokio::test]
    async fn test_query_with_include() {
        let (_dir, loader) = fixture();
        let result = query_impl(
            &loader,
            params(json!({
                "model": "notes",
                "filters": [{ "field": "status", "operator": "eq", "value": "publish" }],
                "sort": [{ "field": "rank" }],
                "include": [{ "relation": "author" }],
                "limit": 1,
            })),
        )
        .await
        .unwrap();

        let output = text(&result);
        assert_eq!(output["total"], json!(2));
        assert_eq!(output["data"][0]["id"], json!("n3"));
        assert_eq!(output["data"][0]["relations"]["author"]["name"], json!("Ada"));
        assert_eq!(output["pagination"]["hasMore"], json!(true));
    }

    #[tokio::test]
    async fn test_negative_limit_is_invalid() {
        let (_dir, loader) = fixture();
        let err = query_impl(&loader, params(json!({ "model": "notes", "offset": -1 }))).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
        assert!(err.message.contains("offset"));
    }

    #[tokio::test]
    async fn test_unknown_operator_and_model() {
        let (_dir, loader) = fixture();
        let filters = json!([{ "field": "title", "operator": "like", "value": "A" }]);
        let err = query_impl(&loader, params(json!({ "model": "notes", "filters": filters }))).await.unwrap_err();
        assert_eq!(err.code.0, -32602);

        let err = query_impl(&loader, params(json!({ "model": "ghosts" }))).await.unwrap_err();
        assert_eq!(err.code.0, -32001);
    }

    #[test]
    fn test_nested_include_params() {
        let include: Include = serde_json::from_value::<IncludeParam>(json!({
            "relation": "author",
            "locale": "tr",
            "include": [{ "relation": "country" }],
        }))
        .unwrap()
        .into();
        assert_eq!(include.locale.as_deref(), Some("tr"));
        assert_eq!(include.includes[0].relation, "country");
    }
}
