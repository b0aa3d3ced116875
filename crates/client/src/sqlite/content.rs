//! Model metadata, table shapes and records from the content database.

use std::sync::Arc;

use quire_core::cache::{CachedValue, ContentCache, cache_key};
use quire_core::model::{FieldDescriptor, FieldOptions, ModelDescriptor, Record, validate_identifier};
use quire_core::Error;
use serde_json::Value;
use tokio_rusqlite::rusqlite::types::Value as SqlValue;
use tracing::{debug, warn};

use super::connection::{Row, SqliteSource};

pub const RELATIONS_TABLE: &str = "tbl_relations";

pub fn main_table(model_id: &str) -> String {
    format!("tbl_{model_id}")
}

pub fn translation_table(model_id: &str) -> String {
    format!("tbl_{model_id}_translations")
}

/// Quote an identifier for SQL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Columns of a translation table that are keys rather than content.
pub const TRANSLATION_KEYS: [&str; 2] = ["id", "locale"];

fn text(row: &Row, column: &str) -> Option<String> {
    row.get(column).and_then(Value::as_str).map(str::to_string)
}

fn flag(row: &Row, column: &str) -> bool {
    match row.get(column) {
        Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
        Some(Value::Bool(b)) => *b,
        _ => false,
    }
}

/// Loads descriptors, table shapes and records through the shared cache.
pub struct SqliteContentManager {
    source: SqliteSource,
    cache: Arc<ContentCache>,
    default_locale: String,
}

impl SqliteContentManager {
    pub fn new(source: SqliteSource, cache: Arc<ContentCache>, default_locale: impl Into<String>) -> Self {
        Self { source, cache, default_locale: default_locale.into() }
    }

    pub fn source(&self) -> &SqliteSource {
        &self.source
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    /// Descriptor of `model_id` from `tbl_models` and `tbl_model_fields`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the model has no metadata row and
    /// `Error::Database` if the metadata tables cannot be read.
    pub async fn load_model_config(&self, model_id: &str) -> Result<Arc<ModelDescriptor>, Error> {
        validate_identifier("model id", model_id)?;
        let key = cache_key("model", &[model_id], "config");
        if let Some(CachedValue::Model(descriptor)) = self.cache.get(&key).await {
            return Ok(descriptor);
        }

        let model = self
            .source
            .get(
                "SELECT model_id, name, localization FROM tbl_models WHERE model_id = ?",
                vec![SqlValue::Text(model_id.to_string())],
            )
            .await
            .map_err(|e| e.context(format!("loading metadata of model '{model_id}'")))?
            .ok_or_else(|| Error::NotFound(format!("model '{model_id}' does not exist")))?;

        let fields = self
            .source
            .query(
                "SELECT field_id, field_type, component_id, localized, reference
                 FROM tbl_model_fields WHERE model_id = ? ORDER BY field_order, rowid",
                vec![SqlValue::Text(model_id.to_string())],
            )
            .await
            .map_err(|e| e.context(format!("loading fields of model '{model_id}'")))?
            .iter()
            .filter_map(|row| {
                Some(FieldDescriptor {
                    field_id: text(row, "field_id")?,
                    field_type: text(row, "field_type").unwrap_or_default(),
                    component_id: text(row, "component_id"),
                    localized: flag(row, "localized"),
                    options: FieldOptions { reference: text(row, "reference") },
                })
            })
            .collect();

        let descriptor = Arc::new(ModelDescriptor {
            model_id: model_id.to_string(),
            name: text(&model, "name"),
            localization: flag(&model, "localization"),
            fields,
        });
        self.cache.set(&key, CachedValue::Model(descriptor.clone()), None).await?;
        Ok(descriptor)
    }

    /// Whether `model_id` has a translation table.
    ///
    /// Lookup failures count as "no translations".
    pub async fn has_translations(&self, model_id: &str) -> bool {
        let key = cache_key("translations", &[model_id], "exists");
        if let Some(CachedValue::Flag(exists)) = self.cache.get(&key).await {
            return exists;
        }

        let exists = match self
            .source
            .get(
                "SELECT 1 AS found FROM sqlite_master WHERE type = 'table' AND name = ?",
                vec![SqlValue::Text(translation_table(model_id))],
            )
            .await
        {
            Ok(row) => row.is_some(),
            Err(e) => {
                debug!(model = model_id, error = %e, "translation table lookup failed");
                false
            }
        };

        if let Err(e) = self.cache.set(&key, CachedValue::Flag(exists), None).await {
            debug!(model = model_id, error = %e, "could not cache translation flag");
        }
        exists
    }

    async fn table_columns(&self, table: String) -> Result<Vec<String>, Error> {
        let rows = self
            .source
            .query("SELECT name FROM pragma_table_info(?) ORDER BY cid", vec![SqlValue::Text(table)])
            .await?;
        Ok(rows.iter().filter_map(|row| text(row, "name")).collect())
    }

    /// Columns of the main table, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the model has no main table.
    pub async fn get_main_columns(&self, model_id: &str) -> Result<Arc<Vec<String>>, Error> {
        validate_identifier("model id", model_id)?;
        let key = cache_key("columns", &[model_id], "main");
        if let Some(CachedValue::Names(columns)) = self.cache.get(&key).await {
            return Ok(columns);
        }

        let columns = self.table_columns(main_table(model_id)).await?;
        if columns.is_empty() {
            return Err(Error::NotFound(format!("table {} does not exist", main_table(model_id))));
        }

        let columns = Arc::new(columns);
        self.cache.set(&key, CachedValue::Names(columns.clone()), None).await?;
        Ok(columns)
    }

    /// Content columns of the translation table; empty without one.
    pub async fn get_translation_columns(&self, model_id: &str) -> Result<Arc<Vec<String>>, Error> {
        if !self.has_translations(model_id).await {
            return Ok(Arc::new(Vec::new()));
        }
        let key = cache_key("columns", &[model_id], "translation");
        if let Some(CachedValue::Names(columns)) = self.cache.get(&key).await {
            return Ok(columns);
        }

        let columns: Vec<String> = self
            .table_columns(translation_table(model_id))
            .await
            .map_err(|e| Error::Translation(format!("reading columns of {}: {e}", translation_table(model_id))))?
            .into_iter()
            .filter(|c| !TRANSLATION_KEYS.contains(&c.as_str()))
            .collect();

        let columns = Arc::new(columns);
        self.cache.set(&key, CachedValue::Names(columns.clone()), None).await?;
        Ok(columns)
    }

    /// Main columns followed by translation columns not already present.
    pub async fn get_all_columns(&self, model_id: &str) -> Result<Vec<String>, Error> {
        let main = self.get_main_columns(model_id).await?;
        let translations = self.get_translation_columns(model_id).await?;
        let mut all = main.as_ref().clone();
        all.extend(translations.iter().filter(|c| !main.contains(*c)).cloned());
        Ok(all)
    }

    /// Locales present in the translation table.
    ///
    /// # Errors
    ///
    /// Returns `Error::Translation` if the translation table cannot be read.
    pub async fn get_model_locales(&self, model_id: &str) -> Result<Arc<Vec<String>>, Error> {
        if !self.has_translations(model_id).await {
            return Ok(Arc::new(Vec::new()));
        }
        let key = cache_key("locales", &[model_id], "");
        if let Some(CachedValue::Names(locales)) = self.cache.get(&key).await {
            return Ok(locales);
        }

        let sql = format!("SELECT DISTINCT locale FROM {} ORDER BY locale", quote_ident(&translation_table(model_id)));
        let locales: Vec<String> = self
            .source
            .query(sql, Vec::new())
            .await
            .map_err(|e| Error::Translation(format!("reading locales of model '{model_id}': {e}")))?
            .iter()
            .filter_map(|row| text(row, "locale"))
            .collect();

        let locales = Arc::new(locales);
        self.cache.set(&key, CachedValue::Names(locales.clone()), None).await?;
        Ok(locales)
    }

    /// The locale to read `model_id` in.
    ///
    /// `None` for models without translations. A requested locale with no
    /// translation rows falls back to the default locale.
    pub async fn resolve_locale(&self, model_id: &str, requested: Option<&str>) -> Result<Option<String>, Error> {
        if !self.has_translations(model_id).await {
            return Ok(None);
        }
        let requested = requested.unwrap_or(self.default_locale.as_str());
        validate_identifier("locale", requested)?;
        if requested == self.default_locale {
            return Ok(Some(requested.to_string()));
        }

        let locales = self.get_model_locales(model_id).await?;
        if locales.iter().any(|l| l == requested) {
            Ok(Some(requested.to_string()))
        } else {
            warn!(
                model = model_id,
                locale = requested,
                fallback = %self.default_locale,
                "no translations for locale, using default locale"
            );
            Ok(Some(self.default_locale.clone()))
        }
    }

    /// Every record of `model_id`, with translated columns for `locale`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` for an unknown model and `Error::Database`
    /// if the tables cannot be read.
    pub async fn load_model_content(&self, model_id: &str, locale: Option<&str>) -> Result<Arc<Vec<Record>>, Error> {
        self.load_model_config(model_id).await?;
        let main = self.get_main_columns(model_id).await?;
        let locale = self.resolve_locale(model_id, locale).await?;

        let key = cache_key("content", &[model_id], locale.as_deref().unwrap_or("_"));
        if let Some(CachedValue::Records(records)) = self.cache.get(&key).await {
            return Ok(records);
        }

        let mut projection: Vec<String> = main.iter().map(|c| format!("m.{}", quote_ident(c))).collect();
        let table = quote_ident(&main_table(model_id));
        let (sql, params) = match &locale {
            Some(locale) => {
                let translated = self.get_translation_columns(model_id).await?;
                projection.extend(
                    translated.iter().filter(|c| !main.contains(*c)).map(|c| format!("t.{}", quote_ident(c))),
                );
                let sql = format!(
                    "SELECT {} FROM {table} AS m \
                     LEFT JOIN {} AS t ON t.\"id\" = m.\"id\" AND t.\"locale\" = ? \
                     ORDER BY m.rowid",
                    projection.join(", "),
                    quote_ident(&translation_table(model_id)),
                );
                (sql, vec![SqlValue::Text(locale.clone())])
            }
            None => (format!("SELECT {} FROM {table} AS m ORDER BY m.rowid", projection.join(", ")), Vec::new()),
        };

        let records: Vec<Record> = self
            .source
            .query(sql, params)
            .await
            .map_err(|e| e.context(format!("loading content of model '{model_id}'")))?
            .into_iter()
            .map(Record::new)
            .collect();

        debug!(model = model_id, locale = ?locale, count = records.len(), "loaded content");
        let records = Arc::new(records);
        self.cache.set(&key, CachedValue::Records(records.clone()), None).await?;
        Ok(records)
    }
}
