//! Model metadata and records from the JSON directory layout.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use quire_core::cache::{CachedValue, ContentCache, cache_key};
use quire_core::model::{FieldDescriptor, ModelDescriptor, Record, validate_identifier};
use quire_core::Error;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::reader::{ContentReader, FsReader};

/// Segment used in cache keys of non-localized content.
const UNLOCALIZED: &str = "_";

/// Loads descriptors and records from disk through the shared cache.
pub struct JsonContentManager {
    root: PathBuf,
    reader: Arc<dyn ContentReader>,
    cache: Arc<ContentCache>,
    default_locale: String,
}

impl JsonContentManager {
    pub fn new(root: impl Into<PathBuf>, cache: Arc<ContentCache>, default_locale: impl Into<String>) -> Self {
        Self::with_reader(root, Arc::new(FsReader), cache, default_locale)
    }

    pub fn with_reader(
        root: impl Into<PathBuf>,
        reader: Arc<dyn ContentReader>,
        cache: Arc<ContentCache>,
        default_locale: impl Into<String>,
    ) -> Self {
        Self { root: root.into(), reader, cache, default_locale: default_locale.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>, Error> {
        let Some(bytes) = self.reader.read(path).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes).map(Some).map_err(|source| Error::Malformed { path: path.to_path_buf(), source })
    }

    /// All model descriptors listed in `models/metadata.json`, without fields.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the metadata file is missing and
    /// `Error::FileSystem` if it cannot be read or parsed.
    pub async fn load_model_list(&self) -> Result<Vec<ModelDescriptor>, Error> {
        let path = self.root.join("models").join("metadata.json");
        self.read_json(&path)
            .await?
            .ok_or_else(|| Error::NotFound(format!("model metadata {} does not exist", path.display())))
    }

    /// Descriptor of `model_id`, with its fields.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the model is not listed in the metadata.
    pub async fn load_model_config(&self, model_id: &str) -> Result<Arc<ModelDescriptor>, Error> {
        validate_identifier("model id", model_id)?;
        let key = cache_key("model", &[model_id], "config");
        if let Some(CachedValue::Model(descriptor)) = self.cache.get(&key).await {
            return Ok(descriptor);
        }

        let mut descriptor = self
            .load_model_list()
            .await?
            .into_iter()
            .find(|m| m.model_id == model_id)
            .ok_or_else(|| Error::NotFound(format!("model '{model_id}' does not exist")))?;

        let fields_path = self.root.join("models").join(format!("{model_id}.json"));
        descriptor.fields = self.read_json::<Vec<FieldDescriptor>>(&fields_path).await?.unwrap_or_default();

        let descriptor = Arc::new(descriptor);
        self.cache.set(&key, CachedValue::Model(descriptor.clone()), None).await?;
        Ok(descriptor)
    }

    /// Locales with a content file for `model_id`.
    ///
    /// Non-localized models report no locales.
    pub async fn get_model_locales(&self, model_id: &str) -> Result<Arc<Vec<String>>, Error> {
        let descriptor = self.load_model_config(model_id).await?;
        if !descriptor.localization {
            return Ok(Arc::new(Vec::new()));
        }

        let key = cache_key("locales", &[model_id], "");
        if let Some(CachedValue::Names(locales)) = self.cache.get(&key).await {
            return Ok(locales);
        }

        let dir = self.root.join("content").join(model_id);
        let locales: Vec<String> = self
            .reader
            .list(&dir)
            .await?
            .unwrap_or_default()
            .into_iter()
            .filter_map(|name| name.strip_suffix(".json").map(str::to_string))
            .collect();

        let locales = Arc::new(locales);
        self.cache.set(&key, CachedValue::Names(locales.clone()), None).await?;
        Ok(locales)
    }

    /// Records of `model_id` in `locale`.
    ///
    /// Localized models default to the configured locale and fall back to it
    /// when the requested locale has no file. `locale` is ignored for
    /// non-localized models.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the model or its content file is
    /// missing, and `Error::FileSystem` for unreadable or malformed files.
    pub async fn load_model_content(&self, model_id: &str, locale: Option<&str>) -> Result<Arc<Vec<Record>>, Error> {
        let descriptor = self.load_model_config(model_id).await?;
        let requested =
            if descriptor.localization { locale.unwrap_or(self.default_locale.as_str()) } else { UNLOCALIZED };
        if descriptor.localization {
            validate_identifier("locale", requested)?;
        }

        let key = cache_key("content", &[model_id], requested);
        if let Some(CachedValue::Records(records)) = self.cache.get(&key).await {
            return Ok(records);
        }

        let records = if descriptor.localization {
            match self.read_records(model_id, requested).await? {
                Some(records) => records,
                None if requested != self.default_locale => {
                    warn!(
                        model = model_id,
                        locale = requested,
                        fallback = %self.default_locale,
                        "locale file missing, using default locale"
                    );
                    self.read_records(model_id, &self.default_locale).await?.ok_or_else(|| {
                        Error::NotFound(format!("model '{model_id}' has no '{}' content", self.default_locale))
                    })?
                }
                None => return Err(Error::NotFound(format!("model '{model_id}' has no '{requested}' content"))),
            }
        } else {
            self.read_records(model_id, model_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("model '{model_id}' has no content file")))?
        };

        debug!(model = model_id, locale = requested, count = records.len(), "loaded content");
        let records = Arc::new(records);
        self.cache.set(&key, CachedValue::Records(records.clone()), None).await?;
        Ok(records)
    }

    async fn read_records(&self, model_id: &str, file_stem: &str) -> Result<Option<Vec<Record>>, Error> {
        let path = self.root.join("content").join(model_id).join(format!("{file_stem}.json"));
        self.read_json(&path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use quire_core::{CacheConfig, ErrorKind};
    use serde_json::json;

    fn manager(root: &Path) -> JsonContentManager {
        JsonContentManager::new(root, Arc::new(ContentCache::new(CacheConfig::default())), "en")
    }

    #[tokio::test]
    async fn test_load_model_config() {
        let dir = testutil::json_fixture();
        let content = manager(dir.path());

        let descriptor = content.load_model_config("workitems").await.unwrap();
        assert!(descriptor.localization);
        assert!(descriptor.is_translatable("title"));
        assert_eq!(descriptor.relation("category").unwrap().target_model, "workcategories");

        let err = content.load_model_config("missing").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = content.load_model_config("../models").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_load_localized_content() {
        let dir = testutil::json_fixture();
        let content = manager(dir.path());

        let en = content.load_model_content("workitems", None).await.unwrap();
        assert_eq!(en.len(), 6);
        assert_eq!(en[0].get("title"), Some(&json!("Mobile App")));

        let tr = content.load_model_content("workitems", Some("tr")).await.unwrap();
        assert_eq!(tr[0].get("title"), Some(&json!("Mobil Uygulama")));

        let mut locales = content.get_model_locales("workitems").await.unwrap().as_ref().clone();
        locales.sort();
        assert_eq!(locales, vec!["en", "tr"]);
    }

    #[tokio::test]
    async fn test_missing_locale_falls_back_to_default() {
        let dir = testutil::json_fixture();
        let content = manager(dir.path());

        let de = content.load_model_content("workitems", Some("de")).await.unwrap();
        assert_eq!(de[0].get("title"), Some(&json!("Mobile App")));
    }

    #[tokio::test]
    async fn test_missing_default_locale_is_fatal() {
        let dir = testutil::json_fixture();
        std::fs::remove_file(dir.path().join("content/workitems/en.json")).unwrap();
        let content = manager(dir.path());

        let err = content.load_model_content("workitems", Some("de")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_unlocalized_content_ignores_locale() {
        let dir = testutil::json_fixture();
        let content = manager(dir.path());

        let tags = content.load_model_content("tags", Some("tr")).await.unwrap();
        assert_eq!(tags.len(), 3);
        assert!(content.get_model_locales("tags").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_content() {
        let dir = testutil::json_fixture();
        testutil::write_file(dir.path(), "content/tags/tags.json", "[{ not json");
        let content = manager(dir.path());

        let err = content.load_model_content("tags", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileSystem);
        assert!(matches!(err, Error::Malformed { .. }));
    }

    #[tokio::test]
    async fn test_content_is_cached() {
        let dir = testutil::json_fixture();
        let content = manager(dir.path());

        let first = content.load_model_content("tags", None).await.unwrap();
        std::fs::remove_file(dir.path().join("content/tags/tags.json")).unwrap();
        let second = content.load_model_content("tags", None).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        content.cache().invalidate_model("tags").await;
        let err = content.load_model_content("tags", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
