//! File access behind a trait so tests can substitute storage.

use std::io::ErrorKind as IoErrorKind;
use std::path::Path;

use async_trait::async_trait;
use quire_core::Error;

/// Reads raw files below the content root.
#[async_trait]
pub trait ContentReader: Send + Sync {
    /// Contents of `path`, or `None` if it does not exist.
    async fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, Error>;

    /// File names in `dir`, or `None` if the directory does not exist.
    async fn list(&self, dir: &Path) -> Result<Option<Vec<String>>, Error>;
}

/// Reader over the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsReader;

#[async_trait]
impl ContentReader for FsReader {
    async fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, Error> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::from_io(path, e)),
        }
    }

    async fn list(&self, dir: &Path) -> Result<Option<Vec<String>>, Error> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::from_io(dir, e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| Error::from_io(dir, e))? {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(Some(names))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_paths_are_none() {
        let dir = tempfile::tempdir().unwrap();
        let reader = FsReader;
        assert!(reader.read(&dir.path().join("nope.json")).await.unwrap().is_none());
        assert!(reader.list(&dir.path().join("nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tr.json"), "[]").unwrap();
        std::fs::write(dir.path().join("en.json"), "[]").unwrap();

        let names = FsReader.list(dir.path()).await.unwrap().unwrap();
        assert_eq!(names, vec!["en.json", "tr.json"]);
        assert_eq!(FsReader.read(&dir.path().join("en.json")).await.unwrap().unwrap(), b"[]");
    }
}
