//! JSON-file [`CorpusStore`].
//!
//! The corpus lives in a single UTF-8 JSON object keyed by entry id and
//! is read and written wholesale. Saves go through a temporary sibling
//! file and a rename, so readers never observe a half-written corpus.
//! Concurrent writers are still last-writer-wins.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use article_qa_core::error::{QaError, Result};
use article_qa_core::models::Corpus;
use article_qa_core::store::CorpusStore;

pub struct JsonFileCorpusStore {
    path: PathBuf,
}

impl JsonFileCorpusStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn storage_err(path: &Path, action: &str, e: impl std::fmt::Display) -> QaError {
    QaError::StorageUnavailable(format!("failed to {} {}: {}", action, path.display(), e))
}

#[async_trait]
impl CorpusStore for JsonFileCorpusStore {
    async fn load(&self) -> Result<Corpus> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "corpus file not found, starting empty");
                return Ok(Corpus::new());
            }
            Err(e) => return Err(storage_err(&self.path, "read", e)),
        };

        let mut corpus: Corpus =
            serde_json::from_str(&data).map_err(|e| storage_err(&self.path, "parse", e))?;
        corpus.normalize_ids();
        debug!(path = %self.path.display(), entries = corpus.len(), "corpus loaded");
        Ok(corpus)
    }

    async fn save(&self, corpus: &Corpus) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| storage_err(parent, "create", e))?;
            }
        }

        let data =
            serde_json::to_string(corpus).map_err(|e| storage_err(&self.path, "serialize", e))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, data)
            .await
            .map_err(|e| storage_err(&tmp, "write", e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| storage_err(&self.path, "replace", e))?;

        debug!(path = %self.path.display(), entries = corpus.len(), "corpus saved");
        Ok(())
    }

    async fn exists(&self) -> Result<bool> {
        tokio::fs::try_exists(&self.path)
            .await
            .map_err(|e| storage_err(&self.path, "stat", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use article_qa_core::models::{ArticleInfo, CorpusEntry};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileCorpusStore::new(tmp.path().join("corpus.json"));
        assert!(!store.exists().await.unwrap());
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileCorpusStore::new(tmp.path().join("nested/dir/corpus.json"));
        let corpus: Corpus = vec![
            CorpusEntry::new("a", ArticleInfo::default(), "alpha").with_embedding(vec![0.25, 0.5]),
            CorpusEntry::new("b", ArticleInfo::default(), "beta"),
        ]
        .into_iter()
        .collect();

        store.save(&corpus).await.unwrap();
        assert!(store.exists().await.unwrap());
        assert_eq!(store.load().await.unwrap(), corpus);
    }

    #[tokio::test]
    async fn test_save_overwrites_completely() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileCorpusStore::new(tmp.path().join("corpus.json"));
        let first: Corpus = vec![CorpusEntry::new("a", ArticleInfo::default(), "x")]
            .into_iter()
            .collect();
        store.save(&first).await.unwrap();
        store.save(&Corpus::new()).await.unwrap();
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_storage_unavailable() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("corpus.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = JsonFileCorpusStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, QaError::StorageUnavailable(_)));
    }

    #[tokio::test]
    async fn test_legacy_keys_get_ids() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("corpus.json");
        std::fs::write(
            &path,
            r#"{"abc123": {"info": {"title": "T", "url": "https://u"}, "content": "body"}}"#,
        )
        .unwrap();
        let corpus = JsonFileCorpusStore::new(&path).load().await.unwrap();
        let entry = corpus.get("abc123").unwrap();
        assert_eq!(entry.id, "abc123");
        assert_eq!(entry.text, "body");
        assert!(entry.embedding.is_none());
    }
}
