//! In-memory store implementations for tests and embedding the library.
//!
//! Uses `std::sync::RwLock` for thread safety. Nothing survives the
//! process.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{QaError, Result};
use crate::models::{Corpus, QueryRecord, QuerySummary};

use super::{CorpusStore, QueryLog};

fn poisoned<T>(_: T) -> QaError {
    QaError::StorageUnavailable("in-memory store lock poisoned".to_string())
}

/// In-memory corpus store.
#[derive(Default)]
pub struct InMemoryCorpusStore {
    corpus: RwLock<Option<Corpus>>,
}

impl InMemoryCorpusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `corpus`.
    pub fn with_corpus(corpus: Corpus) -> Self {
        Self {
            corpus: RwLock::new(Some(corpus)),
        }
    }
}

#[async_trait]
impl CorpusStore for InMemoryCorpusStore {
    async fn load(&self) -> Result<Corpus> {
        let guard = self.corpus.read().map_err(poisoned)?;
        Ok(guard.clone().unwrap_or_default())
    }

    async fn save(&self, corpus: &Corpus) -> Result<()> {
        let mut guard = self.corpus.write().map_err(poisoned)?;
        *guard = Some(corpus.clone());
        Ok(())
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.corpus.read().map_err(poisoned)?.is_some())
    }
}

/// In-memory query log. Ids are sequential (`"1"`, `"2"`, ...).
#[derive(Default)]
pub struct InMemoryQueryLog {
    records: RwLock<Vec<(String, QueryRecord)>>,
}

impl InMemoryQueryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl QueryLog for InMemoryQueryLog {
    async fn append(&self, record: &QueryRecord) -> Result<String> {
        let mut records = self.records.write().map_err(poisoned)?;
        let id = (records.len() + 1).to_string();
        records.push((id.clone(), record.clone()));
        Ok(id)
    }

    async fn list(&self, limit: Option<usize>) -> Result<Vec<QuerySummary>> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records
            .iter()
            .rev()
            .take(limit.unwrap_or(usize::MAX))
            .map(|(id, r)| QuerySummary {
                id: id.clone(),
                query: r.query.clone(),
                response: r.response.clone(),
            })
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<QueryRecord>> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records
            .iter()
            .find(|(rid, _)| rid == id)
            .map(|(_, r)| r.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArticleInfo, CompletionParams, CorpusEntry};

    #[tokio::test]
    async fn test_corpus_store_starts_empty() {
        let store = InMemoryCorpusStore::new();
        assert!(!store.exists().await.unwrap());
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corpus_save_overwrites() {
        let store = InMemoryCorpusStore::new();
        let first: Corpus = vec![CorpusEntry::new("a", ArticleInfo::default(), "x")]
            .into_iter()
            .collect();
        let second: Corpus = vec![CorpusEntry::new("b", ArticleInfo::default(), "y")]
            .into_iter()
            .collect();
        store.save(&first).await.unwrap();
        store.save(&second).await.unwrap();
        let loaded = store.load().await.unwrap();
        assert!(store.exists().await.unwrap());
        assert!(!loaded.contains("a"));
        assert!(loaded.contains("b"));
    }

    #[tokio::test]
    async fn test_query_log_lists_newest_first() {
        let log = InMemoryQueryLog::new();
        for q in ["first", "second", "third"] {
            log.append(&QueryRecord {
                query: q.to_string(),
                contexts: Vec::new(),
                response: format!("answer to {}", q),
                choices: Vec::new(),
                parameters: CompletionParams::default(),
            })
            .await
            .unwrap();
        }
        let listed = log.list(Some(2)).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].query, "third");
        assert_eq!(listed[1].query, "second");
        let full = log.get(&listed[1].id).await.unwrap().unwrap();
        assert_eq!(full.response, "answer to second");
        assert!(log.get("missing").await.unwrap().is_none());
    }
}
