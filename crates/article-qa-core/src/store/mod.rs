//! Storage abstractions for article-qa.
//!
//! Two stores back the pipeline:
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`CorpusStore`] | Whole-corpus load/save (JSON file, in-memory) |
//! | [`QueryLog`] | Append-only sink for answered questions (SQLite, in-memory) |
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//! Neither trait offers locking: concurrent `save` calls are last-writer-wins.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Corpus, QueryRecord, QuerySummary};

/// Whole-corpus persistence.
///
/// `save` fully overwrites previous state. Callers load, modify, and save
/// under their own discipline.
#[async_trait]
pub trait CorpusStore: Send + Sync {
    /// Load the corpus. Returns an empty corpus if none has been saved yet.
    ///
    /// Fails with [`QaError::StorageUnavailable`](crate::error::QaError::StorageUnavailable)
    /// if existing state cannot be read or parsed.
    async fn load(&self) -> Result<Corpus>;

    /// Replace the stored corpus.
    async fn save(&self, corpus: &Corpus) -> Result<()>;

    /// Whether a corpus has been saved before.
    async fn exists(&self) -> Result<bool>;
}

/// Append-only log of answered questions.
#[async_trait]
pub trait QueryLog: Send + Sync {
    /// Store a record and return its newly assigned id.
    async fn append(&self, record: &QueryRecord) -> Result<String>;

    /// List stored records as `{id, query, response}`, newest first.
    async fn list(&self, limit: Option<usize>) -> Result<Vec<QuerySummary>>;

    /// Fetch one full record by id.
    async fn get(&self, id: &str) -> Result<Option<QueryRecord>>;
}
