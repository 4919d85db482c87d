use anyhow::{bail, Result};
use tracing::{debug, info, warn};

use article_qa_core::chunk::split_entry;
use article_qa_core::embedding::Embedder;
use article_qa_core::models::CorpusEntry;
use article_qa_core::store::CorpusStore;

use crate::config::Config;
use crate::corpus_file::JsonFileCorpusStore;
use crate::embedding;

/// Counters reported by [`backfill_embeddings`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillStats {
    /// Articles that lacked an embedding when the run started.
    pub pending: usize,
    pub embedded: usize,
    /// Chunk entries written (including each article's first chunk).
    pub chunks: usize,
    pub failed: usize,
}

/// Embed every corpus document that has no embedding yet.
///
/// Each pending document is split into chunks. The document entry keeps its
/// full text and takes chunk 0's embedding; chunk `i > 0` is stored as
/// `<id>_<i>` with the document's metadata and `parent` set to its id.
/// Earlier chunk entries of the document are replaced, so rebuilding with a
/// different window leaves no stale chunks. Pending chunk entries are never
/// split themselves; they are regenerated from their document.
///
/// An article is written only once all its chunks are embedded, and the
/// corpus is saved after every article. A provider failure, or a chunk id
/// already taken by another document, skips that article; a dimensionality
/// change aborts the run.
pub async fn backfill_embeddings(
    store: &dyn CorpusStore,
    embedder: &dyn Embedder,
    chars_per_token: usize,
    max_tokens: usize,
) -> Result<BackfillStats> {
    let mut corpus = store.load().await?;
    corpus.check_dims()?;

    let pending: Vec<CorpusEntry> = corpus
        .entries()
        .filter(|e| e.embedding.is_none() && corpus.parent_of(e).is_none())
        .cloned()
        .collect();

    let mut stats = BackfillStats {
        pending: pending.len(),
        ..Default::default()
    };

    for entry in &pending {
        let chunks = split_entry(entry, chars_per_token, max_tokens);
        debug!(id = %entry.id, chunks = chunks.len(), "embedding article");

        if let Some(taken) = chunks.iter().skip(1).find(|c| {
            corpus
                .get(&c.id)
                .is_some_and(|existing| corpus.parent_of(existing) != Some(entry.id.as_str()))
        }) {
            warn!(id = %entry.id, chunk = %taken.id, "chunk id belongs to another entry");
            stats.failed += 1;
            continue;
        }

        let mut embedded = Vec::with_capacity(chunks.len());
        let mut error = None;
        for chunk in chunks {
            match embedder.embed(&chunk.text).await {
                Ok(vector) => embedded.push(chunk.with_embedding(vector)),
                Err(e) => {
                    error = Some(e);
                    break;
                }
            }
        }
        if let Some(e) = error {
            warn!(id = %entry.id, error = %e, "failed to embed article");
            stats.failed += 1;
            continue;
        }

        for stale in corpus.children_of(&entry.id) {
            corpus.remove(&stale);
        }
        stats.chunks += embedded.len();
        let mut embedded = embedded.into_iter();
        if let Some(first) = embedded.next() {
            corpus.insert(CorpusEntry {
                embedding: first.embedding,
                ..entry.clone()
            });
        }
        for chunk in embedded {
            corpus.insert(chunk);
        }
        corpus.check_dims()?;
        store.save(&corpus).await?;
        stats.embedded += 1;
    }

    info!(
        model = embedder.model_name(),
        pending = stats.pending,
        embedded = stats.embedded,
        chunks = stats.chunks,
        failed = stats.failed,
        "embedding backfill finished"
    );
    Ok(stats)
}

/// Drop every stored embedding. Returns how many were removed.
pub async fn clear_embeddings(store: &dyn CorpusStore) -> Result<usize> {
    let mut corpus = store.load().await?;
    let mut cleared = 0;
    for entry in corpus.entries_mut() {
        if entry.embedding.take().is_some() {
            cleared += 1;
        }
    }
    if cleared > 0 {
        store.save(&corpus).await?;
    }
    Ok(cleared)
}

/// `aqa embed pending`: embed entries that have no embedding yet.
pub async fn run_embed_pending(config: &Config) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let embedder = embedding::create_embedder(&config.embedding)?;
    let store = JsonFileCorpusStore::new(&config.corpus.path);
    let stats = backfill_embeddings(
        &store,
        embedder.as_ref(),
        config.chunking.chars_per_token,
        config.chunking.max_tokens,
    )
    .await?;

    println!("embed pending");
    if stats.pending == 0 {
        println!("  all entries up to date");
        return Ok(());
    }
    print_stats(&stats);
    Ok(())
}

/// `aqa embed rebuild`: clear all embeddings and embed the whole corpus.
pub async fn run_embed_rebuild(config: &Config) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let embedder = embedding::create_embedder(&config.embedding)?;
    let store = JsonFileCorpusStore::new(&config.corpus.path);
    let cleared = clear_embeddings(&store).await?;
    println!("embed rebuild: cleared {} embeddings", cleared);

    let stats = backfill_embeddings(
        &store,
        embedder.as_ref(),
        config.chunking.chars_per_token,
        config.chunking.max_tokens,
    )
    .await?;

    println!("embed rebuild");
    print_stats(&stats);
    Ok(())
}

fn print_stats(stats: &BackfillStats) {
    println!("  total pending: {}", stats.pending);
    println!("  embedded: {}", stats.embedded);
    println!("  chunks written: {}", stats.chunks);
    println!("  failed: {}", stats.failed);
}
