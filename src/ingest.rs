//! Article ingestion into the corpus.
//!
//! Walks a paginated [`ArticleSource`], fetches every article the corpus
//! does not hold yet, cleans its text, and saves the corpus once at the
//! end. Embedding is a separate step (`aqa embed pending`).
//!
//! ```text
//! list_page(from) ─▶ list_page(to) ─▶ … ─▶ empty page
//!        │
//!        ▼
//!  unique ids ─▶ skip known ─▶ fetch_article ─▶ clean ─▶ corpus.save()
//! ```

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use article_qa_core::models::{ArticleInfo, CorpusEntry};
use article_qa_core::store::CorpusStore;

use crate::config::Config;
use crate::connector_medium::MediumSource;
use crate::corpus_file::JsonFileCorpusStore;

/// Marker after which fetched article text is discarded (stats footer).
const CONTENT_CUTOFF: &str = "TOTALS";

/// One page of article ids from a publication listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticlePage {
    #[serde(default)]
    pub publication_articles: Vec<String>,
    /// Cursor for the next page.
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub publication_id: String,
}

/// An article's metadata and raw text.
#[derive(Debug, Clone)]
pub struct FetchedArticle {
    pub info: ArticleInfo,
    pub content: String,
}

/// A paginated source of articles.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    /// Short name used in logs and command output.
    fn name(&self) -> &str;

    /// Fetch the page of article ids starting at cursor `from`.
    async fn list_page(&self, from: &str) -> Result<ArticlePage>;

    /// Fetch one article's metadata and text.
    async fn fetch_article(&self, id: &str) -> Result<FetchedArticle>;
}

/// Counters reported by [`sync_corpus`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub listed: usize,
    pub fetched: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Page through `source` from cursor `from` and collect unique article ids.
///
/// Stops at the first empty page, when the cursor stops advancing, or
/// after `max_pages` pages. Ids keep first-seen order.
pub async fn collect_article_ids(
    source: &dyn ArticleSource,
    from: &str,
    max_pages: usize,
) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor = from.to_string();

    for page_no in 0..max_pages {
        let page = source.list_page(&cursor).await?;
        debug!(
            source = source.name(),
            page = page_no,
            from = %cursor,
            articles = page.publication_articles.len(),
            "listed page"
        );
        if page.publication_articles.is_empty() {
            return Ok(ids);
        }

        for id in page.publication_articles {
            if seen.insert(id.clone()) {
                ids.push(id);
            }
        }

        if page.to.is_empty() || page.to == cursor {
            warn!(source = source.name(), cursor = %cursor, "listing cursor did not advance; stopping");
            return Ok(ids);
        }
        cursor = page.to;
    }

    warn!(source = source.name(), max_pages, "page limit reached; listing may be incomplete");
    Ok(ids)
}

/// Cut the text at the stats footer and flatten line breaks to spaces.
pub fn clean_content(content: &str) -> String {
    let body = match content.find(CONTENT_CUTOFF) {
        Some(idx) => &content[..idx],
        None => content,
    };
    body.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

/// Add every article from `source` that `store` does not hold yet.
///
/// Fetch failures are logged and counted; the rest of the sync continues.
/// The corpus is saved once, after all fetches.
pub async fn sync_corpus(
    source: &dyn ArticleSource,
    store: &dyn CorpusStore,
    from: &str,
    max_pages: usize,
) -> Result<SyncStats> {
    let mut corpus = store.load().await?;
    let ids = collect_article_ids(source, from, max_pages).await?;
    let mut stats = SyncStats {
        listed: ids.len(),
        ..Default::default()
    };

    for id in &ids {
        if corpus.contains(id) {
            debug!(id = %id, "article already in corpus");
            stats.skipped += 1;
            continue;
        }
        match source.fetch_article(id).await {
            Ok(article) => {
                corpus.insert(CorpusEntry::new(
                    id.clone(),
                    article.info,
                    clean_content(&article.content),
                ));
                stats.fetched += 1;
            }
            Err(e) => {
                warn!(id = %id, error = %e, "failed to fetch article");
                stats.failed += 1;
            }
        }
    }

    if stats.fetched > 0 {
        store.save(&corpus).await?;
    }
    info!(
        source = source.name(),
        listed = stats.listed,
        fetched = stats.fetched,
        skipped = stats.skipped,
        failed = stats.failed,
        "sync finished"
    );
    Ok(stats)
}

/// `aqa sync`: pull new articles from the configured Medium publication.
pub async fn run_sync(config: &Config) -> Result<()> {
    let Some(medium) = &config.source.medium else {
        bail!("No article source configured. Add a [source.medium] section to the config.");
    };

    let source = MediumSource::new(medium)?;
    let store = JsonFileCorpusStore::new(&config.corpus.path);
    let stats = sync_corpus(&source, &store, &medium.from_date, medium.max_pages).await?;

    println!("sync {}", source.name());
    println!("  listed: {} articles", stats.listed);
    println!("  fetched: {}", stats.fetched);
    println!("  already present: {}", stats.skipped);
    println!("  failed: {}", stats.failed);
    println!("ok");
    Ok(())
}
