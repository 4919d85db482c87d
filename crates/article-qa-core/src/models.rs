//! Core data models used throughout article-qa.
//!
//! These types represent the corpus entries, ranked contexts, completion
//! exchanges, and query records that flow through the retrieval pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{QaError, Result};

/// Descriptive metadata for an article, as returned by the content source.
///
/// Only the fields used for citations and display are named; anything
/// else the source returns is kept verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleInfo {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub published_at: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A single retrievable passage: a whole article or one chunk of it.
///
/// Split documents use `<base>` for the first chunk and `<base>_<i>` for
/// the rest. The `<base>` entry keeps the whole document text; each
/// `<base>_<i>` entry holds one chunk and names its base in `parent`.
/// `info`/`content` are accepted as aliases so corpus files written by
/// older tooling still load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusEntry {
    #[serde(default)]
    pub id: String,
    #[serde(alias = "info", default)]
    pub metadata: ArticleInfo,
    #[serde(alias = "content", default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Id of the document this chunk was split from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl CorpusEntry {
    pub fn new(id: impl Into<String>, metadata: ArticleInfo, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            metadata,
            text: text.into(),
            embedding: None,
            parent: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// The full corpus, keyed by entry id.
///
/// Backed by a `BTreeMap`, so enumeration is in ascending id order and
/// ranking ties resolve the same way on every run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Corpus {
    entries: BTreeMap<String, CorpusEntry>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&CorpusEntry> {
        self.entries.get(id)
    }

    /// Insert an entry under its own id, replacing any previous entry.
    pub fn insert(&mut self, entry: CorpusEntry) {
        self.entries.insert(entry.id.clone(), entry);
    }

    pub fn remove(&mut self, id: &str) -> Option<CorpusEntry> {
        self.entries.remove(id)
    }

    /// Base document id of a chunk entry, or `None` for a base document.
    ///
    /// Entries without a `parent` field (older corpus files) count as a
    /// chunk of `<base>` when their id is `<base>_<digits>`, `<base>` is
    /// present, and their text occurs in `<base>`'s text.
    pub fn parent_of<'a>(&'a self, entry: &'a CorpusEntry) -> Option<&'a str> {
        if let Some(parent) = &entry.parent {
            return Some(parent);
        }
        let (base, index) = entry.id.rsplit_once('_')?;
        if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let base_entry = self.entries.get(base)?;
        base_entry.text.contains(&entry.text).then_some(base)
    }

    /// Ids of the chunk entries split from `base_id`.
    pub fn children_of(&self, base_id: &str) -> Vec<String> {
        self.entries
            .values()
            .filter(|e| self.parent_of(e) == Some(base_id))
            .map(|e| e.id.clone())
            .collect()
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CorpusEntry> {
        self.entries.values()
    }

    pub fn entries_mut(&mut self) -> impl Iterator<Item = &mut CorpusEntry> {
        self.entries.values_mut()
    }

    /// Number of entries that carry an embedding.
    pub fn embedded_count(&self) -> usize {
        self.entries.values().filter(|e| e.embedding.is_some()).count()
    }

    /// Fill empty `id` fields from the map keys.
    pub fn normalize_ids(&mut self) {
        for (key, entry) in self.entries.iter_mut() {
            if entry.id.is_empty() {
                entry.id = key.clone();
            }
        }
    }

    /// Dimensionality of the first embedding found, if any.
    pub fn dims(&self) -> Option<usize> {
        self.entries
            .values()
            .find_map(|e| e.embedding.as_ref().map(|v| v.len()))
    }

    /// Verify that every embedding shares the same dimensionality.
    pub fn check_dims(&self) -> Result<()> {
        let Some(expected) = self.dims() else {
            return Ok(());
        };
        for entry in self.entries.values() {
            if let Some(v) = &entry.embedding {
                if v.len() != expected {
                    return Err(QaError::DimensionMismatch {
                        expected,
                        actual: v.len(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl FromIterator<CorpusEntry> for Corpus {
    fn from_iter<I: IntoIterator<Item = CorpusEntry>>(iter: I) -> Self {
        let mut corpus = Corpus::new();
        for entry in iter {
            corpus.insert(entry);
        }
        corpus
    }
}

/// A corpus entry scored against one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedContext {
    pub id: String,
    pub metadata: ArticleInfo,
    pub text: String,
    /// Cosine similarity in `[-1.0, 1.0]`.
    pub similarity: f32,
}

/// Request settings sent to the completion model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionParams {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub presence_penalty: f32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo-instruct".to_string(),
            max_tokens: 2000,
            temperature: 0.0,
            presence_penalty: 0.0,
        }
    }
}

/// One candidate completion returned by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionChoice {
    pub text: String,
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Audit record of one answered question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub query: String,
    /// Contexts included in the prompt, in packing order.
    pub contexts: Vec<RankedContext>,
    pub response: String,
    pub choices: Vec<CompletionChoice>,
    pub parameters: CompletionParams,
}

/// Listing view of a stored [`QueryRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySummary {
    pub id: String,
    pub query: String,
    pub response: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_field_names_load() {
        let json = r#"{
            "a1": {
                "info": { "title": "Hello", "url": "https://x/a1", "claps": 12 },
                "content": "body text",
                "embedding": [0.5, 0.5]
            }
        }"#;
        let mut corpus: Corpus = serde_json::from_str(json).unwrap();
        corpus.normalize_ids();
        let entry = corpus.get("a1").unwrap();
        assert_eq!(entry.id, "a1");
        assert_eq!(entry.metadata.title, "Hello");
        assert_eq!(entry.metadata.extra.get("claps"), Some(&serde_json::json!(12)));
        assert_eq!(entry.text, "body text");
        assert_eq!(entry.embedding.as_deref(), Some(&[0.5f32, 0.5][..]));
    }

    #[test]
    fn test_check_dims_detects_mismatch() {
        let corpus: Corpus = vec![
            CorpusEntry::new("a", ArticleInfo::default(), "x").with_embedding(vec![1.0, 0.0]),
            CorpusEntry::new("b", ArticleInfo::default(), "y").with_embedding(vec![1.0]),
            CorpusEntry::new("c", ArticleInfo::default(), "z"),
        ]
        .into_iter()
        .collect();
        match corpus.check_dims() {
            Err(QaError::DimensionMismatch { expected, actual }) => {
                assert_eq!(expected, 2);
                assert_eq!(actual, 1);
            }
            other => panic!("expected dimension mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_embedding_not_serialized() {
        let entry = CorpusEntry::new("a", ArticleInfo::default(), "text");
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("embedding").is_none());
        assert!(json.get("parent").is_none());
        assert_eq!(json["text"], "text");
    }

    #[test]
    fn test_parent_of() {
        let mut tagged = CorpusEntry::new("post_1", ArticleInfo::default(), "efgh");
        tagged.parent = Some("post".to_string());
        let corpus: Corpus = vec![
            CorpusEntry::new("post", ArticleInfo::default(), "abcdefghij"),
            tagged,
            // Older files carry no `parent`; recognized by id and text.
            CorpusEntry::new("post_2", ArticleInfo::default(), "ij"),
            // Same id shape, but its text is not part of `post`.
            CorpusEntry::new("post_3", ArticleInfo::default(), "unrelated"),
            CorpusEntry::new("orphan_1", ArticleInfo::default(), "x"),
            CorpusEntry::new("post_x", ArticleInfo::default(), "ab"),
        ]
        .into_iter()
        .collect();

        let parent = |id: &str| corpus.parent_of(corpus.get(id).unwrap());
        assert_eq!(parent("post"), None);
        assert_eq!(parent("post_1"), Some("post"));
        assert_eq!(parent("post_2"), Some("post"));
        assert_eq!(parent("post_3"), None);
        assert_eq!(parent("orphan_1"), None);
        assert_eq!(parent("post_x"), None);
        assert_eq!(corpus.children_of("post"), vec!["post_1", "post_2"]);
    }
}
