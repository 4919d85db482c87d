//! Brute-force cosine ranking over the whole corpus.
//!
//! The corpus is small (a few thousand chunks at most), so every query is
//! a full linear scan: `O(entries × dims)`, no index.

use tracing::{debug, warn};

use crate::embedding::cosine_similarity;
use crate::models::{Corpus, RankedContext};

/// Score every embedded corpus entry against `query_vec`.
///
/// Results are sorted by descending similarity. The sort is stable, so
/// entries with equal scores keep the corpus enumeration order (ascending
/// id). Entries without an embedding are skipped and logged at debug
/// level; entries whose dimensionality differs from the query are
/// skipped with a warning.
pub fn rank(query_vec: &[f32], corpus: &Corpus) -> Vec<RankedContext> {
    let mut ranked: Vec<RankedContext> = Vec::with_capacity(corpus.len());
    let mut unembedded = 0usize;

    for entry in corpus.entries() {
        let Some(embedding) = entry.embedding.as_deref() else {
            unembedded += 1;
            continue;
        };
        if embedding.len() != query_vec.len() {
            warn!(
                id = %entry.id,
                expected = query_vec.len(),
                actual = embedding.len(),
                "skipping entry with mismatched embedding dimensions"
            );
            continue;
        }
        ranked.push(RankedContext {
            id: entry.id.clone(),
            metadata: entry.metadata.clone(),
            text: entry.text.clone(),
            similarity: cosine_similarity(query_vec, embedding),
        });
    }

    if unembedded > 0 {
        debug!(skipped = unembedded, "entries without embeddings excluded from ranking");
    }

    ranked.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArticleInfo, CorpusEntry};

    fn entry(id: &str, text: &str, embedding: Option<Vec<f32>>) -> CorpusEntry {
        CorpusEntry {
            id: id.to_string(),
            metadata: ArticleInfo::default(),
            text: text.to_string(),
            embedding,
            parent: None,
        }
    }

    #[test]
    fn test_cats_before_dogs() {
        let corpus: Corpus = vec![
            entry("a", "cats are great", Some(vec![1.0, 0.0])),
            entry("b", "dogs are great", Some(vec![0.0, 1.0])),
        ]
        .into_iter()
        .collect();

        let ranked = rank(&[1.0, 0.0], &corpus);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].id, "a");
        assert!((ranked[0].similarity - 1.0).abs() < 1e-6);
        assert_eq!(ranked[1].id, "b");
        assert!(ranked[1].similarity.abs() < 1e-6);
    }

    #[test]
    fn test_sorted_non_increasing() {
        let corpus: Corpus = (0..20)
            .map(|i| {
                let x = (i as f32 * 0.37).sin();
                let y = (i as f32 * 1.13).cos();
                entry(&format!("e{:02}", i), "t", Some(vec![x, y, 0.5]))
            })
            .collect();
        let ranked = rank(&[0.2, -0.9, 0.4], &corpus);
        assert_eq!(ranked.len(), 20);
        for pair in ranked.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
    }

    #[test]
    fn test_ties_keep_enumeration_order() {
        let corpus: Corpus = vec![
            entry("c", "third", Some(vec![2.0, 0.0])),
            entry("a", "first", Some(vec![1.0, 0.0])),
            entry("b", "second", Some(vec![3.0, 0.0])),
        ]
        .into_iter()
        .collect();
        let ranked = rank(&[1.0, 0.0], &corpus);
        let ids: Vec<&str> = ranked.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_skips_missing_and_mismatched_embeddings() {
        let corpus: Corpus = vec![
            entry("a", "no vector", None),
            entry("b", "wrong dims", Some(vec![1.0, 0.0, 0.0])),
            entry("c", "ok", Some(vec![0.0, 1.0])),
        ]
        .into_iter()
        .collect();
        let ranked = rank(&[0.0, 1.0], &corpus);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].id, "c");
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        let corpus: Corpus = vec![entry("z", "zero", Some(vec![0.0, 0.0]))]
            .into_iter()
            .collect();
        let ranked = rank(&[1.0, 1.0], &corpus);
        assert_eq!(ranked[0].similarity, 0.0);
    }

    #[test]
    fn test_empty_corpus() {
        assert!(rank(&[1.0], &Corpus::new()).is_empty());
    }
}
