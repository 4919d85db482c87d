//! Fixed-window text chunker.
//!
//! Splits article text into consecutive, non-overlapping windows sized to
//! fit an embedding model's input limit. Window size is measured in
//! characters and derived from a token budget via a fixed
//! characters-per-token ratio.
//!
//! # Algorithm
//!
//! 1. `window = chars_per_token × max_tokens` characters.
//! 2. Walk the text and cut every `window` characters.
//! 3. The final window may be shorter.
//! 4. Text no longer than one window yields a single chunk equal to the text.
//!
//! Windows are cut on `char` boundaries, never inside a UTF-8 sequence.
//! They are not aligned to words or sentences.
//!
//! # Example
//!
//! ```rust
//! use article_qa_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("abcdefghij", 2, 2);
//! assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
//! ```

use crate::models::CorpusEntry;

/// Default characters-per-token ratio (4 chars ≈ 1 token).
pub const DEFAULT_CHARS_PER_TOKEN: usize = 4;

/// Default per-chunk token limit for embedding input.
pub const DEFAULT_CHUNK_TOKENS: usize = 400;

/// Split `text` into windows of `chars_per_token * max_tokens` characters.
///
/// # Guarantees
///
/// - At least one chunk is always returned (empty text yields `[""]`).
/// - Concatenating the chunks reproduces `text` exactly.
/// - Every chunk except the last has exactly `chars_per_token * max_tokens`
///   characters.
pub fn chunk_text(text: &str, chars_per_token: usize, max_tokens: usize) -> Vec<String> {
    let window = chars_per_token.saturating_mul(max_tokens);
    if window == 0 || text.chars().count() <= window {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0usize;

    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == window {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Split a corpus entry into one entry per chunk.
///
/// The first chunk keeps the entry's id; chunk `i > 0` is stored under
/// `<id>_<i>` with `parent` set to the entry's id. Every chunk inherits
/// the entry's metadata and starts without an embedding.
pub fn split_entry(
    entry: &CorpusEntry,
    chars_per_token: usize,
    max_tokens: usize,
) -> Vec<CorpusEntry> {
    chunk_text(&entry.text, chars_per_token, max_tokens)
        .into_iter()
        .enumerate()
        .map(|(i, text)| CorpusEntry {
            id: chunk_id(&entry.id, i),
            metadata: entry.metadata.clone(),
            text,
            embedding: None,
            parent: (i > 0).then(|| entry.id.clone()),
        })
        .collect()
}

/// Id of chunk `index` of the document `base_id`.
pub fn chunk_id(base_id: &str, index: usize) -> String {
    if index == 0 {
        base_id.to_string()
    } else {
        format!("{}_{}", base_id, index)
    }
}
