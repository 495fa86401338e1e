//! Sentence-based document chunking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default maximum chunk length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

const SENTENCE_SEPARATOR: &str = ". ";

/// A slice of a report ready to be embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text.
    pub content: String,

    /// Position of this chunk within the report.
    pub index: usize,

    /// Number of chunks the report produced.
    pub total_chunks: usize,

    /// Report this chunk belongs to.
    pub report_id: String,

    /// When the chunk was produced.
    pub created_at: DateTime<Utc>,
}

/// Split `text` into sentence-aligned chunks of at most `chunk_size`
/// characters.
///
/// Sentences end at `.`, `!` or `?` and are rejoined with `". "`. A sentence
/// longer than `chunk_size` becomes a chunk of its own and is never cut.
pub fn split_text_into_chunks(text: &str, chunk_size: usize) -> Vec<String> {
    let separator_len = SENTENCE_SEPARATOR.chars().count();
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for sentence in text
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        let sentence_len = sentence.chars().count();

        if current.is_empty() {
            current.push_str(sentence);
            current_len = sentence_len;
            continue;
        }

        let joined_len = current_len + separator_len + sentence_len;
        if joined_len > chunk_size {
            chunks.push(std::mem::take(&mut current));
            current.push_str(sentence);
            current_len = sentence_len;
        } else {
            current.push_str(SENTENCE_SEPARATOR);
            current.push_str(sentence);
            current_len = joined_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Chunk a report and attach position metadata to each piece.
pub fn chunk_report(text: &str, report_id: &str, chunk_size: usize) -> Vec<Chunk> {
    let pieces = split_text_into_chunks(text, chunk_size);
    let total_chunks = pieces.len();
    let created_at = Utc::now();

    pieces
        .into_iter()
        .enumerate()
        .map(|(index, content)| Chunk {
            content,
            index,
            total_chunks,
            report_id: report_id.to_string(),
            created_at,
        })
        .collect()
}
