//! Core data models shared by the chunker, the preview session, and the
//! chunk store.
//!
//! A [`Chunk`] is what the chunker produces and what an operator sees in the
//! preview. A [`ChunkRecord`] is the persisted form: the chunk's
//! embedding text, keyed by `(source, chunk_index)`, plus an optional vector.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One bounded-size unit of document text.
///
/// `content` never carries the synthetic `[<section>]` prefix; use
/// [`Chunk::embedding_text`] for the form that gets embedded and stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position within the chunk sequence of one chunking run.
    pub index: usize,
    /// Display label: section name, `"<name> (<n>)"`, or `"Section N"`.
    pub title: String,
    /// Name of the section this chunk was cut from, if the document had
    /// section headers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Chunk text as shown to the operator.
    pub content: String,
}

impl Chunk {
    /// The `[<section>]\n\n` context prefix, if this chunk belongs to a section.
    pub fn context_prefix(&self) -> Option<String> {
        self.section.as_deref().map(section_prefix)
    }

    /// Text handed to the embedding provider and persisted in the store.
    pub fn embedding_text(&self) -> String {
        match self.context_prefix() {
            Some(prefix) => format!("{}{}", prefix, self.content),
            None => self.content.clone(),
        }
    }
}

/// Build the context prefix for a section name.
///
/// ```rust
/// use support_kb_core::models::section_prefix;
///
/// assert_eq!(section_prefix("Deposits"), "[Deposits]\n\n");
/// ```
pub fn section_prefix(name: &str) -> String {
    format!("[{}]\n\n", name)
}

/// A persisted chunk row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub source: String,
    pub chunk_index: i64,
    pub title: String,
    /// Embedding text (prefix included for sectioned chunks).
    pub content: String,
    /// SHA-256 of `content`, hex encoded.
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Unix seconds.
    pub created_at: i64,
}

impl ChunkRecord {
    /// Build the row for `chunk` within `source`, without a vector.
    pub fn from_chunk(source: &str, chunk: &Chunk, created_at: i64) -> Self {
        let content = chunk.embedding_text();
        Self {
            source: source.to_string(),
            chunk_index: chunk.index as i64,
            title: chunk.title.clone(),
            hash: content_hash(&content),
            content,
            embedding: None,
            model: None,
            created_at,
        }
    }

    pub fn with_embedding(mut self, vector: Vec<f32>, model: &str) -> Self {
        self.embedding = Some(vector);
        self.model = Some(model.to_string());
        self
    }
}

/// Per-source totals, as listed by `skb sources` and `GET /sources`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub source: String,
    pub chunks: usize,
    /// Rows stored without an embedding vector.
    pub pending: usize,
}

/// SHA-256 of `text`, hex encoded.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(section: Option<&str>, content: &str) -> Chunk {
        Chunk {
            index: 0,
            title: "t".to_string(),
            section: section.map(str::to_string),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_embedding_text_prefixes_section() {
        let c = chunk(Some("Verification"), "Upload your ID.");
        assert_eq!(c.embedding_text(), "[Verification]\n\nUpload your ID.");
    }

    #[test]
    fn test_embedding_text_without_section() {
        let c = chunk(None, "Plain paragraph.");
        assert_eq!(c.context_prefix(), None);
        assert_eq!(c.embedding_text(), "Plain paragraph.");
    }

    #[test]
    fn test_record_hash_covers_prefix() {
        let c = chunk(Some("Fees"), "Zero fees.");
        let record = ChunkRecord::from_chunk("fees.txt", &c, 0);
        assert_eq!(record.content, "[Fees]\n\nZero fees.");
        assert_eq!(record.hash, content_hash("[Fees]\n\nZero fees."));
        assert!(record.embedding.is_none());
    }
}
