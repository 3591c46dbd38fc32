//! In-memory preview of a document's chunks before publication.
//!
//! An operator chunks a document, inspects the result, hand-edits or deletes
//! individual chunks, and then hands the list to the publish step. Nothing
//! here touches a store.

use thiserror::Error;

use crate::chunk::{chunk_document_with, ChunkLimits};
use crate::models::Chunk;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PreviewError {
    #[error("chunk {0} not found")]
    ChunkNotFound(usize),
    #[error("chunk {0} must not be empty")]
    EmptyContent(usize),
}

/// Editable chunk list for one source document.
#[derive(Debug, Clone)]
pub struct PreviewSession {
    source: String,
    chunks: Vec<Chunk>,
}

impl PreviewSession {
    pub fn new(source: impl Into<String>, text: &str) -> Self {
        Self::with_limits(source, text, &ChunkLimits::default())
    }

    pub fn with_limits(source: impl Into<String>, text: &str, limits: &ChunkLimits) -> Self {
        Self {
            source: source.into(),
            chunks: chunk_document_with(text, limits),
        }
    }

    /// Rebuild a session from a chunk list submitted by a client.
    ///
    /// Contents are trimmed and indices reassigned. An empty chunk is
    /// rejected with its position in `chunks`.
    pub fn from_chunks(source: impl Into<String>, chunks: Vec<Chunk>) -> Result<Self, PreviewError> {
        let mut cleaned = Vec::with_capacity(chunks.len());
        for (i, mut chunk) in chunks.into_iter().enumerate() {
            let trimmed = chunk.content.trim();
            if trimmed.is_empty() {
                return Err(PreviewError::EmptyContent(i));
            }
            chunk.content = trimmed.to_string();
            cleaned.push(chunk);
        }
        let mut session = Self {
            source: source.into(),
            chunks: cleaned,
        };
        session.renumber();
        Ok(session)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Replace the text of chunk `index`. Title and section are kept.
    pub fn edit(&mut self, index: usize, content: &str) -> Result<(), PreviewError> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(PreviewError::EmptyContent(index));
        }
        let chunk = self
            .chunks
            .get_mut(index)
            .ok_or(PreviewError::ChunkNotFound(index))?;
        chunk.content = trimmed.to_string();
        Ok(())
    }

    /// Remove chunk `index` and renumber the rest.
    pub fn delete(&mut self, index: usize) -> Result<Chunk, PreviewError> {
        if index >= self.chunks.len() {
            return Err(PreviewError::ChunkNotFound(index));
        }
        let removed = self.chunks.remove(index);
        self.renumber();
        Ok(removed)
    }

    pub fn into_chunks(self) -> Vec<Chunk> {
        self.chunks
    }

    // Sectioned titles carry meaning and stay; synthetic ones follow position.
    fn renumber(&mut self) {
        for (i, chunk) in self.chunks.iter_mut().enumerate() {
            chunk.index = i;
            if chunk.section.is_none() {
                chunk.title = format!("Section {}", i + 1);
            }
        }
    }
}
