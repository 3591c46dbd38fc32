//! Storage abstraction for persisted chunks.
//!
//! The [`Store`] trait covers every operation the ingestion driver, the
//! embedding backfill, and the HTTP API need, keyed by `(source,
//! chunk_index)`. Re-ingesting a source deletes all of its rows first;
//! rows are never patched in place except to attach an embedding.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ChunkRecord, SourceSummary};

/// Abstract chunk store.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`count_by_source`](Store::count_by_source) | Rows stored for a source |
/// | [`delete_by_source`](Store::delete_by_source) | Drop every row of a source |
/// | [`insert_chunk`](Store::insert_chunk) | Insert one row |
/// | [`chunks_for_source`](Store::chunks_for_source) | Rows of a source by index |
/// | [`list_sources`](Store::list_sources) | Per-source totals |
/// | [`pending_embeddings`](Store::pending_embeddings) | Rows without a vector |
/// | [`set_embedding`](Store::set_embedding) | Attach a vector to a row |
#[async_trait]
pub trait Store: Send + Sync {
    async fn count_by_source(&self, source: &str) -> Result<usize>;

    /// Returns the number of rows removed.
    async fn delete_by_source(&self, source: &str) -> Result<usize>;

    /// Fails if `(source, chunk_index)` already exists.
    async fn insert_chunk(&self, record: &ChunkRecord) -> Result<()>;

    async fn chunks_for_source(&self, source: &str) -> Result<Vec<ChunkRecord>>;

    /// Sorted by source name.
    async fn list_sources(&self) -> Result<Vec<SourceSummary>>;

    /// Rows without an embedding, ordered by source then index.
    async fn pending_embeddings(&self, limit: Option<usize>) -> Result<Vec<ChunkRecord>>;

    async fn set_embedding(
        &self,
        source: &str,
        chunk_index: i64,
        vector: &[f32],
        model: &str,
    ) -> Result<()>;
}
