//! In-memory [`Store`] implementation for tests.
//!
//! Rows live in a `Vec` behind `std::sync::RwLock`.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::models::{ChunkRecord, SourceSummary};

use super::Store;

/// In-memory chunk store.
pub struct InMemoryStore {
    rows: RwLock<Vec<ChunkRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<ChunkRecord>>> {
        self.rows.read().map_err(|_| anyhow!("chunk store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<ChunkRecord>>> {
        self.rows.write().map_err(|_| anyhow!("chunk store lock poisoned"))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn count_by_source(&self, source: &str) -> Result<usize> {
        Ok(self.read()?.iter().filter(|r| r.source == source).count())
    }

    async fn delete_by_source(&self, source: &str) -> Result<usize> {
        let mut rows = self.write()?;
        let before = rows.len();
        rows.retain(|r| r.source != source);
        Ok(before - rows.len())
    }

    async fn insert_chunk(&self, record: &ChunkRecord) -> Result<()> {
        let mut rows = self.write()?;
        if rows
            .iter()
            .any(|r| r.source == record.source && r.chunk_index == record.chunk_index)
        {
            bail!(
                "chunk {} of {} already exists",
                record.chunk_index,
                record.source
            );
        }
        rows.push(record.clone());
        Ok(())
    }

    async fn chunks_for_source(&self, source: &str) -> Result<Vec<ChunkRecord>> {
        let mut found: Vec<ChunkRecord> = self
            .read()?
            .iter()
            .filter(|r| r.source == source)
            .cloned()
            .collect();
        found.sort_by_key(|r| r.chunk_index);
        Ok(found)
    }

    async fn list_sources(&self) -> Result<Vec<SourceSummary>> {
        let mut totals: BTreeMap<String, (usize, usize)> = BTreeMap::new();
        for row in self.read()?.iter() {
            let entry = totals.entry(row.source.clone()).or_default();
            entry.0 += 1;
            if row.embedding.is_none() {
                entry.1 += 1;
            }
        }
        Ok(totals
            .into_iter()
            .map(|(source, (chunks, pending))| SourceSummary {
                source,
                chunks,
                pending,
            })
            .collect())
    }

    async fn pending_embeddings(&self, limit: Option<usize>) -> Result<Vec<ChunkRecord>> {
        let mut pending: Vec<ChunkRecord> = self
            .read()?
            .iter()
            .filter(|r| r.embedding.is_none())
            .cloned()
            .collect();
        pending.sort_by(|a, b| {
            a.source
                .cmp(&b.source)
                .then(a.chunk_index.cmp(&b.chunk_index))
        });
        pending.truncate(limit.unwrap_or(usize::MAX));
        Ok(pending)
    }

    async fn set_embedding(
        &self,
        source: &str,
        chunk_index: i64,
        vector: &[f32],
        model: &str,
    ) -> Result<()> {
        let mut rows = self.write()?;
        let row = rows
            .iter_mut()
            .find(|r| r.source == source && r.chunk_index == chunk_index)
            .ok_or_else(|| anyhow!("chunk {} of {} not found", chunk_index, source))?;
        row.embedding = Some(vector.to_vec());
        row.model = Some(model.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::content_hash;

    fn record(source: &str, index: i64, embedded: bool) -> ChunkRecord {
        let content = format!("{} chunk {}", source, index);
        ChunkRecord {
            source: source.to_string(),
            chunk_index: index,
            title: format!("Section {}", index + 1),
            hash: content_hash(&content),
            content,
            embedding: embedded.then(|| vec![0.1, 0.2]),
            model: embedded.then(|| "test".to_string()),
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn test_insert_count_delete() {
        let store = InMemoryStore::new();
        store.insert_chunk(&record("a.txt", 0, true)).await.unwrap();
        store.insert_chunk(&record("a.txt", 1, true)).await.unwrap();
        store.insert_chunk(&record("b.txt", 0, true)).await.unwrap();

        assert_eq!(store.count_by_source("a.txt").await.unwrap(), 2);
        assert_eq!(store.delete_by_source("a.txt").await.unwrap(), 2);
        assert_eq!(store.count_by_source("a.txt").await.unwrap(), 0);
        assert_eq!(store.count_by_source("b.txt").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_key_rejected() {
        let store = InMemoryStore::new();
        store.insert_chunk(&record("a.txt", 0, true)).await.unwrap();
        assert!(store.insert_chunk(&record("a.txt", 0, true)).await.is_err());
    }

    #[tokio::test]
    async fn test_chunks_ordered_by_index() {
        let store = InMemoryStore::new();
        for i in [2, 0, 1] {
            store.insert_chunk(&record("a.txt", i, false)).await.unwrap();
        }
        let indices: Vec<i64> = store
            .chunks_for_source("a.txt")
            .await
            .unwrap()
            .iter()
            .map(|r| r.chunk_index)
            .collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_list_sources_and_pending() {
        let store = InMemoryStore::new();
        store.insert_chunk(&record("z.txt", 0, false)).await.unwrap();
        store.insert_chunk(&record("a.txt", 0, true)).await.unwrap();
        store.insert_chunk(&record("a.txt", 1, false)).await.unwrap();

        let sources = store.list_sources().await.unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].source, "a.txt");
        assert_eq!(sources[0].chunks, 2);
        assert_eq!(sources[0].pending, 1);

        let pending = store.pending_embeddings(None).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].source, "a.txt");
        assert_eq!(store.pending_embeddings(Some(1)).await.unwrap().len(), 1);

        store
            .set_embedding("z.txt", 0, &[1.0, 2.0], "test")
            .await
            .unwrap();
        assert_eq!(store.pending_embeddings(None).await.unwrap().len(), 1);
        assert!(store.set_embedding("z.txt", 9, &[1.0], "test").await.is_err());
    }
}
