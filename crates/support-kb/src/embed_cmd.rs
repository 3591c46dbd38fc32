//! Embedding backfill.
//!
//! Rows stored while `[embedding].provider = "disabled"` have no vector.
//! `skb embed pending` embeds them one at a time with the configured provider
//! and stops at the first failure.

use anyhow::{bail, Context, Result};

use support_kb_core::embedding::EmbeddingProvider;
use support_kb_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::sqlite_store::SqliteStore;

/// Counts from one backfill pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillReport {
    pub pending: usize,
    pub embedded: usize,
}

/// CLI entry point for `skb embed pending`.
pub async fn run_embed_pending(config: &Config, limit: Option<usize>, dry_run: bool) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let provider = embedding::create_provider(&config.embedding)?;
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);

    if dry_run {
        let pending = store.pending_embeddings(limit).await?;
        println!("embed pending (dry-run)");
        println!("  chunks needing embeddings: {}", pending.len());
        store.pool().close().await;
        return Ok(());
    }

    let result = embed_pending(&store, provider.as_ref(), limit).await;
    store.pool().close().await;
    let report = result?;

    println!("embed pending");
    if report.pending == 0 {
        println!("  all chunks up to date");
    } else {
        println!("  total pending: {}", report.pending);
        println!("  embedded: {}", report.embedded);
    }
    Ok(())
}

/// Embed stored rows that have no vector, one at a time, stopping at the
/// first failure.
pub async fn embed_pending(
    store: &dyn Store,
    provider: &dyn EmbeddingProvider,
    limit: Option<usize>,
) -> Result<BackfillReport> {
    let pending = store.pending_embeddings(limit).await?;
    let mut embedded = 0usize;

    for record in &pending {
        let vector = provider.embed(&record.content).await.with_context(|| {
            format!(
                "Failed to embed chunk {} of {} ({} of {} embedded)",
                record.chunk_index,
                record.source,
                embedded,
                pending.len()
            )
        })?;
        store
            .set_embedding(
                &record.source,
                record.chunk_index,
                &vector,
                provider.model_name(),
            )
            .await?;
        embedded += 1;
    }

    Ok(BackfillReport {
        pending: pending.len(),
        embedded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use support_kb_core::models::{content_hash, ChunkRecord};
    use support_kb_core::store::memory::InMemoryStore;

    struct LengthProvider;

    #[async_trait]
    impl EmbeddingProvider for LengthProvider {
        fn model_name(&self) -> &str {
            "length"
        }
        fn dims(&self) -> usize {
            1
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.contains("poison") {
                bail!("rejected");
            }
            Ok(vec![text.len() as f32])
        }
    }

    fn pending_row(source: &str, index: i64, content: &str) -> ChunkRecord {
        ChunkRecord {
            source: source.to_string(),
            chunk_index: index,
            title: format!("Section {}", index + 1),
            content: content.to_string(),
            hash: content_hash(content),
            embedding: None,
            model: None,
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn test_backfill_embeds_all_pending() {
        let store = InMemoryStore::new();
        store.insert_chunk(&pending_row("a.txt", 0, "abc")).await.unwrap();
        store.insert_chunk(&pending_row("a.txt", 1, "abcdef")).await.unwrap();

        let report = embed_pending(&store, &LengthProvider, None).await.unwrap();
        assert_eq!(report, BackfillReport { pending: 2, embedded: 2 });

        let rows = store.chunks_for_source("a.txt").await.unwrap();
        assert_eq!(rows[1].embedding, Some(vec![6.0]));
        assert_eq!(rows[1].model.as_deref(), Some("length"));
        assert!(store.pending_embeddings(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_backfill_stops_at_first_failure() {
        let store = InMemoryStore::new();
        store.insert_chunk(&pending_row("a.txt", 0, "ok")).await.unwrap();
        store.insert_chunk(&pending_row("a.txt", 1, "poison")).await.unwrap();
        store.insert_chunk(&pending_row("a.txt", 2, "never")).await.unwrap();

        let err = embed_pending(&store, &LengthProvider, None).await.unwrap_err();
        assert!(err.to_string().contains("chunk 1 of a.txt"));

        let pending = store.pending_embeddings(None).await.unwrap();
        let indices: Vec<i64> = pending.iter().map(|r| r.chunk_index).collect();
        assert_eq!(indices, vec![1, 2]);
    }
}
