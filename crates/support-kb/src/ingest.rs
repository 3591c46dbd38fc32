//! Ingestion pipeline orchestration.
//!
//! Coordinates the flow for each document: discovery → extraction →
//! chunking → embedding → storage. Chunks are embedded and inserted one at a
//! time; the first failure aborts the document and leaves whatever rows were
//! already written. A `--force` re-run deletes those rows before inserting.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use support_kb_core::chunk::{chunk_document_with, ChunkLimits};
use support_kb_core::embedding::EmbeddingProvider;
use support_kb_core::models::{Chunk, ChunkRecord};
use support_kb_core::store::Store;

use crate::config::{Config, DocumentsConfig};
use crate::db;
use crate::embedding::create_provider;
use crate::extract;
use crate::progress::{IngestProgressEvent, IngestProgressReporter};
use crate::sqlite_store::SqliteStore;

/// A file found under the documents root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Path relative to the documents root; used as the store's source key.
    pub source: String,
    pub path: PathBuf,
}

/// Result of ingesting or publishing one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The store already held `existing` chunks and `force` was not set.
    Skipped { existing: usize },
    /// The text produced no chunks; nothing was deleted or stored.
    Empty,
    Ingested {
        chunks: usize,
        /// Chunks stored with a vector; the rest are pending.
        embedded: usize,
        /// Rows deleted before inserting (forced re-ingest).
        replaced: usize,
    },
}

/// Walk the documents root and return matching files sorted by source name.
pub fn discover_documents(docs: &DocumentsConfig) -> Result<Vec<Document>> {
    let root = &docs.root;
    if !root.exists() {
        bail!("Documents root does not exist: {}", root.display());
    }

    let include_set = build_globset(&docs.include_globs)?;
    let mut excludes = vec!["**/.git/**".to_string()];
    excludes.extend(docs.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut documents = Vec::new();
    for entry in WalkDir::new(root).follow_links(docs.follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        documents.push(Document {
            source: rel_str,
            path: path.to_path_buf(),
        });
    }

    documents.sort_by(|a, b| a.source.cmp(&b.source));
    Ok(documents)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

/// Narrow the discovered set to `target`, matched against the source name or
/// the file name.
fn select_target(documents: Vec<Document>, target: Option<&str>) -> Result<Vec<Document>> {
    let Some(target) = target else {
        return Ok(documents);
    };

    let selected: Vec<Document> = documents
        .iter()
        .filter(|d| {
            d.source == target
                || d.path.file_name().and_then(|n| n.to_str()) == Some(target)
        })
        .cloned()
        .collect();

    if selected.is_empty() {
        let available: Vec<&str> = documents.iter().map(|d| d.source.as_str()).collect();
        bail!(
            "Unknown document: '{}'. Available: {}",
            target,
            if available.is_empty() {
                "(none)".to_string()
            } else {
                available.join(", ")
            }
        );
    }
    Ok(selected)
}

/// CLI entry point for `skb ingest`.
pub async fn run_ingest(
    config: &Config,
    target: Option<&str>,
    force: bool,
    dry_run: bool,
    progress: &dyn IngestProgressReporter,
) -> Result<()> {
    let documents = select_target(discover_documents(&config.documents)?, target)?;
    let limits = config.chunking.limits();

    if documents.is_empty() {
        println!("No documents found under {}", config.documents.root.display());
        return Ok(());
    }

    if dry_run {
        let mut total = 0usize;
        for doc in &documents {
            let text = extract::extract_file(&doc.path)?;
            let chunks = chunk_document_with(&text, &limits);
            println!("  {}: {} chunks", doc.source, chunks.len());
            total += chunks.len();
        }
        println!("Ingest dry run");
        println!("  documents: {}", documents.len());
        println!("  chunks:    {}", total);
        return Ok(());
    }

    let provider = create_provider(&config.embedding)?;
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);

    let mut ingested = 0usize;
    let mut skipped = 0usize;
    let mut empty = 0usize;
    let mut pending = 0usize;

    for doc in &documents {
        let text = extract::extract_file(&doc.path)?;
        let outcome = ingest_document(
            &store,
            provider.as_ref(),
            &doc.source,
            &text,
            &limits,
            force,
            progress,
        )
        .await
        .with_context(|| format!("Ingestion aborted for {}", doc.source))?;

        match outcome {
            IngestOutcome::Skipped { existing } => {
                skipped += 1;
                println!(
                    "{}: already ingested ({} chunks), skipping. Use --force to re-ingest.",
                    doc.source, existing
                );
            }
            IngestOutcome::Empty => {
                empty += 1;
                tracing::warn!(source = %doc.source, "document produced no chunks");
                println!("{}: no text to chunk, skipping.", doc.source);
            }
            IngestOutcome::Ingested {
                chunks,
                embedded,
                replaced,
            } => {
                ingested += 1;
                pending += chunks - embedded;
                if replaced > 0 {
                    println!(
                        "{}: replaced {} chunks with {} chunks",
                        doc.source, replaced, chunks
                    );
                } else {
                    println!("{}: ingested {} chunks", doc.source, chunks);
                }
            }
        }
    }

    store.pool().close().await;

    println!("Ingest complete");
    println!("  ingested: {}", ingested);
    println!("  skipped:  {}", skipped);
    if empty > 0 {
        println!("  empty:    {}", empty);
    }
    if pending > 0 {
        println!(
            "  pending embeddings: {} (run `skb embed pending`)",
            pending
        );
    }
    Ok(())
}

/// Chunk `text` and persist it under `source`.
pub async fn ingest_document(
    store: &dyn Store,
    provider: &dyn EmbeddingProvider,
    source: &str,
    text: &str,
    limits: &ChunkLimits,
    force: bool,
    progress: &dyn IngestProgressReporter,
) -> Result<IngestOutcome> {
    if !force {
        let existing = store.count_by_source(source).await?;
        if existing > 0 {
            return Ok(IngestOutcome::Skipped { existing });
        }
    }

    let chunks = chunk_document_with(text, limits);
    progress.report(IngestProgressEvent::Chunked {
        source: source.to_string(),
        chunks: chunks.len() as u64,
    });
    publish_chunks(store, provider, source, &chunks, force, progress).await
}

/// Persist an already-chunked list under `source`.
///
/// An empty list is reported as [`IngestOutcome::Empty`] and touches nothing.
/// Without `force`, a source that already has rows is left untouched. With
/// `force`, all existing rows for the source are deleted first. Each chunk's
/// embedding text is embedded and then inserted before the next chunk is
/// touched. When the provider is disabled, rows are stored without a vector.
pub async fn publish_chunks(
    store: &dyn Store,
    provider: &dyn EmbeddingProvider,
    source: &str,
    chunks: &[Chunk],
    force: bool,
    progress: &dyn IngestProgressReporter,
) -> Result<IngestOutcome> {
    if chunks.is_empty() {
        return Ok(IngestOutcome::Empty);
    }

    let existing = store.count_by_source(source).await?;
    let replaced = if existing > 0 {
        if !force {
            return Ok(IngestOutcome::Skipped { existing });
        }
        let deleted = store.delete_by_source(source).await?;
        tracing::info!(source, deleted, "deleted existing chunks before re-ingest");
        deleted
    } else {
        0
    };

    let created_at = chrono::Utc::now().timestamp();
    let total = chunks.len() as u64;
    let mut embedded = 0usize;

    for (n, chunk) in chunks.iter().enumerate() {
        let mut record = ChunkRecord::from_chunk(source, chunk, created_at);

        if provider.is_enabled() {
            let vector = provider.embed(&record.content).await.with_context(|| {
                format!("Failed to embed chunk {} ({})", chunk.index, chunk.title)
            })?;
            record = record.with_embedding(vector, provider.model_name());
            embedded += 1;
        }

        store.insert_chunk(&record).await?;
        tracing::debug!(source, index = chunk.index, "stored chunk");

        progress.report(IngestProgressEvent::Storing {
            source: source.to_string(),
            n: n as u64 + 1,
            total,
        });
    }

    Ok(IngestOutcome::Ingested {
        chunks: chunks.len(),
        embedded,
        replaced,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::DisabledProvider;
    use crate::progress::NoProgress;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use support_kb_core::store::memory::InMemoryStore;

    const FAQ: &str = "=====\nSECTION: Deposits\n=====\nDeposits arrive within one business day.\n\n=====\nSECTION: Fees\n=====\nThere are no monthly fees.\n\n=====\nSECTION: END OF DOCUMENT\n=====\n";

    /// Records every text it embeds; fails on the call numbered `fail_on`.
    struct FakeProvider {
        calls: AtomicUsize,
        fail_on: Option<usize>,
        seen: Mutex<Vec<String>>,
    }

    impl FakeProvider {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on: None,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing_on(call: usize) -> Self {
            Self {
                fail_on: Some(call),
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FakeProvider {
        fn model_name(&self) -> &str {
            "fake-model"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if Some(call) == self.fail_on {
                bail!("embedding service returned 503");
            }
            self.seen.lock().unwrap().push(text.to_string());
            Ok(vec![call as f32, 1.0])
        }
    }

    async fn ingest(
        store: &InMemoryStore,
        provider: &dyn EmbeddingProvider,
        force: bool,
    ) -> Result<IngestOutcome> {
        ingest_document(
            store,
            provider,
            "faq.txt",
            FAQ,
            &ChunkLimits::default(),
            force,
            &NoProgress,
        )
        .await
    }

    #[tokio::test]
    async fn test_ingest_embeds_prefixed_text() {
        let store = InMemoryStore::new();
        let provider = FakeProvider::new();

        let outcome = ingest(&store, &provider, false).await.unwrap();
        assert_eq!(
            outcome,
            IngestOutcome::Ingested {
                chunks: 2,
                embedded: 2,
                replaced: 0
            }
        );

        let seen = provider.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                "[Deposits]\n\nDeposits arrive within one business day.".to_string(),
                "[Fees]\n\nThere are no monthly fees.".to_string(),
            ]
        );

        let rows = store.chunks_for_source("faq.txt").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].title, "Deposits");
        assert_eq!(rows[0].content, seen[0]);
        assert_eq!(rows[1].embedding, Some(vec![1.0, 1.0]));
        assert_eq!(rows[1].model.as_deref(), Some("fake-model"));
    }

    #[tokio::test]
    async fn test_existing_source_is_skipped_without_force() {
        let store = InMemoryStore::new();
        let provider = FakeProvider::new();
        ingest(&store, &provider, false).await.unwrap();

        let outcome = ingest(&store, &provider, false).await.unwrap();
        assert_eq!(outcome, IngestOutcome::Skipped { existing: 2 });
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_force_replaces_existing_rows() {
        let store = InMemoryStore::new();
        let provider = FakeProvider::new();
        ingest(&store, &provider, false).await.unwrap();

        let outcome = ingest(&store, &provider, true).await.unwrap();
        assert_eq!(
            outcome,
            IngestOutcome::Ingested {
                chunks: 2,
                embedded: 2,
                replaced: 2
            }
        );
        assert_eq!(store.count_by_source("faq.txt").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_failure_aborts_and_force_recovers() {
        let store = InMemoryStore::new();
        let failing = FakeProvider::failing_on(1);

        let err = ingest(&store, &failing, false).await.unwrap_err();
        assert!(format!("{:#}", err).contains("503"));
        // The first chunk was written before the failure.
        assert_eq!(store.count_by_source("faq.txt").await.unwrap(), 1);

        let provider = FakeProvider::new();
        assert!(matches!(
            ingest(&store, &provider, false).await.unwrap(),
            IngestOutcome::Skipped { existing: 1 }
        ));
        assert!(matches!(
            ingest(&store, &provider, true).await.unwrap(),
            IngestOutcome::Ingested {
                chunks: 2,
                replaced: 1,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_disabled_provider_leaves_rows_pending() {
        let store = InMemoryStore::new();
        let outcome = ingest(&store, &DisabledProvider, false).await.unwrap();
        assert_eq!(
            outcome,
            IngestOutcome::Ingested {
                chunks: 2,
                embedded: 0,
                replaced: 0
            }
        );
        assert_eq!(store.pending_embeddings(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_blank_text_stores_nothing() {
        let store = InMemoryStore::new();
        let provider = FakeProvider::new();
        ingest(&store, &provider, false).await.unwrap();

        let outcome = ingest_document(
            &store,
            &provider,
            "faq.txt",
            "  \n=====\n\n",
            &ChunkLimits::default(),
            true,
            &NoProgress,
        )
        .await
        .unwrap();
        assert_eq!(outcome, IngestOutcome::Empty);
        // A forced but empty re-ingest keeps the existing rows.
        assert_eq!(store.count_by_source("faq.txt").await.unwrap(), 2);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_publish_edited_chunks() {
        let store = InMemoryStore::new();
        let provider = FakeProvider::new();
        let chunks = vec![Chunk {
            index: 0,
            title: "Section 1".to_string(),
            section: None,
            content: "Edited answer about refunds.".to_string(),
        }];

        publish_chunks(&store, &provider, "refunds", &chunks, false, &NoProgress)
            .await
            .unwrap();
        let rows = store.chunks_for_source("refunds").await.unwrap();
        assert_eq!(rows[0].content, "Edited answer about refunds.");
        assert_eq!(rows[0].title, "Section 1");
    }

    #[test]
    fn test_discover_documents_sorted_and_filtered() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("nested/a.md"), "a").unwrap();
        std::fs::write(dir.path().join("image.png"), "x").unwrap();

        let docs = DocumentsConfig {
            root: dir.path().to_path_buf(),
            ..DocumentsConfig::default()
        };
        let found = discover_documents(&docs).unwrap();
        let names: Vec<&str> = found.iter().map(|d| d.source.as_str()).collect();
        assert_eq!(names, vec!["b.txt", "nested/a.md"]);
    }

    #[test]
    fn test_unknown_target_lists_available() {
        let docs = vec![Document {
            source: "faq.txt".to_string(),
            path: PathBuf::from("/docs/faq.txt"),
        }];
        let err = select_target(docs.clone(), Some("terms.txt")).unwrap_err();
        assert!(err.to_string().contains("Available: faq.txt"));

        assert_eq!(select_target(docs.clone(), Some("faq.txt")).unwrap(), docs);
    }
}
