//! Ingested source listing and removal.
//!
//! Used by the `skb sources` / `skb delete` CLI commands and by the
//! `GET /sources` and `DELETE /ingest` HTTP endpoints.

use anyhow::{bail, Result};

use support_kb_core::models::SourceSummary;
use support_kb_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// CLI entry point for `skb sources`.
pub async fn run_sources(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);
    let sources = store.list_sources().await?;
    store.pool().close().await;

    print!("{}", format_sources(&sources));
    Ok(())
}

fn format_sources(sources: &[SourceSummary]) -> String {
    if sources.is_empty() {
        return "No sources ingested.\n".to_string();
    }

    let width = sources
        .iter()
        .map(|s| s.source.len())
        .max()
        .unwrap_or(0)
        .max("SOURCE".len());

    let mut out = format!("{:<width$}  {:>6}  {:>7}\n", "SOURCE", "CHUNKS", "PENDING");
    for s in sources {
        out.push_str(&format!(
            "{:<width$}  {:>6}  {:>7}\n",
            s.source, s.chunks, s.pending
        ));
    }
    out
}

/// Delete every chunk of `source`. Unknown sources are an error.
pub async fn delete_source(store: &dyn Store, source: &str) -> Result<usize> {
    let deleted = store.delete_by_source(source).await?;
    if deleted == 0 {
        bail!("source not found: {}", source);
    }
    tracing::info!(source, deleted, "deleted source");
    Ok(deleted)
}

/// CLI entry point for `skb delete <source>`.
pub async fn run_delete(config: &Config, source: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);
    let result = delete_source(&store, source).await;
    store.pool().close().await;

    let deleted = result?;
    println!("Deleted {} chunks for {}", deleted, source);
    Ok(())
}
