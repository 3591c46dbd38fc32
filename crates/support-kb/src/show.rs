//! Stored chunk display for one source.

use anyhow::{bail, Result};

use support_kb_core::models::ChunkRecord;
use support_kb_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Fetch all rows for `source`, ordered by chunk index.
pub async fn get_source(store: &dyn Store, source: &str) -> Result<Vec<ChunkRecord>> {
    let rows = store.chunks_for_source(source).await?;
    if rows.is_empty() {
        bail!("source not found: {}", source);
    }
    Ok(rows)
}

/// CLI entry point for `skb show <source>`.
pub async fn run_show(config: &Config, source: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);
    let result = get_source(&store, source).await;
    store.pool().close().await;
    let rows = result?;

    let pending = rows.iter().filter(|r| r.embedding.is_none()).count();
    println!("--- Source ---");
    println!("source:  {}", source);
    println!("chunks:  {}", rows.len());
    println!("pending: {}", pending);
    println!();

    for row in &rows {
        let model = row.model.as_deref().unwrap_or("pending");
        println!("[chunk {}] {} ({})", row.chunk_index, row.title, model);
        println!("{}", row.content);
        println!();
    }
    Ok(())
}
