//! Database schema migrations.
//!
//! Creates the `document_chunks` table and its source index. Every statement
//! is `IF NOT EXISTS`, so `skb init` can be run repeatedly.
//!
//! # Schema
//!
//! | Column | Type | Notes |
//! |--------|------|-------|
//! | `id` | TEXT | UUID primary key |
//! | `source` | TEXT | Document name, grouping key |
//! | `chunk_index` | INTEGER | Position within the source |
//! | `title` | TEXT | Chunk display title |
//! | `content` | TEXT | Embedding text, section prefix included |
//! | `hash` | TEXT | SHA-256 of `content` |
//! | `embedding` | BLOB | Little-endian `f32`s, NULL until embedded |
//! | `model` | TEXT | Embedding model, NULL until embedded |
//! | `created_at` | INTEGER | Unix seconds |

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Apply the schema to an open pool.
pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS document_chunks (
            id TEXT PRIMARY KEY,
            source TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            hash TEXT NOT NULL,
            embedding BLOB,
            model TEXT,
            created_at INTEGER NOT NULL,
            UNIQUE(source, chunk_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_document_chunks_source ON document_chunks(source)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
