//! SQLite-backed [`Store`] implementation.
//!
//! Maps each [`Store`] operation onto the `document_chunks` table created by
//! [`migrate`](crate::migrate).

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use support_kb_core::embedding::{blob_to_vec, vec_to_blob};
use support_kb_core::models::{ChunkRecord, SourceSummary};
use support_kb_core::store::Store;

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_record(row: &SqliteRow) -> ChunkRecord {
    let blob: Option<Vec<u8>> = row.get("embedding");
    ChunkRecord {
        source: row.get("source"),
        chunk_index: row.get("chunk_index"),
        title: row.get("title"),
        content: row.get("content"),
        hash: row.get("hash"),
        embedding: blob.map(|b| blob_to_vec(&b)),
        model: row.get("model"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn count_by_source(&self, source: &str) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM document_chunks WHERE source = ?")
            .bind(source)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn delete_by_source(&self, source: &str) -> Result<usize> {
        let result = sqlx::query("DELETE FROM document_chunks WHERE source = ?")
            .bind(source)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete chunks for {}", source))?;
        Ok(result.rows_affected() as usize)
    }

    async fn insert_chunk(&self, record: &ChunkRecord) -> Result<()> {
        let blob = record.embedding.as_deref().map(vec_to_blob);
        sqlx::query(
            r#"
            INSERT INTO document_chunks (id, source, chunk_index, title, content, hash,
                                         embedding, model, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&record.source)
        .bind(record.chunk_index)
        .bind(&record.title)
        .bind(&record.content)
        .bind(&record.hash)
        .bind(blob)
        .bind(&record.model)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .with_context(|| {
            format!(
                "Failed to insert chunk {} of {}",
                record.chunk_index, record.source
            )
        })?;
        Ok(())
    }

    async fn chunks_for_source(&self, source: &str) -> Result<Vec<ChunkRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT source, chunk_index, title, content, hash, embedding, model, created_at
            FROM document_chunks
            WHERE source = ?
            ORDER BY chunk_index
            "#,
        )
        .bind(source)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn list_sources(&self) -> Result<Vec<SourceSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT source,
                   COUNT(*) AS chunks,
                   SUM(CASE WHEN embedding IS NULL THEN 1 ELSE 0 END) AS pending
            FROM document_chunks
            GROUP BY source
            ORDER BY source
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let chunks: i64 = row.get("chunks");
                let pending: i64 = row.get("pending");
                SourceSummary {
                    source: row.get("source"),
                    chunks: chunks as usize,
                    pending: pending as usize,
                }
            })
            .collect())
    }

    async fn pending_embeddings(&self, limit: Option<usize>) -> Result<Vec<ChunkRecord>> {
        let limit_val = limit.map_or(-1, |l| l as i64);
        let rows = sqlx::query(
            r#"
            SELECT source, chunk_index, title, content, hash, embedding, model, created_at
            FROM document_chunks
            WHERE embedding IS NULL
            ORDER BY source, chunk_index
            LIMIT ?
            "#,
        )
        .bind(limit_val)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn set_embedding(
        &self,
        source: &str,
        chunk_index: i64,
        vector: &[f32],
        model: &str,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE document_chunks SET embedding = ?, model = ? WHERE source = ? AND chunk_index = ?",
        )
        .bind(vec_to_blob(vector))
        .bind(model)
        .bind(source)
        .bind(chunk_index)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            bail!("chunk {} of {} not found", chunk_index, source);
        }
        Ok(())
    }
}
