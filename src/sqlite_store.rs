//! SQLite-backed [`VectorStore`].
//!
//! Chunks live in a single `chunks` table keyed by collection name;
//! embeddings are stored as little-endian f32 BLOBs and similarity is
//! computed in Rust over the collection's vectors. Collection replace
//! runs inside one transaction, which gives full reingest its
//! per-collection atomicity.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{Chunk, SearchHit};
use crate::store::VectorStore;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

async fn insert_chunk<'e, E>(executor: E, chunk: &Chunk, vector: &[f32]) -> Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        "INSERT INTO chunks (id, collection, category, source, text, embedding) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&chunk.id)
    .bind(&chunk.metadata.collection)
    .bind(chunk.metadata.category.as_str())
    .bind(&chunk.metadata.source)
    .bind(&chunk.text)
    .bind(vec_to_blob(vector))
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn insert(
        &self,
        collection: &str,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<()> {
        anyhow::ensure!(
            chunks.len() == vectors.len(),
            "chunk/vector length mismatch: {} vs {}",
            chunks.len(),
            vectors.len()
        );

        let mut tx = self.pool.begin().await?;
        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            debug_assert_eq!(chunk.metadata.collection, collection);
            insert_chunk(&mut *tx, chunk, vector).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_by_source(&self, collection: &str, source: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chunks WHERE collection = ? AND source = ?")
            .bind(collection)
            .bind(source)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        sqlx::query("DELETE FROM chunks WHERE collection = ?")
            .bind(collection)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn replace_collection(
        &self,
        collection: &str,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<()> {
        anyhow::ensure!(
            chunks.len() == vectors.len(),
            "chunk/vector length mismatch: {} vs {}",
            chunks.len(),
            vectors.len()
        );

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunks WHERE collection = ?")
            .bind(collection)
            .execute(&mut *tx)
            .await?;
        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            insert_chunk(&mut *tx, chunk, vector).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn similarity_search(
        &self,
        collection: &str,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>> {
        let rows = sqlx::query("SELECT text, source, embedding FROM chunks WHERE collection = ?")
            .bind(collection)
            .fetch_all(&self.pool)
            .await?;

        let mut hits: Vec<SearchHit> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vector = blob_to_vec(&blob);
                SearchHit {
                    text: row.get("text"),
                    source: row.get("source"),
                    score: cosine_similarity(query, &vector),
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE collection = ?")
            .bind(collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}
