//! Vector storage abstraction.
//!
//! The [`VectorStore`] trait captures the access pattern the knowledge
//! base requires from the underlying index — insert, delete-by-source,
//! drop, similarity search — without assuming anything about its
//! internals. Implementations must be `Send + Sync`.
//!
//! Two backends ship with the crate: the SQLite-backed
//! [`SqliteStore`](crate::sqlite_store::SqliteStore) used in production
//! and the [`InMemoryStore`] used by the test suite.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{Chunk, SearchHit};

/// Abstract vector index, partitioned into named collections.
///
/// `collection` arguments take the backing index name
/// (`CollectionSpec::store_name`), not the category key.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert chunks with their embedding vectors. `chunks` and
    /// `vectors` are parallel slices.
    async fn insert(
        &self,
        collection: &str,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<()>;

    /// Delete every chunk whose source filename matches. Returns the
    /// number of chunks removed.
    async fn delete_by_source(&self, collection: &str, source: &str) -> Result<u64>;

    /// Remove a collection and everything in it. Dropping a collection
    /// that does not exist is not an error.
    async fn drop_collection(&self, collection: &str) -> Result<()>;

    /// Atomically replace a collection's entire contents. The default
    /// implementation is drop-then-insert; backends with transactions
    /// override it.
    async fn replace_collection(
        &self,
        collection: &str,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<()> {
        self.drop_collection(collection).await?;
        self.insert(collection, chunks, vectors).await
    }

    /// Top-`k` chunks by cosine similarity to the query vector, most
    /// similar first.
    async fn similarity_search(
        &self,
        collection: &str,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>>;

    /// Number of chunks currently stored in the collection.
    async fn count(&self, collection: &str) -> Result<u64>;
}

struct StoredEntry {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// In-memory store used in tests. Brute-force cosine similarity over
/// everything in the collection.
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Vec<StoredEntry>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
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
        let mut collections = self.collections.write().unwrap();
        let entries = collections.entry(collection.to_string()).or_default();
        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            entries.push(StoredEntry {
                chunk: chunk.clone(),
                vector: vector.clone(),
            });
        }
        Ok(())
    }

    async fn delete_by_source(&self, collection: &str, source: &str) -> Result<u64> {
        let mut collections = self.collections.write().unwrap();
        let Some(entries) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = entries.len();
        entries.retain(|e| e.chunk.metadata.source != source);
        Ok((before - entries.len()) as u64)
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        self.collections.write().unwrap().remove(collection);
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
        let entries = chunks
            .iter()
            .zip(vectors.iter())
            .map(|(chunk, vector)| StoredEntry {
                chunk: chunk.clone(),
                vector: vector.clone(),
            })
            .collect();
        self.collections
            .write()
            .unwrap()
            .insert(collection.to_string(), entries);
        Ok(())
    }

    async fn similarity_search(
        &self,
        collection: &str,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>> {
        let collections = self.collections.read().unwrap();
        let Some(entries) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<SearchHit> = entries
            .iter()
            .map(|e| SearchHit {
                text: e.chunk.text.clone(),
                source: e.chunk.metadata.source.clone(),
                score: cosine_similarity(query, &e.vector),
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
        let collections = self.collections.read().unwrap();
        Ok(collections.get(collection).map_or(0, |e| e.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::Category;
    use crate::models::ChunkMetadata;

    fn chunk(text: &str, source: &str) -> Chunk {
        Chunk {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.to_string(),
            metadata: ChunkMetadata {
                category: Category::Yatras,
                collection: "tirtha_yatras".to_string(),
                source: source.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn insert_and_count() {
        let store = InMemoryStore::new();
        store
            .insert(
                "tirtha_yatras",
                &[chunk("a", "x.txt"), chunk("b", "x.txt")],
                &[vec![1.0, 0.0], vec![0.0, 1.0]],
            )
            .await
            .unwrap();
        assert_eq!(store.count("tirtha_yatras").await.unwrap(), 2);
        assert_eq!(store.count("tirtha_faqs").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_by_source_removes_only_that_file() {
        let store = InMemoryStore::new();
        store
            .insert(
                "tirtha_yatras",
                &[chunk("a", "x.txt"), chunk("b", "y.txt")],
                &[vec![1.0], vec![1.0]],
            )
            .await
            .unwrap();

        let removed = store.delete_by_source("tirtha_yatras", "x.txt").await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count("tirtha_yatras").await.unwrap(), 1);

        let removed = store.delete_by_source("tirtha_yatras", "absent.txt").await.unwrap();
        assert_eq!(removed, 0);
    }

    #[tokio::test]
    async fn similarity_search_orders_by_score() {
        let store = InMemoryStore::new();
        store
            .insert(
                "tirtha_yatras",
                &[chunk("near", "a.txt"), chunk("far", "a.txt")],
                &[vec![1.0, 0.0], vec![0.0, 1.0]],
            )
            .await
            .unwrap();

        let hits = store
            .similarity_search("tirtha_yatras", &[1.0, 0.1], 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "near");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn replace_collection_supersedes_contents() {
        let store = InMemoryStore::new();
        store
            .insert("tirtha_yatras", &[chunk("old", "x.txt")], &[vec![1.0]])
            .await
            .unwrap();
        store
            .replace_collection("tirtha_yatras", &[chunk("new", "x.txt")], &[vec![1.0]])
            .await
            .unwrap();

        let hits = store
            .similarity_search("tirtha_yatras", &[1.0], 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "new");
    }

    #[tokio::test]
    async fn dropping_missing_collection_is_ok() {
        let store = InMemoryStore::new();
        store.drop_collection("tirtha_faqs").await.unwrap();
    }
}
