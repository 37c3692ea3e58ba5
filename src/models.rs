//! Core data types flowing through the ingestion and retrieval pipeline.

use serde::{Deserialize, Serialize};

use crate::collections::Category;

/// A source document discovered in the knowledge directory or received
/// through an upload. Superseded, never merged, when re-ingested under
/// the same filename.
#[derive(Debug, Clone)]
pub struct KnowledgeDocument {
    pub filename: String,
    pub content: String,
}

/// Metadata carried by every stored chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub category: Category,
    /// Name of the backing index the chunk lives in.
    pub collection: String,
    /// Filename the chunk was split from; drives replace-by-filename.
    pub source: String,
}

/// A bounded slice of a document's text, the unit of storage and retrieval.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A chunk returned from similarity search, most relevant first.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub text: String,
    pub source: String,
    pub score: f32,
}

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of conversation history as supplied by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

/// Listing entry for a knowledge source file on disk.
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeFileInfo {
    pub name: String,
    pub size_bytes: u64,
    pub modified: chrono::DateTime<chrono::Utc>,
}

/// Per-collection status reported by the collections endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionInfo {
    pub category: Category,
    pub name: String,
    pub description: String,
    pub file_patterns: Vec<String>,
    pub loaded: bool,
    pub document_count: u64,
}
