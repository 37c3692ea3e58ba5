//! Knowledge base lifecycle management.
//!
//! [`KnowledgeBase`] owns the mapping from collection keys to the live
//! vector index and is the only component that mutates it. It decides
//! when the persisted index is stale (snapshot hash over the source
//! files), rebuilds all collections from disk, and applies incremental
//! replace-by-filename updates for uploads.
//!
//! The live collection set is copy-on-write: rebuilds assemble a new
//! set and swap it in wholesale, so concurrent queries never observe a
//! half-built registry. The snapshot hash is written only after every
//! collection has been rebuilt; a failure partway through leaves the
//! previous hash (and therefore a pending reingest) in place.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::chunk::split_text;
use crate::collections::{spec_for, Category};
use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::models::{Chunk, ChunkMetadata, CollectionInfo, KnowledgeDocument, KnowledgeFileInfo};
use crate::route::Router;
use crate::store::VectorStore;

/// Outcome of a full reingest, for operator-facing summaries.
#[derive(Debug, Clone, Copy)]
pub struct ReingestSummary {
    pub collections: usize,
    pub chunks: usize,
}

pub struct KnowledgeBase {
    config: Arc<Config>,
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    live: RwLock<Arc<HashSet<Category>>>,
}

impl KnowledgeBase {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            config,
            store,
            embedder,
            live: RwLock::new(Arc::new(HashSet::new())),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &dyn VectorStore {
        self.store.as_ref()
    }

    pub fn embedder(&self) -> &dyn EmbeddingProvider {
        self.embedder.as_ref()
    }

    /// Snapshot of the currently live collection set.
    pub fn live_categories(&self) -> Arc<HashSet<Category>> {
        self.live.read().unwrap().clone()
    }

    fn swap_live(&self, next: HashSet<Category>) {
        *self.live.write().unwrap() = Arc::new(next);
    }

    /// The router re-reads the mapping file so operator edits take
    /// effect on the next ingest without a restart.
    fn router(&self) -> Router {
        Router::new(&self.config.knowledge.mapping_file)
    }

    /// Attach to the already-persisted index without modification.
    pub async fn load_existing(&self) -> Result<()> {
        let mut live = HashSet::new();
        for category in Category::ALL {
            let count = self.store.count(spec_for(category).store_name).await?;
            if count > 0 {
                live.insert(category);
            }
        }
        tracing::info!("Loaded {} collection(s) from the existing index", live.len());
        self.swap_live(live);
        Ok(())
    }

    /// Rebuild when stale, otherwise attach to the persisted index.
    pub async fn init(&self) -> Result<()> {
        if self.needs_reingest()? {
            self.full_reingest().await?;
        } else {
            self.load_existing().await?;
        }
        Ok(())
    }

    // ---- Staleness ----

    /// Digest over every source file's name and bytes, in sorted
    /// filename order. Any byte change in any file changes the hash.
    pub fn snapshot_hash(&self) -> Result<String> {
        let mut hasher = Sha256::new();
        for file in self.source_files()? {
            let bytes = std::fs::read(&file.1)
                .with_context(|| format!("Failed to read {}", file.1.display()))?;
            hasher.update(file.0.as_bytes());
            hasher.update(&bytes);
        }
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// True when no snapshot hash is stored or the stored hash differs
    /// from a freshly computed one.
    pub fn needs_reingest(&self) -> Result<bool> {
        let hash_file = &self.config.knowledge.hash_file;
        if !hash_file.exists() {
            return Ok(true);
        }
        let stored = std::fs::read_to_string(hash_file)
            .with_context(|| format!("Failed to read {}", hash_file.display()))?;
        Ok(stored.trim() != self.snapshot_hash()?)
    }

    fn save_snapshot_hash(&self) -> Result<()> {
        let hash_file = &self.config.knowledge.hash_file;
        if let Some(parent) = hash_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(hash_file, self.snapshot_hash()?)
            .with_context(|| format!("Failed to write {}", hash_file.display()))?;
        Ok(())
    }

    // ---- Source scanning ----

    fn source_globs() -> GlobSet {
        let mut builder = GlobSetBuilder::new();
        for pattern in ["**/*.txt", "**/*.md"] {
            builder.add(Glob::new(pattern).expect("static glob"));
        }
        builder.build().expect("static globset")
    }

    /// Sorted `(filename, path)` pairs for every source document.
    fn source_files(&self) -> Result<Vec<(String, std::path::PathBuf)>> {
        let root = &self.config.knowledge.dir;
        if !root.exists() {
            tracing::warn!("Knowledge directory not found at {}", root.display());
            return Ok(Vec::new());
        }

        let include = Self::source_globs();
        let mut files = Vec::new();

        for entry in WalkDir::new(root) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            if !include.is_match(relative) {
                continue;
            }
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            files.push((filename, path.to_path_buf()));
        }

        // Sort for deterministic ordering
        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }

    /// Read every source document, skipping unreadable or blank files.
    pub fn scan_sources(&self) -> Result<Vec<KnowledgeDocument>> {
        let mut documents = Vec::new();
        for (filename, path) in self.source_files()? {
            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!("Skipping unreadable {}: {}", path.display(), e);
                    continue;
                }
            };
            if content.trim().is_empty() {
                continue;
            }
            documents.push(KnowledgeDocument { filename, content });
        }
        Ok(documents)
    }

    /// Knowledge file listing for the management API.
    pub fn list_files(&self) -> Result<Vec<KnowledgeFileInfo>> {
        let mut files = Vec::new();
        for (name, path) in self.source_files()? {
            let metadata = std::fs::metadata(&path)?;
            let modified = metadata
                .modified()
                .map(chrono::DateTime::<chrono::Utc>::from)
                .unwrap_or_else(|_| chrono::DateTime::UNIX_EPOCH);
            files.push(KnowledgeFileInfo {
                name,
                size_bytes: metadata.len(),
                modified,
            });
        }
        Ok(files)
    }

    // ---- Ingestion ----

    fn split(&self, text: &str) -> Vec<String> {
        split_text(
            text,
            self.config.chunking.max_chars,
            self.config.chunking.overlap_chars,
        )
    }

    fn tag_chunks(&self, texts: Vec<String>, category: Category, source: &str) -> Vec<Chunk> {
        let spec = spec_for(category);
        texts
            .into_iter()
            .map(|text| Chunk {
                id: uuid::Uuid::new_v4().to_string(),
                text,
                metadata: ChunkMetadata {
                    category,
                    collection: spec.store_name.to_string(),
                    source: source.to_string(),
                },
            })
            .collect()
    }

    /// Rebuild every collection from the source documents on disk.
    ///
    /// Each collection is replaced in a single store transaction, so a
    /// failure partway through the run leaves already-rebuilt
    /// collections intact and untouched ones on their previous
    /// contents. The snapshot hash is persisted only after the last
    /// collection succeeds.
    pub async fn full_reingest(&self) -> Result<ReingestSummary> {
        let router = self.router();
        let documents = self.scan_sources()?;

        let mut grouped: HashMap<Category, Vec<String>> = HashMap::new();
        for doc in documents {
            let category = router.classify(&doc.filename);
            tracing::debug!("Routed {} -> {}", doc.filename, category);
            grouped.entry(category).or_default().push(doc.content);
        }

        let mut live = HashSet::new();
        let mut total_chunks = 0usize;

        for category in Category::ALL {
            let Some(contents) = grouped.get(&category) else {
                tracing::info!("No content for the {} collection, skipping", category);
                continue;
            };

            let spec = spec_for(category);
            let combined = contents.join(&self.config.knowledge.separator);
            let texts = self.split(&combined);
            if texts.is_empty() {
                continue;
            }

            let vectors = self
                .embedder
                .embed(&texts)
                .await
                .with_context(|| format!("Embedding failed for the {} collection", category))?;
            // Combined rebuilds span file boundaries; chunks carry no
            // single source filename.
            let chunks = self.tag_chunks(texts, category, "");

            self.store
                .replace_collection(spec.store_name, &chunks, &vectors)
                .await
                .with_context(|| format!("Failed to rebuild the {} collection", category))?;

            tracing::info!("Rebuilt {} with {} chunk(s)", category, chunks.len());
            total_chunks += chunks.len();
            live.insert(category);
        }

        self.save_snapshot_hash()?;
        let summary = ReingestSummary {
            collections: live.len(),
            chunks: total_chunks,
        };
        self.swap_live(live);

        tracing::info!(
            "Reingest complete: {} collection(s), {} chunk(s)",
            summary.collections,
            summary.chunks
        );
        Ok(summary)
    }

    /// Replace-by-filename ingest of one document into one collection.
    ///
    /// Existing chunks with this source filename are removed first, so
    /// re-uploading a file updates rather than duplicates it. Returns
    /// the number of chunks inserted. The snapshot hash is not touched:
    /// uploads are out-of-band relative to the file-system-driven
    /// reingest.
    pub async fn ingest_one(
        &self,
        category: Category,
        content: &str,
        filename: &str,
    ) -> Result<usize> {
        let spec = spec_for(category);

        match self.store.delete_by_source(spec.store_name, filename).await {
            Ok(removed) if removed > 0 => {
                tracing::info!(
                    "Replaced {} previous chunk(s) of '{}' in {}",
                    removed,
                    filename,
                    category
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Could not clear previous chunks of '{}': {}", filename, e);
            }
        }

        let texts = self.split(content);
        if texts.is_empty() {
            return Ok(0);
        }

        let vectors = self
            .embedder
            .embed(&texts)
            .await
            .with_context(|| format!("Embedding failed for '{}'", filename))?;
        let chunks = self.tag_chunks(texts, category, filename);

        self.store
            .insert(spec.store_name, &chunks, &vectors)
            .await
            .with_context(|| format!("Failed to ingest '{}'", filename))?;

        let mut live = self.live_categories().as_ref().clone();
        live.insert(category);
        self.swap_live(live);

        tracing::info!("Ingested '{}' into {} ({} chunk(s))", filename, category, chunks.len());
        Ok(chunks.len())
    }

    /// Force the index stale, then rebuild it.
    pub async fn refresh(&self) -> Result<ReingestSummary> {
        let hash_file = &self.config.knowledge.hash_file;
        if hash_file.exists() {
            if let Err(e) = std::fs::remove_file(hash_file) {
                tracing::warn!("Could not clear snapshot hash: {}", e);
            }
        }
        self.full_reingest().await
    }

    /// Delete a source file from disk and rebuild. Returns `false`
    /// when no such file exists.
    pub async fn delete_file(&self, filename: &str) -> Result<bool> {
        let path = self.config.knowledge.dir.join(filename);
        if !path.is_file() {
            return Ok(false);
        }
        std::fs::remove_file(&path)
            .with_context(|| format!("Failed to delete {}", path.display()))?;
        tracing::info!("Deleted knowledge file '{}'", filename);
        self.full_reingest().await?;
        Ok(true)
    }

    /// Status of every collection for the management API.
    pub async fn collections_info(&self) -> Result<Vec<CollectionInfo>> {
        let live = self.live_categories();
        let mut info = Vec::with_capacity(Category::ALL.len());
        for category in Category::ALL {
            let spec = spec_for(category);
            let loaded = live.contains(&category);
            let document_count = if loaded {
                self.store.count(spec.store_name).await?
            } else {
                0
            };
            info.push(CollectionInfo {
                category,
                name: spec.store_name.to_string(),
                description: spec.description.to_string(),
                file_patterns: spec.keywords.iter().map(|k| k.to_string()).collect(),
                loaded,
                document_count,
            });
        }
        Ok(info)
    }
}
