//! Vector store for chunk storage and search

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::config::VectorDbConfig;
use crate::error::{Error, Result};
use crate::providers::VectorSearchResult;
use crate::types::Chunk;

/// On-disk collection layout
#[derive(Serialize, Deserialize)]
struct PersistedCollection {
    name: String,
    chunks: Vec<Chunk>,
}

/// In-memory chunk collection searched by linear cosine scan
///
/// Every mutation rewrites the collection file when the store was opened
/// from a directory.
pub struct VectorStore {
    /// Collection name
    name: String,
    /// Collection file, `None` for purely in-memory stores
    path: Option<PathBuf>,
    /// Chunks in insertion order
    chunks: RwLock<Vec<Chunk>>,
}

impl VectorStore {
    /// Open the configured collection, loading existing chunks
    pub fn open(config: &VectorDbConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.persist_directory)?;
        let path = config.collection_path();

        let chunks = if path.exists() {
            let data = std::fs::read(&path)?;
            let collection: PersistedCollection = serde_json::from_slice(&data).map_err(|e| {
                Error::vector_db(format!("Corrupt collection file {}: {}", path.display(), e))
            })?;
            tracing::info!(
                "Loaded {} chunks from collection '{}'",
                collection.chunks.len(),
                collection.name
            );
            collection.chunks
        } else {
            Vec::new()
        };

        Ok(Self {
            name: config.collection_name.clone(),
            path: Some(path),
            chunks: RwLock::new(chunks),
        })
    }

    /// Create a store that is never written to disk
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            chunks: RwLock::new(Vec::new()),
        }
    }

    /// Collection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add embedded chunks to the collection
    pub fn insert_chunks(&self, new_chunks: Vec<Chunk>) -> Result<()> {
        if new_chunks.is_empty() {
            return Ok(());
        }
        if let Some(chunk) = new_chunks.iter().find(|c| c.embedding.is_empty()) {
            return Err(Error::vector_db(format!("Chunk {} has no embedding", chunk.id)));
        }

        let mut chunks = self.chunks.write();
        let expected = chunks
            .first()
            .map(|c| c.embedding.len())
            .unwrap_or(new_chunks[0].embedding.len());
        if let Some(chunk) = new_chunks.iter().find(|c| c.embedding.len() != expected) {
            return Err(Error::vector_db(format!(
                "Dimension mismatch: expected {}, got {}",
                expected,
                chunk.embedding.len()
            )));
        }

        let count = new_chunks.len();
        let mut next = Vec::with_capacity(chunks.len() + count);
        next.extend_from_slice(&chunks);
        next.extend(new_chunks);
        self.persist(&next)?;
        *chunks = next;

        tracing::debug!("Inserted {} chunks into '{}'", count, self.name);
        Ok(())
    }

    /// Return the `top_k` chunks most similar to `query_embedding`
    ///
    /// Results are ordered by descending cosine similarity; equal scores keep
    /// insertion order.
    pub fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<VectorSearchResult>> {
        let chunks = self.chunks.read();
        if chunks.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let dimensions = chunks[0].embedding.len();
        if query_embedding.len() != dimensions {
            return Err(Error::vector_db(format!(
                "Dimension mismatch: expected {}, got {}",
                dimensions,
                query_embedding.len()
            )));
        }

        let mut scored: Vec<(usize, f32)> = chunks
            .iter()
            .enumerate()
            .map(|(i, c)| (i, cosine_similarity(query_embedding, &c.embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(i, similarity)| VectorSearchResult {
                chunk: chunks[i].clone(),
                similarity,
            })
            .collect())
    }

    /// Remove every chunk belonging to `document_id`
    pub fn delete_by_document(&self, document_id: &Uuid) -> Result<usize> {
        let mut chunks = self.chunks.write();
        let remaining: Vec<Chunk> = chunks
            .iter()
            .filter(|c| c.document_id().as_ref() != Some(document_id))
            .cloned()
            .collect();
        let removed = chunks.len() - remaining.len();

        if removed > 0 {
            self.persist(&remaining)?;
            *chunks = remaining;
            tracing::debug!("Deleted {} chunks for document {}", removed, document_id);
        }
        Ok(removed)
    }

    /// Number of stored chunks
    pub fn len(&self) -> usize {
        self.chunks.read().len()
    }

    /// True when no chunks are stored
    pub fn is_empty(&self) -> bool {
        self.chunks.read().is_empty()
    }

    fn persist(&self, chunks: &[Chunk]) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let collection = PersistedCollection {
            name: self.name.clone(),
            chunks: chunks.to_vec(),
        };
        write_atomic(path, &serde_json::to_vec(&collection)?).map_err(|e| {
            tracing::error!("Failed to persist collection '{}': {}", self.name, e);
            e
        })
    }
}

/// Write through a temporary sibling file and rename over the target
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Cosine similarity; zero when either vector has no magnitude or lengths differ
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
