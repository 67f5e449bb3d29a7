//! Local vector store provider
//!
//! Wraps the synchronous `VectorStore` in blocking tasks.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::VectorDbConfig;
use crate::error::{Error, Result};
use crate::retrieval::VectorStore;
use crate::types::Chunk;

use super::vector_store::{VectorSearchResult, VectorStoreProvider};

/// Local vector store backed by a JSON collection file
pub struct LocalVectorStore {
    store: Arc<VectorStore>,
}

impl LocalVectorStore {
    /// Create from an existing VectorStore
    pub fn new(store: Arc<VectorStore>) -> Self {
        Self { store }
    }

    /// Open (or create) the configured collection
    pub fn from_config(config: &VectorDbConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(VectorStore::open(config)?)))
    }

    /// Underlying store for direct access
    pub fn inner(&self) -> &Arc<VectorStore> {
        &self.store
    }
}

fn join_error(e: tokio::task::JoinError) -> Error {
    Error::internal(format!("Task join error: {}", e))
}

#[async_trait]
impl VectorStoreProvider for LocalVectorStore {
    async fn insert_chunks(&self, chunks: Vec<Chunk>) -> Result<()> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.insert_chunks(chunks))
            .await
            .map_err(join_error)?
    }

    async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<VectorSearchResult>> {
        let store = self.store.clone();
        let query = query_embedding.to_vec();
        tokio::task::spawn_blocking(move || store.search(&query, top_k))
            .await
            .map_err(join_error)?
    }

    async fn delete_by_document(&self, document_id: &Uuid) -> Result<usize> {
        let store = self.store.clone();
        let doc_id = *document_id;
        tokio::task::spawn_blocking(move || store.delete_by_document(&doc_id))
            .await
            .map_err(join_error)?
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.store.len())
    }

    fn name(&self) -> &str {
        "local-json"
    }
}
