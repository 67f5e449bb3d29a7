//! RAG service: chunk, embed and store documents; retrieve and answer questions

use std::sync::Arc;
use uuid::Uuid;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::generation::{extractive_answer, PromptBuilder, EXTRACTIVE_CONFIDENCE};
use crate::ingestion::TextChunker;
use crate::providers::{
    create_embedder, create_llm, EmbeddingProvider, LlmProvider, LocalVectorStore,
    VectorStoreProvider,
};
use crate::security::sanitize_with_limit;
use crate::types::{Chunk, CollectionStats, Metadata, QueryResponse, Source};

/// Retrieval-augmented question answering over the chunk collection
pub struct RagService {
    chunker: TextChunker,
    embedder: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStoreProvider>,
    llm: Option<Arc<dyn LlmProvider>>,
    collection_name: String,
    max_input_chars: usize,
}

impl RagService {
    /// Assemble a service from explicit providers
    pub fn new(
        config: &RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStoreProvider>,
        llm: Option<Arc<dyn LlmProvider>>,
    ) -> Self {
        Self {
            chunker: TextChunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap),
            embedder,
            vector_store,
            llm,
            collection_name: config.vector_db.collection_name.clone(),
            max_input_chars: config.security.max_input_chars,
        }
    }

    /// Build the configured providers and open the persisted collection
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        let embedder = create_embedder(config)?;
        let vector_store: Arc<dyn VectorStoreProvider> =
            Arc::new(LocalVectorStore::from_config(&config.vector_db)?);
        let llm = create_llm(config)?;
        Ok(Self::new(config, embedder, vector_store, llm))
    }

    /// Chunk, embed and store documents
    ///
    /// `metadata[i]` is attached to every chunk of `documents[i]` (an empty
    /// map when missing) together with the chunk's position as `chunk_id`.
    /// Returns the number of chunks stored.
    pub async fn add_documents(&self, documents: &[String], metadata: &[Metadata]) -> Result<usize> {
        let mut chunks = Vec::new();

        for (i, document) in documents.iter().enumerate() {
            let base = metadata.get(i).cloned().unwrap_or_default();
            for (j, piece) in self.chunker.split_text(document.trim()).into_iter().enumerate() {
                let mut chunk_metadata = base.clone();
                chunk_metadata.insert("chunk_id".to_string(), j.into());
                chunks.push(Chunk::new(piece, chunk_metadata));
            }
        }

        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(Error::embedding(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }
        for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
            chunk.embedding = embedding;
        }

        let count = chunks.len();
        self.vector_store.insert_chunks(chunks).await?;
        tracing::info!("Added {} chunks from {} documents", count, documents.len());
        Ok(count)
    }

    /// Index one uploaded document under `document_id`
    pub async fn add_document(
        &self,
        document_id: Uuid,
        content: &str,
        mut metadata: Metadata,
    ) -> Result<usize> {
        metadata.insert("document_id".to_string(), document_id.to_string().into());
        self.add_documents(&[content.to_string()], &[metadata]).await
    }

    /// Answer a question from the `k` most similar chunks
    pub async fn query(&self, question: &str, k: usize) -> Result<QueryResponse> {
        let question = sanitize_with_limit(question, self.max_input_chars);
        if question.is_empty() {
            return Err(Error::validation("Question must not be empty"));
        }

        let query_embedding = self.embedder.embed(&question).await?;
        let results = self.vector_store.search(&query_embedding, k).await?;

        if results.is_empty() {
            tracing::info!("No documents matched question");
            return Ok(QueryResponse::not_found(question));
        }

        let context = PromptBuilder::build_context(&results);
        let best_similarity = results[0].similarity;

        let (answer, confidence) = match &self.llm {
            Some(llm) => match llm.generate_answer(&question, &context).await {
                Ok(generated) => {
                    let confidence = generated.score.unwrap_or(best_similarity).clamp(0.0, 1.0);
                    (generated.answer, confidence)
                }
                Err(e) => {
                    tracing::warn!("Generator {} failed, using extractive answer: {}", llm.name(), e);
                    (extractive_answer(&question, &context), EXTRACTIVE_CONFIDENCE)
                }
            },
            None => (extractive_answer(&question, &context), EXTRACTIVE_CONFIDENCE),
        };

        let sources = results
            .iter()
            .map(|r| Source::from_chunk(&r.chunk, r.similarity))
            .collect();

        tracing::info!(
            "Answered question with {} sources (confidence {:.2})",
            results.len(),
            confidence
        );

        Ok(QueryResponse {
            question,
            answer,
            sources,
            confidence,
        })
    }

    /// Collection statistics
    pub async fn stats(&self) -> Result<CollectionStats> {
        Ok(CollectionStats {
            total_documents: self.vector_store.len().await?,
            collection_name: self.collection_name.clone(),
        })
    }

    /// Remove every chunk of a document
    pub async fn delete_document(&self, document_id: &Uuid) -> Result<usize> {
        self.vector_store.delete_by_document(document_id).await
    }

    /// Embedding provider name
    pub fn embedder_name(&self) -> &str {
        self.embedder.name()
    }

    /// Generator name, `"extractive"` when none is configured
    pub fn llm_name(&self) -> String {
        self.llm
            .as_ref()
            .map(|llm| format!("{} ({})", llm.name(), llm.model()))
            .unwrap_or_else(|| "extractive".to_string())
    }

    /// Check the embedding provider and generator
    pub async fn health_check(&self) -> bool {
        let embedder_ok = self.embedder.health_check().await.unwrap_or(false);
        let llm_ok = match &self.llm {
            Some(llm) => llm.health_check().await.unwrap_or(false),
            None => true,
        };
        embedder_ok && llm_ok
    }
}
