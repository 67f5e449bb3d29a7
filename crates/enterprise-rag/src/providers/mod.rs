//! Provider abstractions for embeddings, answer generation and vector storage
//!
//! Trait objects let the service switch between the offline backends and an
//! Ollama server through configuration.

pub mod embedding;
pub mod llm;
pub mod local;
pub mod ollama;
pub mod vector_store;

use std::sync::Arc;

use crate::config::{EmbeddingBackend, LlmBackend, RagConfig};
use crate::error::Result;

pub use embedding::{EmbeddingProvider, HashEmbedder};
pub use llm::{GeneratedAnswer, LlmProvider};
pub use local::LocalVectorStore;
pub use ollama::{OllamaEmbedder, OllamaLlm};
pub use vector_store::{VectorSearchResult, VectorStoreProvider};

/// Build the configured embedding provider
pub fn create_embedder(config: &RagConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let dimensions = config.embeddings.dimensions;
    let embedder: Arc<dyn EmbeddingProvider> = match config.embeddings.provider {
        EmbeddingBackend::Hash => Arc::new(HashEmbedder::new(dimensions)),
        EmbeddingBackend::Ollama => Arc::new(OllamaEmbedder::new(&config.llm, dimensions)?),
    };
    tracing::info!(
        "Embedding provider: {} ({} dimensions)",
        embedder.name(),
        embedder.dimensions()
    );
    Ok(embedder)
}

/// Build the configured generator, if any
pub fn create_llm(config: &RagConfig) -> Result<Option<Arc<dyn LlmProvider>>> {
    match config.llm.provider {
        LlmBackend::None => {
            tracing::info!("No generator configured, using extractive answers");
            Ok(None)
        }
        LlmBackend::Ollama => {
            let llm = OllamaLlm::new(&config.llm)?;
            tracing::info!("LLM provider: ollama ({})", llm.model());
            Ok(Some(Arc::new(llm)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backends() {
        let config = RagConfig::default();
        let embedder = create_embedder(&config).unwrap();
        assert_eq!(embedder.name(), "hash");
        assert_eq!(embedder.dimensions(), 384);
        assert!(create_llm(&config).unwrap().is_none());
    }

    #[test]
    fn test_ollama_backends() {
        let mut config = RagConfig::default();
        config.embeddings.provider = EmbeddingBackend::Ollama;
        config.llm.provider = LlmBackend::Ollama;
        assert_eq!(create_embedder(&config).unwrap().name(), "ollama");
        let llm = create_llm(&config).unwrap().unwrap();
        assert_eq!(llm.model(), "llama3.2:3b");
    }
}
