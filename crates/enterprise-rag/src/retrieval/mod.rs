//! Retrieval: the chunk collection and the RAG service built on it

mod search;
mod service;

pub use search::{cosine_similarity, VectorStore};
pub(crate) use search::write_atomic;
pub use service::RagService;
