//! enterprise-rag: document Q&A service with source attribution
//!
//! Uploaded PDF, DOCX and text files are split into overlapping chunks,
//! embedded and stored in a persistent collection. Questions are answered
//! from the most similar chunks, either by an Ollama model or by an
//! extractive fallback, behind bearer-token auth and per-user rate limits.
//! Originals can be archived to a local bucket or an S3-compatible emulator.

pub mod client;
pub mod cloud;
pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod providers;
pub mod retrieval;
pub mod retry;
pub mod security;
pub mod server;
pub mod types;

#[cfg(test)]
mod test_support;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use retrieval::RagService;
pub use types::{
    document::{Chunk, DocumentRecord, FileType, Metadata},
    query::QueryRequest,
    response::{QueryResponse, Source},
};
