//! Core types for the RAG service

pub mod document;
pub mod query;
pub mod response;

pub use document::{Chunk, DocumentRecord, DocumentStatus, FileType, Metadata};
pub use query::QueryRequest;
pub use response::{CollectionStats, DocumentResponse, QueryResponse, Source};
