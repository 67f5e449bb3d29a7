//! Response types for the HTTP API

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::{Chunk, DocumentRecord, DocumentStatus, Metadata};

/// Answer text when retrieval finds nothing
pub const NO_DOCUMENTS_ANSWER: &str = "No relevant documents found.";

/// A retrieved chunk attributed in an answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    /// Chunk text
    pub content: String,
    /// Chunk metadata (document metadata plus `chunk_id`)
    pub metadata: Metadata,
    /// Cosine similarity to the question
    pub similarity: f32,
}

impl Source {
    /// Create a source from a retrieved chunk
    pub fn from_chunk(chunk: &Chunk, similarity: f32) -> Self {
        Self {
            content: chunk.content.clone(),
            metadata: chunk.metadata.clone(),
            similarity,
        }
    }
}

/// Answer with sources and confidence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// The (sanitized) question
    pub question: String,
    /// Generated or extracted answer
    pub answer: String,
    /// Retrieved chunks in rank order
    pub sources: Vec<Source>,
    /// Confidence in [0, 1]
    pub confidence: f32,
}

impl QueryResponse {
    /// Response for a question with no retrievable context
    pub fn not_found(question: String) -> Self {
        Self {
            question,
            answer: NO_DOCUMENTS_ANSWER.to_string(),
            sources: Vec::new(),
            confidence: 0.0,
        }
    }
}

/// Upload result / document listing entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResponse {
    /// Document ID
    pub id: Uuid,
    /// Name the client uploaded
    pub filename: String,
    /// Generated storage name
    pub stored_filename: String,
    /// Upload size in bytes
    pub size: u64,
    /// Extension with leading dot (".pdf")
    #[serde(rename = "type")]
    pub file_type: String,
    /// Processing outcome
    pub status: DocumentStatus,
    /// Chunks indexed for the document
    pub chunks: usize,
}

impl DocumentResponse {
    /// Build from a registry record
    pub fn from_record(record: &DocumentRecord, status: DocumentStatus) -> Self {
        Self {
            id: record.id,
            filename: record.original_filename.clone(),
            stored_filename: record.stored_filename.clone(),
            size: record.size,
            file_type: record.file_type.extension().to_string(),
            status,
            chunks: record.chunk_count,
        }
    }
}

/// Document list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentListResponse {
    /// Uploaded documents, newest first
    pub documents: Vec<DocumentResponse>,
    /// Total count
    pub total: usize,
}

/// Document deletion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    /// Deleted document
    pub id: Uuid,
    /// Chunks removed from the vector store
    pub chunks_deleted: usize,
}

/// Vector collection statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStats {
    /// Number of stored chunks
    pub total_documents: usize,
    /// Collection name
    pub collection_name: String,
}

/// Access token response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Signed JWT
    pub access_token: String,
    /// Always "bearer"
    pub token_type: String,
    /// Lifetime in seconds
    pub expires_in: i64,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "healthy"
    pub status: String,
    /// Application name
    pub app: String,
    /// Crate version
    pub version: String,
    /// Registered uploads
    pub documents: usize,
    /// Indexed chunks
    pub chunks: usize,
    /// Embedding backend name
    pub embedding_provider: String,
    /// Answer backend name
    pub llm_provider: String,
    /// Object store name, if enabled
    pub object_store: Option<String>,
}

/// Object listing response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectListResponse {
    /// Bucket name
    pub bucket: String,
    /// Stored objects
    pub objects: Vec<crate::cloud::ObjectInfo>,
}
