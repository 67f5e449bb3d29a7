//! Document and chunk types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Free-form chunk metadata (JSON object)
pub type Metadata = serde_json::Map<String, Value>;

/// Supported upload types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document
    Pdf,
    /// Microsoft Word document (.docx)
    Docx,
    /// Plain text file
    Txt,
}

impl FileType {
    /// Detect file type from an extension (with or without the leading dot)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" => Some(Self::Txt),
            _ => None,
        }
    }

    /// Detect file type from a filename's last extension
    pub fn from_filename(filename: &str) -> Option<Self> {
        filename
            .rsplit_once('.')
            .and_then(|(_, ext)| Self::from_extension(ext))
    }

    /// Extension including the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => ".pdf",
            Self::Docx => ".docx",
            Self::Txt => ".txt",
        }
    }

    /// MIME type used when archiving the original
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Docx => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            Self::Txt => "text/plain; charset=utf-8",
        }
    }
}

/// A chunk of document text with its embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk ID
    pub id: Uuid,
    /// Chunk text
    pub content: String,
    /// Document metadata plus `chunk_id` (position within the document)
    #[serde(default)]
    pub metadata: Metadata,
    /// Embedding vector
    #[serde(default)]
    pub embedding: Vec<f32>,
}

impl Chunk {
    /// Create a chunk without an embedding
    pub fn new(content: String, metadata: Metadata) -> Self {
        Self {
            id: Uuid::new_v4(),
            content,
            metadata,
            embedding: Vec::new(),
        }
    }

    /// Owning document, when the chunk came from an upload
    pub fn document_id(&self) -> Option<Uuid> {
        self.metadata
            .get("document_id")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
    }
}

/// Outcome of an upload
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Text extracted, chunked and indexed
    Processed,
    /// Identical content was already indexed; nothing new stored
    Duplicate,
}

/// Registry entry for an uploaded document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Document ID
    pub id: Uuid,
    /// Name the client uploaded
    pub original_filename: String,
    /// Generated storage name
    pub stored_filename: String,
    /// Upload size in bytes
    pub size: u64,
    /// File type
    pub file_type: FileType,
    /// SHA-256 of the extracted text
    pub content_hash: String,
    /// Chunks indexed for this document
    pub chunk_count: usize,
    /// Page count (PDF only)
    #[serde(default)]
    pub total_pages: Option<u32>,
    /// Object key of the archived original
    #[serde(default)]
    pub object_key: Option<String>,
    /// Uploading user
    pub uploaded_by: String,
    /// Upload time
    pub uploaded_at: DateTime<Utc>,
}
