//! Upload validation and text extraction

use crate::config::DocumentConfig;
use crate::error::{Error, Result};
use crate::security::generate_secure_filename;
use crate::types::FileType;

use super::parser::FileParser;

/// An upload after validation and extraction
#[derive(Debug, Clone)]
pub struct ProcessedUpload {
    /// Name the client uploaded
    pub original_filename: String,
    /// Generated storage name
    pub filename: String,
    /// Extracted text
    pub content: String,
    /// Upload size in bytes
    pub size: u64,
    /// File type
    pub file_type: FileType,
    /// SHA-256 of the extracted text
    pub content_hash: String,
    /// Page count (PDF only)
    pub total_pages: Option<u32>,
}

/// Validates uploads and extracts their text
#[derive(Debug, Clone)]
pub struct DocumentService {
    max_file_size: u64,
}

impl DocumentService {
    /// Create from document configuration
    pub fn new(config: &DocumentConfig) -> Self {
        Self {
            max_file_size: config.max_document_size_bytes(),
        }
    }

    /// Largest accepted upload in bytes
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Check extension and size, returning the detected type
    pub fn validate(&self, filename: &str, size: u64) -> Result<FileType> {
        let file_type = FileType::from_filename(filename).ok_or_else(|| {
            let ext = filename
                .rsplit_once('.')
                .map(|(_, ext)| format!(".{}", ext.to_lowercase()))
                .unwrap_or_else(|| "(none)".to_string());
            Error::UnsupportedFileType(format!("{} - allowed: .pdf, .docx, .txt", ext))
        })?;

        if size == 0 || size > self.max_file_size {
            return Err(Error::validation("Invalid file type or size."));
        }

        Ok(file_type)
    }

    /// Validate an upload and extract its text
    pub fn process_upload(&self, filename: &str, data: &[u8]) -> Result<ProcessedUpload> {
        let file_type = self.validate(filename, data.len() as u64)?;
        let parsed = FileParser::parse(filename, file_type, data)?;

        Ok(ProcessedUpload {
            original_filename: filename.to_string(),
            filename: generate_secure_filename(filename),
            content: parsed.content,
            size: data.len() as u64,
            file_type,
            content_hash: parsed.content_hash,
            total_pages: parsed.total_pages,
        })
    }
}
