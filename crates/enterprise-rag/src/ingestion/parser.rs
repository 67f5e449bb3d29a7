//! Text extraction for PDF, DOCX and plain text uploads

use sha2::{Digest, Sha256};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::FileType;

/// Upper bound on a single PDF extraction
const PDF_EXTRACT_TIMEOUT: Duration = Duration::from_secs(60);

/// Parsed document with extracted text
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// File type
    pub file_type: FileType,
    /// Extracted text content
    pub content: String,
    /// SHA-256 of the content, for deduplication
    pub content_hash: String,
    /// Total pages (PDF only)
    pub total_pages: Option<u32>,
}

/// Multi-format file parser
pub struct FileParser;

impl FileParser {
    /// Extract text according to `file_type`
    pub fn parse(filename: &str, file_type: FileType, data: &[u8]) -> Result<ParsedDocument> {
        let (content, total_pages) = match file_type {
            FileType::Pdf => Self::parse_pdf(filename, data)?,
            FileType::Docx => (Self::parse_docx(filename, data)?, None),
            FileType::Txt => (Self::parse_text(filename, data)?, None),
        };

        if content.trim().is_empty() {
            return Err(Error::file_parse(filename, "No text content could be extracted"));
        }

        Ok(ParsedDocument {
            file_type,
            content_hash: hash_content(&content),
            content,
            total_pages,
        })
    }

    fn parse_pdf(filename: &str, data: &[u8]) -> Result<(String, Option<u32>)> {
        let raw = Self::extract_pdf_with_timeout(filename, data)?;
        let content = raw
            .replace('\0', "")
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        let total_pages = lopdf::Document::load_mem(data)
            .ok()
            .map(|doc| doc.get_pages().len() as u32);

        Ok((content, total_pages))
    }

    /// Run pdf-extract on a worker thread so a hang or panic cannot take the request down
    fn extract_pdf_with_timeout(filename: &str, data: &[u8]) -> Result<String> {
        let data_vec = data.to_vec();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = pdf_extract::extract_text_from_mem(&data_vec);
            let _ = tx.send(result);
        });

        match rx.recv_timeout(PDF_EXTRACT_TIMEOUT) {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => {
                tracing::warn!("pdf-extract failed on '{}': {}, trying fallback", filename, e);
                Self::extract_pdf_text_fallback(filename, data)
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::error!(
                    "PDF extraction of '{}' timed out after {}s",
                    filename,
                    PDF_EXTRACT_TIMEOUT.as_secs()
                );
                Self::extract_pdf_text_fallback(filename, data)
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                tracing::error!("PDF extraction thread for '{}' crashed", filename);
                Self::extract_pdf_text_fallback(filename, data)
            }
        }
    }

    /// Fallback PDF text extraction using lopdf directly
    fn extract_pdf_text_fallback(filename: &str, data: &[u8]) -> Result<String> {
        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::file_parse(filename, format!("Invalid PDF: {}", e)))?;
        let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
        doc.extract_text(&pages)
            .map_err(|e| Error::file_parse(filename, format!("PDF text extraction failed: {}", e)))
    }

    fn parse_docx(filename: &str, data: &[u8]) -> Result<String> {
        let doc = docx_rs::read_docx(data)
            .map_err(|e| Error::file_parse(filename, e.to_string()))?;

        let mut content = String::new();
        for child in doc.document.children {
            if let docx_rs::DocumentChild::Paragraph(p) = child {
                for child in p.children {
                    if let docx_rs::ParagraphChild::Run(run) = child {
                        for child in run.children {
                            if let docx_rs::RunChild::Text(t) = child {
                                content.push_str(&t.text);
                            }
                        }
                    }
                }
                content.push('\n');
            }
        }

        Ok(content)
    }

    fn parse_text(filename: &str, data: &[u8]) -> Result<String> {
        let text = std::str::from_utf8(data)
            .map_err(|e| Error::file_parse(filename, format!("File is not valid UTF-8: {}", e)))?;
        Ok(text.trim_start_matches('\u{FEFF}').to_string())
    }
}

/// Hash content for deduplication
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
