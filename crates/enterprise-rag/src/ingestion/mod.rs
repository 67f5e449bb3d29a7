//! Document ingestion: validation, text extraction and chunking

mod chunker;
mod parser;
mod service;

pub use chunker::TextChunker;
pub use parser::{hash_content, FileParser, ParsedDocument};
pub use service::{DocumentService, ProcessedUpload};
