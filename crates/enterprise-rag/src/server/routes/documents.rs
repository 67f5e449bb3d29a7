//! Document upload and management endpoints

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    Extension, Json,
};
use bytes::Bytes;
use chrono::Utc;
use serde_json::json;
use std::time::Instant;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::security::Claims;
use crate::server::state::AppState;
use crate::types::{
    response::{DeleteResponse, DocumentListResponse},
    CollectionStats, DocumentRecord, DocumentResponse, DocumentStatus, Metadata,
};

/// Multipart field carrying the upload
const FILE_FIELD: &str = "file";

fn multipart_error(e: MultipartError) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge(e.body_text())
    } else {
        Error::validation(format!("Failed to read multipart body: {}", e.body_text()))
    }
}

/// Pull the `file` field out of the form
async fn read_file_field(multipart: &mut Multipart) -> Result<(String, Bytes)> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::validation("Uploaded file has no filename"))?;
        let data = field.bytes().await.map_err(multipart_error)?;
        return Ok((filename, data));
    }

    Err(Error::validation("No file provided"))
}

/// POST /documents/upload - Upload, extract, chunk and index a document
pub async fn upload_document(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<Json<DocumentResponse>> {
    let start = Instant::now();
    let (filename, data) = read_file_field(&mut multipart).await?;
    tracing::info!("Processing upload: {} ({} bytes) from {}", filename, data.len(), claims.sub);

    let service = state.document_service().clone();
    let upload_data = data.clone();
    let processed = tokio::task::spawn_blocking(move || service.process_upload(&filename, &upload_data))
        .await
        .map_err(|e| Error::internal(format!("Task join error: {}", e)))??;

    let _guard = state.ingest_lock().lock().await;

    if let Some(existing) = state.find_by_content_hash(&processed.content_hash) {
        tracing::info!(
            "Skipping duplicate: {} matches existing document {}",
            processed.original_filename,
            existing.id
        );
        return Ok(Json(DocumentResponse::from_record(&existing, DocumentStatus::Duplicate)));
    }

    let id = Uuid::new_v4();
    let mut metadata = Metadata::new();
    metadata.insert("source".to_string(), json!(processed.original_filename));
    metadata.insert("stored_filename".to_string(), json!(processed.filename));
    metadata.insert("file_type".to_string(), json!(processed.file_type.extension()));
    metadata.insert("uploaded_by".to_string(), json!(claims.sub));

    let chunk_count = state.rag().add_document(id, &processed.content, metadata).await?;

    let object_key = match state.cloud().archive_document(&processed.filename, data).await {
        Ok(key) => key,
        Err(e) => {
            tracing::warn!("Failed to archive {}: {}", processed.filename, e);
            None
        }
    };

    let record = DocumentRecord {
        id,
        original_filename: processed.original_filename,
        stored_filename: processed.filename,
        size: processed.size,
        file_type: processed.file_type,
        content_hash: processed.content_hash,
        chunk_count,
        total_pages: processed.total_pages,
        object_key,
        uploaded_by: claims.sub,
        uploaded_at: Utc::now(),
    };
    state.add_document(record.clone());

    tracing::info!(
        "Indexed {} as {} ({} chunks) in {:.1}s",
        record.original_filename,
        record.id,
        chunk_count,
        start.elapsed().as_secs_f64()
    );

    Ok(Json(DocumentResponse::from_record(&record, DocumentStatus::Processed)))
}

/// GET /documents - List uploaded documents
pub async fn list_documents(State(state): State<AppState>) -> Json<DocumentListResponse> {
    let documents: Vec<DocumentResponse> = state
        .list_documents()
        .iter()
        .map(|record| DocumentResponse::from_record(record, DocumentStatus::Processed))
        .collect();

    Json(DocumentListResponse {
        total: documents.len(),
        documents,
    })
}

/// GET /documents/stats - Collection statistics
pub async fn collection_stats(State(state): State<AppState>) -> Result<Json<CollectionStats>> {
    Ok(Json(state.rag().stats().await?))
}

/// DELETE /documents/:id - Remove a document and its chunks
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>> {
    let _guard = state.ingest_lock().lock().await;

    let record = state
        .get_document(&id)
        .ok_or_else(|| Error::DocumentNotFound(id.to_string()))?;

    let chunks_deleted = state.rag().delete_document(&id).await?;
    state.remove_document(&id);

    tracing::info!(
        "Deleted document {} ({}) with {} chunks",
        id,
        record.original_filename,
        chunks_deleted
    );

    Ok(Json(DeleteResponse { id, chunks_deleted }))
}
