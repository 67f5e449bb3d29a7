//! API routes for the RAG server

pub mod auth;
pub mod cloud;
pub mod documents;
pub mod query;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::limit::RequestBodyLimitLayer;

use crate::server::middleware::{rate_limit, require_auth};
use crate::server::state::AppState;

/// Multipart framing allowance on top of the document size limit
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Build all API routes
pub fn api_routes(state: &AppState) -> Router<AppState> {
    let max_upload = usize::try_from(state.config().documents.max_document_size_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    let upload = Router::new()
        .route("/documents/upload", post(documents::upload_document))
        .route_layer(DefaultBodyLimit::disable())
        .route_layer(RequestBodyLimitLayer::new(max_upload));

    // Expensive endpoints, limited per user
    let limited = Router::new()
        .route("/query", post(query::query_documents))
        .merge(upload)
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    let protected = Router::new()
        .route("/documents", get(documents::list_documents))
        .route("/documents/stats", get(documents::collection_stats))
        .route("/documents/:id", delete(documents::delete_document))
        .route("/cloud/objects", get(cloud::list_objects))
        .route("/cloud/functions/:name/invoke", post(cloud::invoke_function))
        .merge(limited)
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/auth/token", post(auth::issue_token))
        .route("/info", get(info))
        .merge(protected)
}

/// API info endpoint
async fn info() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "enterprise-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Document Q&A with source attribution",
        "endpoints": {
            "GET /health": "Service health and collection size",
            "GET /ready": "Readiness check (providers reachable)",
            "POST /auth/token": "Exchange username/password (query parameters) for a bearer token",
            "POST /documents/upload": "Upload a PDF, DOCX or TXT file (multipart field 'file')",
            "GET /documents": "List uploaded documents",
            "GET /documents/stats": "Collection statistics",
            "DELETE /documents/:id": "Delete a document and its chunks",
            "POST /query": "Ask a question ({question, max_results})",
            "GET /cloud/objects": "List archived objects (?prefix=)",
            "POST /cloud/functions/:name/invoke": "Invoke a serverless function with a JSON payload"
        },
        "features": {
            "deduplication": "Identical extracted text is indexed once",
            "extractive_fallback": "Answers fall back to the best-matching context sentence",
            "rate_limiting": "Uploads and queries are limited per user per minute"
        }
    }))
}
