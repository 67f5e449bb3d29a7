//! Query endpoint

use axum::{extract::State, Json};
use std::time::Instant;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{QueryRequest, QueryResponse};

/// POST /query - Answer a question from the indexed documents
pub async fn query_documents(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    if request.question.trim().is_empty() {
        return Err(Error::validation("Question must not be empty"));
    }

    let start = Instant::now();
    let k = request.effective_k();
    let response = state.rag().query(&request.question, k).await?;

    tracing::info!(
        "Query answered in {}ms ({} sources, k={})",
        start.elapsed().as_millis(),
        response.sources.len(),
        k
    );

    Ok(Json(response))
}
