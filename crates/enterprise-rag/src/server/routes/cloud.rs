//! Object storage and function endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::response::ObjectListResponse;

#[derive(Debug, Default, Deserialize)]
pub struct ListObjectsQuery {
    #[serde(default)]
    pub prefix: String,
}

/// GET /cloud/objects - List archived objects
pub async fn list_objects(
    State(state): State<AppState>,
    Query(query): Query<ListObjectsQuery>,
) -> Result<Json<ObjectListResponse>> {
    let bucket = state
        .cloud()
        .bucket()
        .ok_or_else(|| Error::cloud("Object storage is disabled"))?
        .to_string();
    let objects = state.cloud().list_objects(&query.prefix).await?;

    Ok(Json(ObjectListResponse { bucket, objects }))
}

/// POST /cloud/functions/:name/invoke - Invoke a serverless function
pub async fn invoke_function(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>> {
    let result = state.cloud().invoke_function(&name, &payload).await?;
    Ok(Json(result))
}
