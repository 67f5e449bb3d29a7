//! Token endpoint

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::response::TokenResponse;

/// Credentials passed as query parameters
#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub username: String,
    pub password: String,
}

/// POST /auth/token - Exchange credentials for a bearer token
pub async fn issue_token(
    State(state): State<AppState>,
    Query(credentials): Query<TokenQuery>,
) -> Result<Json<TokenResponse>> {
    let username = credentials.username.clone();
    let verify_state = state.clone();

    let authenticated = tokio::task::spawn_blocking(move || {
        verify_state
            .users()
            .authenticate(&credentials.username, &credentials.password)
    })
    .await
    .map_err(|e| Error::internal(format!("Task join error: {}", e)))??;

    if !authenticated {
        tracing::warn!("Failed login for '{}'", username);
        return Err(Error::Unauthorized("Incorrect username or password".to_string()));
    }

    let access_token = state.tokens().create_access_token(&username, None)?;
    tracing::info!("Issued access token for '{}'", username);

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        expires_in: state.tokens().default_lifetime().num_seconds(),
    }))
}
