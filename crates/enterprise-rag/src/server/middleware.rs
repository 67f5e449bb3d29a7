//! Authentication and rate limiting middleware

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
    Extension,
};

use crate::error::{Error, Result};
use crate::security::Claims;
use crate::server::state::AppState;

/// Token from an `Authorization: Bearer <token>` header
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Verify the bearer token and store its claims in request extensions
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| Error::Unauthorized("Not authenticated".to_string()))?;
    let claims = state.tokens().verify_token(token)?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Apply the per-user request limit
pub async fn rate_limit(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    request: Request,
    next: Next,
) -> Result<Response> {
    if let Err(e) = state.rate_limiter().check(&claims.sub) {
        tracing::warn!("Rate limit exceeded for '{}'", claims.sub);
        return Err(e);
    }
    Ok(next.run(request).await)
}
