//! HTTP client for the RAG API, used by the terminal companion

use reqwest::{multipart, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::response::{
    DeleteResponse, DocumentListResponse, HealthResponse, ObjectListResponse, TokenResponse,
};
use crate::types::{CollectionStats, DocumentResponse, QueryRequest, QueryResponse};

/// Typed client for the RAG HTTP API
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a client for `base_url` (e.g. `http://localhost:8000`)
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(300)).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Use an existing access token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Current access token
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Server base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn bearer(&self) -> Result<String> {
        self.token
            .as_ref()
            .map(|t| format!("Bearer {}", t))
            .ok_or_else(|| Error::Unauthorized("Not logged in".to_string()))
    }

    /// Exchange credentials for a token and keep it for later calls
    pub async fn authenticate(&mut self, username: &str, password: &str) -> Result<TokenResponse> {
        let response = self
            .http
            .post(self.url("/auth/token"))
            .query(&[("username", username), ("password", password)])
            .send()
            .await?;
        let token: TokenResponse = handle_response(response).await?;
        self.token = Some(token.access_token.clone());
        Ok(token)
    }

    /// Upload a PDF, DOCX or TXT file
    pub async fn upload_document(&self, path: &Path) -> Result<DocumentResponse> {
        let data = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| Error::validation(format!("Not a file: {}", path.display())))?;
        let mime = mime_guess::from_path(path).first_or_octet_stream();

        let part = multipart::Part::bytes(data)
            .file_name(filename)
            .mime_str(mime.as_ref())?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(self.url("/documents/upload"))
            .header(reqwest::header::AUTHORIZATION, self.bearer()?)
            .multipart(form)
            .send()
            .await?;
        handle_response(response).await
    }

    /// Ask a question
    pub async fn query(&self, question: &str, max_results: usize) -> Result<QueryResponse> {
        let request = QueryRequest::new(question).with_max_results(max_results);
        let response = self
            .http
            .post(self.url("/query"))
            .header(reqwest::header::AUTHORIZATION, self.bearer()?)
            .json(&request)
            .send()
            .await?;
        handle_response(response).await
    }

    /// List uploaded documents
    pub async fn list_documents(&self) -> Result<DocumentListResponse> {
        self.get_authorized("/documents").await
    }

    /// Collection statistics
    pub async fn stats(&self) -> Result<CollectionStats> {
        self.get_authorized("/documents/stats").await
    }

    /// List archived objects under `prefix`
    pub async fn list_objects(&self, prefix: &str) -> Result<ObjectListResponse> {
        let response = self
            .http
            .get(self.url("/cloud/objects"))
            .query(&[("prefix", prefix)])
            .header(reqwest::header::AUTHORIZATION, self.bearer()?)
            .send()
            .await?;
        handle_response(response).await
    }

    /// Delete a document
    pub async fn delete_document(&self, id: Uuid) -> Result<DeleteResponse> {
        let response = self
            .http
            .delete(self.url(&format!("/documents/{}", id)))
            .header(reqwest::header::AUTHORIZATION, self.bearer()?)
            .send()
            .await?;
        handle_response(response).await
    }

    /// Server health
    pub async fn health(&self) -> Result<HealthResponse> {
        let response = self.http.get(self.url("/health")).send().await?;
        handle_response(response).await
    }

    async fn get_authorized<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .http
            .get(self.url(path))
            .header(reqwest::header::AUTHORIZATION, self.bearer()?)
            .send()
            .await?;
        handle_response(response).await
    }
}

/// Decode a success body, or turn an error body into an `Error`
async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());
    let body = response.text().await.unwrap_or_default();
    Err(error_from_status(status, &body, retry_after))
}

/// Map an API error response back onto the crate error type
fn error_from_status(status: StatusCode, body: &str, retry_after: Option<u64>) -> Error {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.to_string()
            } else {
                body.to_string()
            }
        });

    match status {
        StatusCode::UNAUTHORIZED => Error::Unauthorized(message),
        StatusCode::NOT_FOUND => Error::DocumentNotFound(message),
        StatusCode::PAYLOAD_TOO_LARGE => Error::PayloadTooLarge(message),
        StatusCode::TOO_MANY_REQUESTS => Error::RateLimited {
            retry_after_secs: retry_after.unwrap_or(60),
        },
        s if s.is_client_error() => Error::Validation(message),
        s => Error::internal(format!("Server returned {}: {}", s, message)),
    }
}
