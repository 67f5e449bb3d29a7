//! HTTP server for the RAG system

pub mod middleware;
pub mod routes;
pub mod state;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::types::response::HealthResponse;
use state::AppState;

/// RAG HTTP Server
pub struct RagServer {
    config: RagConfig,
    state: AppState,
}

impl RagServer {
    /// Create a new RAG server
    pub async fn new(config: RagConfig) -> Result<Self> {
        let state = AppState::new(config.clone()).await?;
        Ok(Self { config, state })
    }

    /// Create around existing state
    pub fn from_state(state: AppState) -> Self {
        Self {
            config: state.config().clone(),
            state,
        }
    }

    /// Shared state
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let router = self.build_router();

        tracing::info!("Starting {} on http://{}", self.config.app_name, addr);
        tracing::info!("API overview: http://{}/info", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind {}: {}", addr, e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Router over `state` with tracing, compression and CORS
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness))
        .merge(routes::api_routes(&state))
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new());

    // CORS is outermost so preflight requests never reach auth
    if state.config().server.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router = router.layer(cors);
    }

    router
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let chunks = state.rag().stats().await?.total_documents;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        app: state.config().app_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        documents: state.document_count(),
        chunks,
        embedding_provider: state.rag().embedder_name().to_string(),
        llm_provider: state.rag().llm_name(),
        object_store: state.cloud().describe(),
    }))
}

/// Ready once the embedding and answer providers respond
async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.rag().health_check().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::CloudService;
    use crate::config::CloudBackend;
    use crate::retrieval::RagService;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "XTESTBOUNDARYX";

    struct TestApp {
        router: Router,
        state: AppState,
        _dir: TempDir,
    }

    fn test_config(dir: &TempDir) -> RagConfig {
        let mut config = RagConfig::default();
        config.security.secret_key = "test-secret-key".to_string();
        config.security.rate_limit_per_minute = 100;
        config.vector_db.persist_directory = dir.path().join("db");
        config.cloud.backend = CloudBackend::Local;
        config.cloud.local_root = dir.path().join("objects");
        config
    }

    async fn app_with(config: RagConfig, dir: TempDir) -> TestApp {
        let rag = RagService::from_config(&config).unwrap();
        let cloud = CloudService::from_config(&config.cloud).unwrap();
        assert!(cloud.setup_infrastructure().await);
        let state = AppState::with_services(config, rag, cloud).unwrap();
        TestApp {
            router: build_router(state.clone()),
            state,
            _dir: dir,
        }
    }

    async fn app() -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        app_with(config, dir).await
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, value)
    }

    async fn login(router: &Router) -> String {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/auth/token?username=demo&password=demo123")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(router, request).await;
        assert_eq!(status, StatusCode::OK);
        body["access_token"].as_str().unwrap().to_string()
    }

    fn upload_request(token: &str, filename: &str, content: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri("/documents/upload")
            .header(header::CONTENT_LENGTH, body.len())
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn json_request(method: Method, uri: &str, token: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_and_ready() {
        let app = app().await;
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&app.router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["app"], "My RAG Bot");
        assert_eq!(body["documents"], 0);
        assert_eq!(body["embedding_provider"], "hash");
        assert_eq!(body["llm_provider"], "extractive");

        let request = Request::builder().uri("/ready").body(Body::empty()).unwrap();
        assert_eq!(send(&app.router, request).await.0, StatusCode::OK);
    }

    struct UnreachableLlm;

    #[async_trait::async_trait]
    impl crate::providers::LlmProvider for UnreachableLlm {
        async fn generate_answer(
            &self,
            _question: &str,
            _context: &str,
        ) -> Result<crate::providers::GeneratedAnswer> {
            Err(Error::llm("connection refused"))
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(false)
        }

        fn name(&self) -> &str {
            "unreachable"
        }

        fn model(&self) -> &str {
            "none"
        }
    }

    #[tokio::test]
    async fn test_not_ready_while_generator_is_down() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let embedder = crate::providers::create_embedder(&config).unwrap();
        let store = std::sync::Arc::new(
            crate::providers::LocalVectorStore::from_config(&config.vector_db).unwrap(),
        );
        let rag = RagService::new(&config, embedder, store, Some(std::sync::Arc::new(UnreachableLlm)));
        let cloud = CloudService::disabled();
        let state = AppState::with_services(config, rag, cloud).unwrap();
        let router = build_router(state);

        let request = Request::builder().uri("/ready").body(Body::empty()).unwrap();
        assert_eq!(send(&router, request).await.0, StatusCode::SERVICE_UNAVAILABLE);

        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        assert_eq!(send(&router, request).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let app = app().await;
        let request = Request::builder()
            .method(Method::POST)
            .uri("/auth/token?username=demo&password=wrong")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app.router, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["type"], "unauthorized");

        let token = login(&app.router).await;
        let claims = app.state.tokens().verify_token(&token).unwrap();
        assert_eq!(claims.sub, "demo");
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        let app = app().await;

        let request = Request::builder().uri("/documents").body(Body::empty()).unwrap();
        let (status, body) = send(&app.router, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["message"], "Not authenticated");

        let (status, _) = send(&app.router, get_request("/documents", "not-a-jwt")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let request = json_request(Method::POST, "/query", "bogus", json!({"question": "hi"}));
        assert_eq!(send(&app.router, request).await.0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_upload_query_list_delete_flow() {
        let app = app().await;
        let token = login(&app.router).await;

        let (status, body) = send(
            &app.router,
            upload_request(&token, "python.txt", b"Python is a programming language. Rust is a systems language"),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["status"], "processed");
        assert_eq!(body["filename"], "python.txt");
        assert_eq!(body["type"], ".txt");
        assert_eq!(body["chunks"], 1);
        let id = body["id"].as_str().unwrap().to_string();

        // archived original
        let (status, objects) = send(&app.router, get_request("/cloud/objects?prefix=documents/", &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(objects["bucket"], "enterprise-documents");
        assert_eq!(objects["objects"].as_array().unwrap().len(), 1);

        let request = json_request(
            Method::POST,
            "/query",
            &token,
            json!({"question": "  Is Rust a systems language  ", "max_results": 3}),
        );
        let (status, body) = send(&app.router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["question"], "Is Rust a systems language");
        assert_eq!(body["answer"], "Rust is a systems language");
        assert_eq!(body["confidence"], 0.5);
        assert_eq!(body["sources"].as_array().unwrap().len(), 1);
        assert_eq!(body["sources"][0]["metadata"]["source"], "python.txt");
        assert_eq!(body["sources"][0]["metadata"]["chunk_id"], 0);

        let (status, body) = send(&app.router, get_request("/documents", &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["documents"][0]["id"], id.as_str());

        let (status, body) = send(&app.router, get_request("/documents/stats", &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_documents"], 1);
        assert_eq!(body["collection_name"], "documents");

        let request = json_request(Method::DELETE, &format!("/documents/{}", id), &token, json!({}));
        let (status, body) = send(&app.router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["chunks_deleted"], 1);

        let request = json_request(Method::DELETE, &format!("/documents/{}", id), &token, json!({}));
        assert_eq!(send(&app.router, request).await.0, StatusCode::NOT_FOUND);

        let request = json_request(Method::POST, "/query", &token, json!({"query": "What is Rust?"}));
        let (status, body) = send(&app.router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "No relevant documents found.");
        assert_eq!(body["confidence"], 0.0);
    }

    #[tokio::test]
    async fn test_duplicate_upload() {
        let app = app().await;
        let token = login(&app.router).await;

        let (_, first) = send(&app.router, upload_request(&token, "a.txt", b"Same content")).await;
        let (status, second) = send(&app.router, upload_request(&token, "b.txt", b"Same content")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["status"], "duplicate");
        assert_eq!(second["id"], first["id"]);
        assert_eq!(app.state.document_count(), 1);
        assert_eq!(app.state.rag().stats().await.unwrap().total_documents, 1);
    }

    #[tokio::test]
    async fn test_upload_validation() {
        let app = app().await;
        let token = login(&app.router).await;

        let (status, body) = send(&app.router, upload_request(&token, "malware.exe", b"MZ")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "unsupported_type");

        let (status, body) = send(&app.router, upload_request(&token, "empty.txt", b"")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Invalid file type or size.");

        let (status, body) = send(&app.router, upload_request(&token, "bad.txt", &[0xff, 0xfe, 0x00])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "parse_error");
    }

    #[tokio::test]
    async fn test_oversized_upload_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(&dir);
        config.documents.max_document_size_mb = 1;
        let app = app_with(config, dir).await;
        let token = login(&app.router).await;

        let content = vec![b'a'; 3 * 1024 * 1024];
        let (status, _) = send(&app.router, upload_request(&token, "big.txt", &content)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let app = app().await;
        let token = login(&app.router).await;
        let request = json_request(Method::POST, "/query", &token, json!({"question": "   "}));
        let (status, body) = send(&app.router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "validation_error");
    }

    #[tokio::test]
    async fn test_rate_limit() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(&dir);
        config.security.rate_limit_per_minute = 2;
        let app = app_with(config, dir).await;
        let token = login(&app.router).await;

        for _ in 0..2 {
            let request = json_request(Method::POST, "/query", &token, json!({"question": "hello"}));
            assert_eq!(send(&app.router, request).await.0, StatusCode::OK);
        }

        let request = json_request(Method::POST, "/query", &token, json!({"question": "hello"}));
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(header::RETRY_AFTER));

        // listing is not rate limited
        assert_eq!(send(&app.router, get_request("/documents", &token)).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_corrupt_registry_fails_startup() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        std::fs::create_dir_all(&config.vector_db.persist_directory).unwrap();
        std::fs::write(config.vector_db.registry_path(), b"[{\"id\": ").unwrap();

        let rag = RagService::from_config(&config).unwrap();
        let result = AppState::with_services(config.clone(), rag, CloudService::disabled());
        assert!(matches!(result, Err(Error::Internal(_))));
        assert!(!config.vector_db.persist_directory.join("documents.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_registry_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let persist = config.vector_db.persist_directory.clone();
        let app = app_with(config.clone(), dir).await;
        let token = login(&app.router).await;
        let (status, _) = send(&app.router, upload_request(&token, "notes.txt", b"Persistent notes")).await;
        assert_eq!(status, StatusCode::OK);

        let rag = RagService::from_config(&config).unwrap();
        let reopened = AppState::with_services(config, rag, CloudService::disabled()).unwrap();
        assert_eq!(reopened.document_count(), 1);
        assert_eq!(reopened.rag().stats().await.unwrap().total_documents, 1);
        assert!(persist.join("documents.json").exists());
    }

    #[tokio::test]
    async fn test_invoke_without_emulator() {
        let app = app().await;
        let token = login(&app.router).await;
        let request = json_request(
            Method::POST,
            "/cloud/functions/process-document/invoke",
            &token,
            json!({"key": "documents/a.txt"}),
        );
        let (status, body) = send(&app.router, request).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["type"], "cloud_error");
    }

    #[tokio::test]
    async fn test_info() {
        let app = app().await;
        let request = Request::builder().uri("/info").body(Body::empty()).unwrap();
        let (status, body) = send(&app.router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "enterprise-rag");
    }
}
