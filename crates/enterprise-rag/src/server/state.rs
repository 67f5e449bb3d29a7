//! Application state for the RAG server

use dashmap::DashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::cloud::CloudService;
use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::ingestion::DocumentService;
use crate::retrieval::{write_atomic, RagService};
use crate::security::{RateLimiter, TokenService, UserStore};
use crate::types::DocumentRecord;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: RagConfig,
    /// Retrieval and answering
    rag: RagService,
    /// Upload validation and extraction
    document_service: DocumentService,
    /// Access token issuing and verification
    tokens: TokenService,
    /// Known users
    users: UserStore,
    /// Per-user request limiter
    rate_limiter: RateLimiter,
    /// Object storage and functions
    cloud: CloudService,
    /// Document registry (persisted to disk)
    documents: DashMap<Uuid, DocumentRecord>,
    /// Path to documents registry file
    documents_path: PathBuf,
    /// Serializes duplicate detection with indexing
    ingest_lock: tokio::sync::Mutex<()>,
}

impl AppState {
    /// Create application state from configuration
    pub async fn new(config: RagConfig) -> Result<Self> {
        tracing::info!("Initializing {} application state...", config.app_name);

        let rag = RagService::from_config(&config)?;
        tracing::info!(
            "RAG service initialized (embeddings: {}, answers: {})",
            rag.embedder_name(),
            rag.llm_name()
        );

        let cloud = CloudService::from_config(&config.cloud)?;
        if cloud.is_enabled() && !cloud.setup_infrastructure().await {
            tracing::warn!("Object storage unavailable, uploads will not be archived");
        }

        Self::with_services(config, rag, cloud)
    }

    /// Create state around already-built services
    pub fn with_services(config: RagConfig, rag: RagService, cloud: CloudService) -> Result<Self> {
        let users = UserStore::from_config(&config)?;
        tracing::info!("{} users configured", users.len());

        fs::create_dir_all(&config.vector_db.persist_directory)?;
        let documents_path = config.vector_db.registry_path();
        let documents = Self::load_documents(&documents_path)?;
        tracing::info!("Loaded {} documents from registry", documents.len());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                document_service: DocumentService::new(&config.documents),
                tokens: TokenService::from_config(&config.security)?,
                rate_limiter: RateLimiter::new(config.security.rate_limit_per_minute),
                users,
                rag,
                cloud,
                documents,
                documents_path,
                ingest_lock: tokio::sync::Mutex::new(()),
                config,
            }),
        })
    }

    /// Load the document registry; a missing file is an empty registry
    fn load_documents(path: &Path) -> Result<DashMap<Uuid, DocumentRecord>> {
        let documents = DashMap::new();
        if !path.exists() {
            return Ok(documents);
        }

        let content = fs::read_to_string(path)?;
        let docs: Vec<DocumentRecord> = serde_json::from_str(&content).map_err(|e| {
            Error::internal(format!("Corrupt document registry {}: {}", path.display(), e))
        })?;
        for doc in docs {
            documents.insert(doc.id, doc);
        }
        Ok(documents)
    }

    /// Save documents to disk
    fn save_documents(&self) {
        let docs = self.list_documents();
        let result = serde_json::to_vec_pretty(&docs)
            .map_err(Error::from)
            .and_then(|content| write_atomic(&self.inner.documents_path, &content));
        if let Err(e) = result {
            tracing::error!(
                "Failed to save document registry {}: {}",
                self.inner.documents_path.display(),
                e
            );
        }
    }

    /// Get configuration
    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    /// Get RAG service
    pub fn rag(&self) -> &RagService {
        &self.inner.rag
    }

    /// Get document service
    pub fn document_service(&self) -> &DocumentService {
        &self.inner.document_service
    }

    /// Get token service
    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    /// Get user store
    pub fn users(&self) -> &UserStore {
        &self.inner.users
    }

    /// Get rate limiter
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.inner.rate_limiter
    }

    /// Get cloud service
    pub fn cloud(&self) -> &CloudService {
        &self.inner.cloud
    }

    /// Lock held while checking for duplicates and indexing an upload
    pub fn ingest_lock(&self) -> &tokio::sync::Mutex<()> {
        &self.inner.ingest_lock
    }

    /// Add a document to the registry (persisted to disk)
    pub fn add_document(&self, doc: DocumentRecord) {
        self.inner.documents.insert(doc.id, doc);
        self.save_documents();
    }

    /// Get a document by ID
    pub fn get_document(&self, id: &Uuid) -> Option<DocumentRecord> {
        self.inner.documents.get(id).map(|d| d.clone())
    }

    /// Find a document whose extracted text has `content_hash`
    pub fn find_by_content_hash(&self, content_hash: &str) -> Option<DocumentRecord> {
        self.inner
            .documents
            .iter()
            .find(|entry| entry.value().content_hash == content_hash)
            .map(|entry| entry.value().clone())
    }

    /// Remove a document (persisted to disk)
    pub fn remove_document(&self, id: &Uuid) -> Option<DocumentRecord> {
        let removed = self.inner.documents.remove(id).map(|(_, d)| d);
        if removed.is_some() {
            self.save_documents();
        }
        removed
    }

    /// List all documents, newest first
    pub fn list_documents(&self) -> Vec<DocumentRecord> {
        let mut docs: Vec<DocumentRecord> = self
            .inner
            .documents
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        docs.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        docs
    }

    /// Number of registered documents
    pub fn document_count(&self) -> usize {
        self.inner.documents.len()
    }
}
