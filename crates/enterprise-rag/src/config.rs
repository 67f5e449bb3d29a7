//! Configuration for the RAG service
//!
//! Settings come from built-in defaults, an optional TOML file (`RAG_CONFIG`)
//! and environment variable overrides, in that order.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable naming an optional TOML config file
pub const CONFIG_PATH_ENV: &str = "RAG_CONFIG";

/// Longest accepted access token lifetime (one year)
pub const MAX_TOKEN_LIFETIME_MINUTES: i64 = 525_600;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Main RAG service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Application name reported by health and info endpoints
    pub app_name: String,
    /// Debug mode (seeds the demo account when no users are configured)
    pub debug: bool,
    /// Server configuration
    pub server: ServerConfig,
    /// Authentication, sanitization and rate limiting
    pub security: SecurityConfig,
    /// Upload validation
    pub documents: DocumentConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Answer generation configuration
    pub llm: LlmConfig,
    /// Vector store configuration
    pub vector_db: VectorDbConfig,
    /// Object storage / function invocation configuration
    pub cloud: CloudConfig,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            app_name: "My RAG Bot".to_string(),
            debug: true,
            server: ServerConfig::default(),
            security: SecurityConfig::default(),
            documents: DocumentConfig::default(),
            chunking: ChunkingConfig::default(),
            embeddings: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            vector_db: VectorDbConfig::default(),
            cloud: CloudConfig::default(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
        }
    }
}

/// A configured API user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    /// Login name
    pub username: String,
    /// bcrypt hash of the password
    pub password_hash: String,
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// HMAC secret for signing access tokens (required)
    pub secret_key: String,
    /// Access token lifetime in minutes
    pub access_token_expire_minutes: i64,
    /// Requests per minute per user on upload and query (0 disables)
    pub rate_limit_per_minute: u32,
    /// Maximum characters kept from a sanitized question
    pub max_input_chars: usize,
    /// Users allowed to request tokens
    pub users: Vec<UserConfig>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            access_token_expire_minutes: 30,
            rate_limit_per_minute: 10,
            max_input_chars: 1000,
            users: Vec::new(),
        }
    }
}

/// Upload validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Maximum upload size in megabytes
    pub max_document_size_mb: u64,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            max_document_size_mb: 25,
        }
    }
}

impl DocumentConfig {
    /// Maximum upload size in bytes
    pub fn max_document_size_bytes(&self) -> u64 {
        self.max_document_size_mb.saturating_mul(BYTES_PER_MB)
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

/// Embedding backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Local feature-hashing embedder (no external service)
    #[default]
    Hash,
    /// Ollama embeddings endpoint
    Ollama,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Backend used to embed chunks and questions
    pub provider: EmbeddingBackend,
    /// Model name (informational for the hash backend)
    pub model: String,
    /// Embedding dimensions
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::Hash,
            model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            dimensions: 384,
        }
    }
}

/// Answer generation backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    /// No generator; answers come from the extractive heuristic
    #[default]
    None,
    /// Ollama generate endpoint
    Ollama,
}

/// LLM (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Generator backend
    pub provider: LlmBackend,
    /// Ollama base URL
    pub base_url: String,
    /// Embedding model name (Ollama embedding backend)
    pub embed_model: String,
    /// Generation model name
    pub generate_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmBackend::None,
            base_url: "http://localhost:11434".to_string(),
            embed_model: "all-minilm".to_string(),
            generate_model: "llama3.2:3b".to_string(),
            temperature: 0.2,
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// Directory holding the persisted collection and document registry
    pub persist_directory: PathBuf,
    /// Collection name
    pub collection_name: String,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            persist_directory: PathBuf::from("./data/chroma_db"),
            collection_name: "documents".to_string(),
        }
    }
}

impl VectorDbConfig {
    /// Path of the persisted collection file
    pub fn collection_path(&self) -> PathBuf {
        self.persist_directory
            .join(format!("{}.collection.json", self.collection_name))
    }

    /// Path of the persisted document registry
    pub fn registry_path(&self) -> PathBuf {
        self.persist_directory.join("documents.json")
    }
}

/// Object storage backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CloudBackend {
    /// No object storage; uploads are not archived
    Disabled,
    /// Bucket directory on the local filesystem
    #[default]
    Local,
    /// S3-compatible emulator (LocalStack) over HTTP
    Emulator,
}

/// Cloud simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Backend selection
    pub backend: CloudBackend,
    /// Emulator endpoint
    pub endpoint_url: String,
    /// Access key id sent in the credential scope
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Region sent in the credential scope
    pub region: String,
    /// Bucket holding archived documents
    pub bucket_name: String,
    /// Root directory for the local backend
    pub local_root: PathBuf,
    /// Attempts per emulator request
    pub max_attempts: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            backend: CloudBackend::Local,
            endpoint_url: "http://localhost:4566".to_string(),
            access_key_id: "test".to_string(),
            secret_access_key: "test".to_string(),
            region: "us-east-1".to_string(),
            bucket_name: "enterprise-documents".to_string(),
            local_root: PathBuf::from("./data/objects"),
            max_attempts: 2,
            timeout_secs: 30,
        }
    }
}

impl RagConfig {
    /// Load configuration: defaults, then `RAG_CONFIG` file, then environment
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(path.trim()))?,
            _ => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid config {}: {}", path.display(), e)))
    }

    /// Apply overrides from environment-style variables
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("APP_NAME") {
            self.app_name = v;
        }
        if let Some(v) = get("DEBUG") {
            self.debug = parse_bool("DEBUG", &v)?;
        }
        if let Some(v) = get("SECRET_KEY") {
            self.security.secret_key = v;
        }
        if let Some(v) = get("ACCESS_TOKEN_EXPIRE_MINUTES") {
            self.security.access_token_expire_minutes = parse_num("ACCESS_TOKEN_EXPIRE_MINUTES", &v)?;
        }
        if let Some(v) = get("RATE_LIMIT_PER_MINUTE") {
            self.security.rate_limit_per_minute = parse_num("RATE_LIMIT_PER_MINUTE", &v)?;
        }
        if let Some(v) = get("MAX_DOCUMENT_SIZE_MB") {
            self.documents.max_document_size_mb = parse_num("MAX_DOCUMENT_SIZE_MB", &v)?;
        }
        if let Some(v) = get("CHROMA_PERSIST_DIRECTORY") {
            self.vector_db.persist_directory = PathBuf::from(v);
        }
        if let Some(v) = get("MODEL_NAME") {
            self.embeddings.model = v;
        }
        if let Some(v) = get("LLM_MODEL_NAME") {
            self.llm.generate_model = v;
        }
        if let Some(v) = get("OLLAMA_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = get("AWS_ENDPOINT_URL") {
            self.cloud.endpoint_url = v;
        }
        if let Some(v) = get("AWS_ACCESS_KEY_ID") {
            self.cloud.access_key_id = v;
        }
        if let Some(v) = get("AWS_SECRET_ACCESS_KEY") {
            self.cloud.secret_access_key = v;
        }
        if let Some(v) = get("AWS_REGION_NAME") {
            self.cloud.region = v;
        }
        if let Some(v) = get("HOST") {
            self.server.host = v;
        }
        if let Some(v) = get("PORT") {
            self.server.port = parse_num("PORT", &v)?;
        }

        Ok(())
    }

    /// Check invariants that the rest of the service relies on
    pub fn validate(&self) -> Result<()> {
        if self.security.secret_key.trim().is_empty() {
            return Err(Error::Config(
                "SECRET_KEY must be set (env or security.secret_key)".to_string(),
            ));
        }
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be positive".to_string()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.embeddings.dimensions == 0 {
            return Err(Error::Config("embedding dimensions must be positive".to_string()));
        }
        if self.documents.max_document_size_mb == 0 {
            return Err(Error::Config("max_document_size_mb must be positive".to_string()));
        }
        let fits = self
            .documents
            .max_document_size_mb
            .checked_mul(BYTES_PER_MB)
            .and_then(|bytes| usize::try_from(bytes).ok())
            .is_some();
        if !fits {
            return Err(Error::Config(format!(
                "max_document_size_mb ({}) is too large",
                self.documents.max_document_size_mb
            )));
        }
        let minutes = self.security.access_token_expire_minutes;
        if !(1..=MAX_TOKEN_LIFETIME_MINUTES).contains(&minutes) {
            return Err(Error::Config(format!(
                "access_token_expire_minutes must be between 1 and {}, got {}",
                MAX_TOKEN_LIFETIME_MINUTES, minutes
            )));
        }
        Ok(())
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} must be a number, got '{}'", key, value)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("{} must be a boolean, got '{}'", key, value))),
    }
}
