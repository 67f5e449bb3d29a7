//! Object storage and function invocation against a local or emulated cloud
//!
//! Uploaded originals are archived under `documents/` in the configured
//! bucket. The `local` backend keeps the bucket on disk; the `emulator`
//! backend talks to an S3/Lambda-compatible emulator such as LocalStack.

pub mod emulator;
pub mod local;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{CloudBackend, CloudConfig};
use crate::error::{Error, Result};

pub use emulator::{EmulatorClient, EmulatorFunctionInvoker, EmulatorObjectStore};
pub use local::LocalObjectStore;

/// Key prefix for archived uploads
pub const DOCUMENTS_PREFIX: &str = "documents/";

/// A stored object as reported by a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Object key
    pub key: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification time (RFC 3339), when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

/// Bucket-scoped object storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create the bucket; an existing bucket owned by the caller is success
    async fn create_bucket(&self) -> Result<()>;

    /// Store `data` under `key`
    async fn put_object(&self, key: &str, data: Bytes, content_type: &str) -> Result<()>;

    /// Fetch the object stored under `key`
    async fn get_object(&self, key: &str) -> Result<Bytes>;

    /// List objects whose key starts with `prefix`, sorted by key
    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>>;

    /// Bucket name
    fn bucket(&self) -> &str;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Serverless function invocation
#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    /// Invoke `function_name` with a JSON payload and return its JSON result
    async fn invoke(&self, function_name: &str, payload: &serde_json::Value) -> Result<serde_json::Value>;
}

/// Archive and function facade used by the HTTP layer
pub struct CloudService {
    store: Option<Arc<dyn ObjectStore>>,
    invoker: Option<Arc<dyn FunctionInvoker>>,
}

impl CloudService {
    /// Assemble from explicit backends
    pub fn new(store: Option<Arc<dyn ObjectStore>>, invoker: Option<Arc<dyn FunctionInvoker>>) -> Self {
        Self { store, invoker }
    }

    /// Service with no object storage or functions
    pub fn disabled() -> Self {
        Self::new(None, None)
    }

    /// Build the configured backend
    pub fn from_config(config: &CloudConfig) -> Result<Self> {
        match config.backend {
            CloudBackend::Disabled => Ok(Self::disabled()),
            CloudBackend::Local => {
                let store = LocalObjectStore::new(&config.local_root, &config.bucket_name);
                Ok(Self::new(Some(Arc::new(store)), None))
            }
            CloudBackend::Emulator => {
                let client = Arc::new(EmulatorClient::new(config)?);
                let store = EmulatorObjectStore::new(client.clone(), &config.bucket_name);
                let invoker = EmulatorFunctionInvoker::new(client);
                Ok(Self::new(Some(Arc::new(store)), Some(Arc::new(invoker))))
            }
        }
    }

    /// Whether uploads are archived
    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// `"<backend>:<bucket>"`, or `None` when disabled
    pub fn describe(&self) -> Option<String> {
        self.store
            .as_ref()
            .map(|s| format!("{}:{}", s.name(), s.bucket()))
    }

    /// Create the bucket, returning whether the infrastructure is usable
    pub async fn setup_infrastructure(&self) -> bool {
        let Some(store) = &self.store else {
            return false;
        };

        match store.create_bucket().await {
            Ok(()) => {
                tracing::info!("Object storage ready: {} bucket '{}'", store.name(), store.bucket());
                true
            }
            Err(e) => {
                tracing::warn!("Failed to set up bucket '{}': {}", store.bucket(), e);
                false
            }
        }
    }

    /// Store an uploaded original under `documents/`
    ///
    /// Returns the object key, or `None` when archiving is disabled.
    pub async fn archive_document(&self, stored_filename: &str, data: Bytes) -> Result<Option<String>> {
        let Some(store) = &self.store else {
            return Ok(None);
        };

        let key = format!("{}{}", DOCUMENTS_PREFIX, stored_filename);
        let content_type = mime_guess::from_path(stored_filename)
            .first_or_octet_stream()
            .to_string();
        store.put_object(&key, data, &content_type).await?;
        tracing::debug!("Archived {} in bucket '{}'", key, store.bucket());
        Ok(Some(key))
    }

    /// List stored objects under `prefix`
    pub async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        self.store()?.list_objects(prefix).await
    }

    /// Fetch a stored object
    pub async fn get_object(&self, key: &str) -> Result<Bytes> {
        self.store()?.get_object(key).await
    }

    /// Bucket name, when storage is enabled
    pub fn bucket(&self) -> Option<&str> {
        self.store.as_ref().map(|s| s.bucket())
    }

    /// Invoke a serverless function
    pub async fn invoke_function(
        &self,
        function_name: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        if function_name.trim().is_empty() {
            return Err(Error::validation("Function name must not be empty"));
        }
        let invoker = self
            .invoker
            .as_ref()
            .ok_or_else(|| Error::cloud("Function invocation requires the emulator backend"))?;
        invoker.invoke(function_name, payload).await
    }

    fn store(&self) -> Result<&Arc<dyn ObjectStore>> {
        self.store
            .as_ref()
            .ok_or_else(|| Error::cloud("Object storage is disabled"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn local_config(root: &std::path::Path) -> CloudConfig {
        CloudConfig {
            backend: CloudBackend::Local,
            local_root: root.to_path_buf(),
            ..CloudConfig::default()
        }
    }

    #[tokio::test]
    async fn test_local_archive_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let cloud = CloudService::from_config(&local_config(dir.path())).unwrap();

        assert!(cloud.setup_infrastructure().await);
        assert_eq!(cloud.describe().as_deref(), Some("local:enterprise-documents"));

        let key = cloud
            .archive_document("abc123.txt", Bytes::from_static(b"hello"))
            .await
            .unwrap();
        assert_eq!(key.as_deref(), Some("documents/abc123.txt"));

        let objects = cloud.list_objects(DOCUMENTS_PREFIX).await.unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].key, "documents/abc123.txt");
        assert_eq!(objects[0].size, 5);

        let data = cloud.get_object("documents/abc123.txt").await.unwrap();
        assert_eq!(&data[..], b"hello");
    }

    #[tokio::test]
    async fn test_local_backend_cannot_invoke() {
        let dir = tempfile::tempdir().unwrap();
        let cloud = CloudService::from_config(&local_config(dir.path())).unwrap();
        let err = cloud.invoke_function("process", &json!({})).await.unwrap_err();
        assert!(matches!(err, Error::Cloud(_)));
    }

    #[tokio::test]
    async fn test_disabled_service() {
        let cloud = CloudService::disabled();
        assert!(!cloud.is_enabled());
        assert!(!cloud.setup_infrastructure().await);
        assert_eq!(
            cloud.archive_document("a.txt", Bytes::new()).await.unwrap(),
            None
        );
        assert!(matches!(cloud.list_objects("").await, Err(Error::Cloud(_))));
        assert!(cloud.bucket().is_none());
    }

    #[tokio::test]
    async fn test_emulator_setup_failure_is_false() {
        let config = CloudConfig {
            backend: CloudBackend::Emulator,
            endpoint_url: "http://127.0.0.1:9".to_string(),
            max_attempts: 1,
            timeout_secs: 1,
            ..CloudConfig::default()
        };
        let cloud = CloudService::from_config(&config).unwrap();
        assert!(!cloud.setup_infrastructure().await);
        assert!(cloud.invoke_function("fn", &json!({"a": 1})).await.is_err());
    }
}
