//! Bucket stored as a directory on the local filesystem

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

use super::{ObjectInfo, ObjectStore};

/// Local filesystem object store; `<root>/<bucket>/<key>`
pub struct LocalObjectStore {
    bucket: String,
    bucket_dir: PathBuf,
}

impl LocalObjectStore {
    /// Create a store rooted at `root` for `bucket`
    pub fn new(root: &Path, bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            bucket_dir: root.join(bucket),
        }
    }

    /// Resolve a key to a path inside the bucket directory
    fn object_path(&self, key: &str) -> Result<PathBuf> {
        let path = Path::new(key);
        let valid = !key.is_empty()
            && !key.contains('\\')
            && path.components().all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(Error::validation(format!("Invalid object key: {}", key)));
        }
        Ok(self.bucket_dir.join(path))
    }
}

/// Collect `(key, size, modified)` for every file below `dir`
fn walk(dir: &Path, prefix: &str, out: &mut Vec<ObjectInfo>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        let key = if prefix.is_empty() {
            name
        } else {
            format!("{}/{}", prefix, name)
        };

        let metadata = entry.metadata()?;
        if metadata.is_dir() {
            walk(&entry.path(), &key, out)?;
        } else {
            let last_modified = metadata
                .modified()
                .ok()
                .map(|t| DateTime::<Utc>::from(t).to_rfc3339());
            out.push(ObjectInfo {
                key,
                size: metadata.len(),
                last_modified,
            });
        }
    }
    Ok(())
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn create_bucket(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.bucket_dir).await?;
        Ok(())
    }

    async fn put_object(&self, key: &str, data: Bytes, _content_type: &str) -> Result<()> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &data).await?;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Bytes> {
        let path = self.object_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::DocumentNotFound(format!("object {}", key)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let dir = self.bucket_dir.clone();
        let prefix = prefix.to_string();

        tokio::task::spawn_blocking(move || {
            let mut objects = Vec::new();
            if dir.exists() {
                walk(&dir, "", &mut objects)?;
            }
            objects.retain(|o| o.key.starts_with(&prefix));
            objects.sort_by(|a, b| a.key.cmp(&b.key));
            Ok::<_, Error>(objects)
        })
        .await
        .map_err(|e| Error::internal(format!("Task join error: {}", e)))?
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn name(&self) -> &str {
        "local"
    }
}
