//! Storage access over file URIs
//!
//! Locations are URIs (`file:///data/in.csv`, `s3://bucket/key`,
//! `memory://fixtures/in.csv`) or bare local paths. Every location is
//! resolved to an `object_store` backend plus an object path, so local and
//! remote files go through the same read/write calls.

use bytes::Bytes;
use futures::stream::BoxStream;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{ObjectStore, PutPayload, path::Path as StoragePath};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

use crate::config::StorageConfig;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid location '{location}': {reason}")]
    InvalidLocation { location: String, reason: String },

    #[error("Storage access failed for '{location}': {source}")]
    Access {
        location: String,
        #[source]
        source: object_store::Error,
    },
}

impl StorageError {
    fn from_store(location: &str, source: object_store::Error) -> Self {
        match source {
            object_store::Error::NotFound { .. } => StorageError::NotFound(location.to_string()),
            source => StorageError::Access {
                location: location.to_string(),
                source,
            },
        }
    }

    fn invalid(location: &str, reason: impl Into<String>) -> Self {
        StorageError::InvalidLocation {
            location: location.to_string(),
            reason: reason.into(),
        }
    }
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Byte stream of a single object, consumed once
pub type ByteStream = BoxStream<'static, object_store::Result<Bytes>>;

/// Storage client resolving URIs to `object_store` backends
#[derive(Clone)]
pub struct StorageClient {
    local: Arc<LocalFileSystem>,
    memory: Arc<InMemory>,
    options: Vec<(String, String)>,
}

impl StorageClient {
    /// Create a client for local and remote locations
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            local: Arc::new(LocalFileSystem::new()),
            memory: Arc::new(InMemory::new()),
            options: config.store_options(),
        }
    }

    /// Client with default settings; `memory://` locations live only as
    /// long as this client (and its clones)
    pub fn in_memory() -> Self {
        Self::new(&StorageConfig::default())
    }

    /// Read the whole object into memory
    pub async fn read(&self, location: &str) -> Result<Bytes> {
        let (store, path) = self.resolve(location)?;

        let result = store
            .get(&path)
            .await
            .map_err(|e| StorageError::from_store(location, e))?;
        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::from_store(location, e))?;

        tracing::debug!(location, size = bytes.len(), "Read from storage");

        Ok(bytes)
    }

    /// Open the object as a stream of byte blocks
    pub async fn read_stream(&self, location: &str) -> Result<ByteStream> {
        let (store, path) = self.resolve(location)?;

        let result = store
            .get(&path)
            .await
            .map_err(|e| StorageError::from_store(location, e))?;

        Ok(result.into_stream())
    }

    /// Write bytes to the location, replacing any existing object
    pub async fn write(&self, location: &str, data: Vec<u8>) -> Result<()> {
        let (store, path) = self.resolve(location)?;
        let size = data.len();

        store
            .put(&path, PutPayload::from(data))
            .await
            .map_err(|e| StorageError::from_store(location, e))?;

        tracing::info!(location, size, "Wrote to storage");

        Ok(())
    }

    /// Check if the location exists
    pub async fn exists(&self, location: &str) -> Result<bool> {
        let (store, path) = self.resolve(location)?;

        match store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::from_store(location, e)),
        }
    }

    fn resolve(&self, location: &str) -> Result<(Arc<dyn ObjectStore>, StoragePath)> {
        if let Some(rest) = location.strip_prefix("memory://") {
            let path = StoragePath::parse(rest)
                .map_err(|e| StorageError::invalid(location, e.to_string()))?;
            return Ok((self.memory.clone(), path));
        }

        if let Some(rest) = location.strip_prefix("file://") {
            return self.resolve_local(location, rest);
        }

        match Url::parse(location) {
            // Single-letter schemes are Windows drive letters
            Ok(url) if url.scheme().len() > 1 => {
                let (store, path) = object_store::parse_url_opts(&url, self.options.clone())
                    .map_err(|e| StorageError::invalid(location, e.to_string()))?;
                Ok((Arc::from(store), path))
            }
            _ => self.resolve_local(location, location),
        }
    }

    fn resolve_local(
        &self,
        location: &str,
        raw_path: &str,
    ) -> Result<(Arc<dyn ObjectStore>, StoragePath)> {
        let mut path = PathBuf::from(raw_path);
        if path.is_relative() {
            let cwd = std::env::current_dir()
                .map_err(|e| StorageError::invalid(location, e.to_string()))?;
            path = cwd.join(path);
        }

        let path = StoragePath::from_absolute_path(&path)
            .map_err(|e| StorageError::invalid(location, e.to_string()))?;

        Ok((self.local.clone(), path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_roundtrip() {
        let storage = StorageClient::in_memory();

        storage
            .write("memory://inbox/file.txt", b"hello".to_vec())
            .await
            .unwrap();

        assert!(storage.exists("memory://inbox/file.txt").await.unwrap());
        let bytes = storage.read("memory://inbox/file.txt").await.unwrap();
        assert_eq!(&bytes[..], b"hello");
    }

    #[tokio::test]
    async fn test_memory_shared_between_clones() {
        let storage = StorageClient::in_memory();
        let clone = storage.clone();

        storage
            .write("memory://shared.txt", b"abc".to_vec())
            .await
            .unwrap();

        assert_eq!(&clone.read("memory://shared.txt").await.unwrap()[..], b"abc");
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let storage = StorageClient::in_memory();

        let result = storage.read("memory://missing.txt").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
        assert!(!storage.exists("memory://missing.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_local_file_uri_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let location = format!("file://{}/nested/dir/out.csv", temp_dir.path().display());

        let storage = StorageClient::in_memory();
        storage.write(&location, b"a,b\n".to_vec()).await.unwrap();

        let on_disk = std::fs::read(temp_dir.path().join("nested/dir/out.csv")).unwrap();
        assert_eq!(on_disk, b"a,b\n");
    }

    #[tokio::test]
    async fn test_bare_local_path() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("input.txt");
        std::fs::write(&file, "content").unwrap();

        let storage = StorageClient::in_memory();
        let bytes = storage.read(file.to_str().unwrap()).await.unwrap();
        assert_eq!(&bytes[..], b"content");
    }

    #[tokio::test]
    async fn test_read_stream_yields_all_bytes() {
        let storage = StorageClient::in_memory();
        storage
            .write("memory://stream.txt", b"line1\nline2\n".to_vec())
            .await
            .unwrap();

        let mut stream = storage.read_stream("memory://stream.txt").await.unwrap();
        let mut collected = Vec::new();
        while let Some(block) = stream.next().await {
            collected.extend_from_slice(&block.unwrap());
        }
        assert_eq!(collected, b"line1\nline2\n");
    }
}
