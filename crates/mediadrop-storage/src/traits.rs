//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::io::Cursor;
use std::path::PathBuf;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Unable to create directory {path}: {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage abstraction trait
///
/// All storage backends (object store, local filesystem) implement this trait.
/// The upload pipeline picks one implementation at construction time and never
/// branches on the backend afterwards.
///
/// **Key format:** `{directory}/{variant}/{file_name}`, see [`crate::keys`].
#[async_trait]
pub trait Storage: Send + Sync {
    /// Copy `reader` to `key` until EOF and return the number of bytes written.
    ///
    /// The reader is borrowed so the caller can seek and re-read it afterwards.
    async fn write(
        &self,
        key: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StorageResult<u64>;

    /// Write an in-memory buffer to `key`.
    async fn write_bytes(&self, key: &str, data: Bytes) -> StorageResult<u64> {
        let mut cursor = Cursor::new(data);
        self.write(key, &mut cursor).await
    }

    /// Public URL of the object stored at `key`.
    fn locate_url(&self, key: &str) -> String;

    /// Absolute directory backing the relative `directory`, for backends that
    /// live on the local filesystem. Derivatives for such backends are written
    /// in place by the transform engine instead of being uploaded.
    fn local_directory(&self, _directory: &str) -> Option<PathBuf> {
        None
    }

    /// Check if an object exists
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
