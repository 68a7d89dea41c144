use crate::keys::{normalize_directory, validate_key};
use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncRead;

/// Local filesystem storage implementation
#[derive(Clone, Debug)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for file storage (e.g., "/var/lib/mediadrop/uploads")
    /// * `base_url` - Base URL for serving files (e.g., "http://localhost:3000/uploads")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Convert storage key to filesystem path
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(key
            .split('/')
            .fold(self.base_path.clone(), |path, segment| path.join(segment)))
    }

    /// Generate public URL for file
    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    /// Ensure parent directory exists. Succeeds if it is already there.
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::CreateDirectory {
                    path: parent.display().to_string(),
                    source: e,
                })?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn write(
        &self,
        key: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StorageResult<u64> {
        let path = self.key_to_path(key)?;
        let start = std::time::Instant::now();

        self.ensure_parent_dir(&path).await?;

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Unable to create {} for writing, check write access: {}",
                path.display(),
                e
            ))
        })?;

        let copied = async {
            let bytes_copied = tokio::io::copy(reader, &mut file).await.map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to write stream to file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            file.sync_all().await.map_err(|e| {
                StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
            })?;
            Ok::<_, StorageError>(bytes_copied)
        }
        .await;

        let bytes_copied = match copied {
            Ok(bytes_copied) => bytes_copied,
            Err(e) => {
                drop(file);
                // No partial object may stay behind at the key.
                if let Err(remove) = fs::remove_file(&path).await {
                    if remove.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(path = %path.display(), error = %remove, "Failed to remove partial file");
                    }
                }
                return Err(e);
            }
        };

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = bytes_copied,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage write successful"
        );

        Ok(bytes_copied)
    }

    fn locate_url(&self, key: &str) -> String {
        self.generate_url(key)
    }

    fn local_directory(&self, directory: &str) -> Option<PathBuf> {
        let directory = normalize_directory(directory);
        if directory.is_empty() {
            return Some(self.base_path.clone());
        }
        self.key_to_path(&directory).ok()
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tempfile::tempdir;

    async fn storage(dir: &Path) -> LocalStorage {
        LocalStorage::new(dir, "http://localhost:3000/uploads/".to_string())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_local_storage_write() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let mut reader = std::io::Cursor::new(b"test data".to_vec());
        let written = storage.write("docs/test.txt", &mut reader).await.unwrap();

        assert_eq!(written, 9);
        let on_disk = fs::read(dir.path().join("docs").join("test.txt")).await.unwrap();
        assert_eq!(on_disk, b"test data");
        assert!(storage.exists("docs/test.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_write_creates_missing_directory_idempotently() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;
        let subdir = dir.path().join("avatars").join("2024");
        assert!(!subdir.exists());

        storage
            .write_bytes("avatars/2024/first.png", Bytes::from_static(b"one"))
            .await
            .unwrap();
        assert!(subdir.is_dir());

        storage
            .write_bytes("avatars/2024/second.png", Bytes::from_static(b"two"))
            .await
            .unwrap();
        assert!(storage.exists("avatars/2024/first.png").await.unwrap());
        assert!(storage.exists("avatars/2024/second.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_directory_creation_failure_is_reported() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        // A regular file where a directory is needed.
        fs::write(dir.path().join("blocked"), b"file").await.unwrap();

        let result = storage
            .write_bytes("blocked/inner/a.png", Bytes::from_static(b"x"))
            .await;
        assert!(matches!(result, Err(StorageError::CreateDirectory { .. })));
    }

    /// Yields a few bytes, then fails like a dropped connection.
    struct BrokenReader {
        sent: bool,
    }

    impl AsyncRead for BrokenReader {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            if self.sent {
                return std::task::Poll::Ready(Err(std::io::Error::other("connection reset")));
            }
            self.sent = true;
            buf.put_slice(b"partial");
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_failed_stream_leaves_no_partial_file() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let mut reader = BrokenReader { sent: false };
        let result = storage.write("docs/broken.bin", &mut reader).await;

        assert!(matches!(result, Err(StorageError::UploadFailed(_))));
        assert!(!storage.exists("docs/broken.bin").await.unwrap());
        assert!(!dir.path().join("docs").join("broken.bin").exists());
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let result = storage
            .write_bytes("../../../etc/passwd", Bytes::from_static(b"x"))
            .await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.exists("/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        assert!(storage.local_directory("../outside").is_none());
    }

    #[tokio::test]
    async fn test_locate_url_and_local_directory() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        assert_eq!(
            storage.locate_url("avatars/thumb/a.png"),
            "http://localhost:3000/uploads/avatars/thumb/a.png"
        );
        assert_eq!(
            storage.local_directory("\\avatars\\"),
            Some(dir.path().join("avatars"))
        );
        assert_eq!(storage.local_directory(""), Some(dir.path().to_path_buf()));
        assert_eq!(storage.backend_type(), StorageBackend::Local);
    }
}
