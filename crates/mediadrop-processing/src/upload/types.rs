use super::error::UploadError;
use bytes::Bytes;
use mediadrop_core::UploadedFileRecord;
use std::io::Cursor;
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncSeek};

/// Readable, seekable stream over one incoming file.
pub trait UploadStream: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin + ?Sized> UploadStream for T {}

#[derive(Debug, Clone)]
enum FileSource {
    Path(PathBuf),
    Memory(Bytes),
}

/// One file of an upload batch: a client-supplied name plus its content.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    original_name: String,
    source: FileSource,
}

impl IncomingFile {
    /// File on disk, named after its last path component.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let original_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            original_name,
            source: FileSource::Path(path),
        }
    }

    /// File on disk presented under a different client name.
    pub fn from_path_with_name(path: impl Into<PathBuf>, original_name: impl Into<String>) -> Self {
        Self {
            original_name: original_name.into(),
            source: FileSource::Path(path.into()),
        }
    }

    /// In-memory content, e.g. a buffered multipart part.
    pub fn from_bytes(original_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            original_name: original_name.into(),
            source: FileSource::Memory(data.into()),
        }
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// Open a fresh stream positioned at the start of the content.
    pub async fn open(&self) -> std::io::Result<Box<dyn UploadStream>> {
        match &self.source {
            FileSource::Path(path) => Ok(Box::new(tokio::fs::File::open(path).await?)),
            FileSource::Memory(data) => Ok(Box::new(Cursor::new(data.clone()))),
        }
    }
}

/// Aggregate result of one batch.
#[derive(Debug, Default)]
pub struct UploadOutcome {
    pub uploaded: Vec<UploadedFileRecord>,
    pub failed: Vec<UploadError>,
}

impl UploadOutcome {
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.uploaded.len() + self.failed.len()
    }

    pub fn error_for(&self, file_name: &str) -> Option<&UploadError> {
        self.failed.iter().find(|error| error.file_name == file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncSeekExt};

    #[tokio::test]
    async fn test_memory_stream_is_seekable() {
        let file = IncomingFile::from_bytes("a.txt", &b"hello"[..]);
        let mut stream = file.open().await.unwrap();

        let mut first = String::new();
        stream.read_to_string(&mut first).await.unwrap();
        stream.seek(std::io::SeekFrom::Start(0)).await.unwrap();
        let mut second = String::new();
        stream.read_to_string(&mut second).await.unwrap();

        assert_eq!(first, "hello");
        assert_eq!(second, "hello");
    }

    #[tokio::test]
    async fn test_path_source_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        tokio::fs::write(&path, b"%PDF").await.unwrap();

        let file = IncomingFile::from_path(&path);
        assert_eq!(file.original_name(), "report.pdf");

        let mut data = Vec::new();
        file.open().await.unwrap().read_to_end(&mut data).await.unwrap();
        assert_eq!(data, b"%PDF");

        let missing = IncomingFile::from_path(dir.path().join("missing.pdf"));
        assert!(missing.open().await.is_err());
    }
}
