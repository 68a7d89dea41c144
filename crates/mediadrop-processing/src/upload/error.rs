//! Upload failure taxonomy.
//!
//! Every rejected file produces exactly one [`UploadError`] carrying the most
//! specific [`UploadFailure`] known for it. Derivative failures are attached
//! per variant so callers can tell which sizes are missing.

use mediadrop_storage::StorageError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Stream operation that failed while reading an incoming file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOp {
    Open,
    Read,
    Seek,
}

impl fmt::Display for IoOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoOp::Open => write!(f, "open"),
            IoOp::Read => write!(f, "read"),
            IoOp::Seek => write!(f, "seek"),
        }
    }
}

/// Why a file (or the whole batch) was not uploaded.
#[derive(Debug, Error)]
pub enum UploadFailure {
    #[error("No files were supplied")]
    InvalidForm,

    #[error("Content type {content_type} is not allowed for extension {extension:?}")]
    InvalidFileType {
        extension: String,
        content_type: String,
    },

    #[error("No allowed file type accepts extension {extension:?}")]
    UnsupportedFileType { extension: String },

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("{failed} of {requested} image derivatives could not be stored")]
    UploadFailed { failed: usize, requested: usize },

    #[error("Failed to {op} upload stream: {source}")]
    Io {
        op: IoOp,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Image transform failed: {0}")]
    Transform(String),

    #[error("Upload task aborted: {0}")]
    TaskAborted(String),
}

impl UploadFailure {
    /// Stable machine-readable code for the failure kind.
    pub fn code(&self) -> &'static str {
        match self {
            UploadFailure::InvalidForm => "invalid_form",
            UploadFailure::InvalidFileType { .. } => "invalid_file_type",
            UploadFailure::UnsupportedFileType { .. } => "unsupported_file_type",
            UploadFailure::InvalidImage(_) => "invalid_image",
            UploadFailure::UploadFailed { .. } => "upload_failed",
            UploadFailure::Io { .. } => "io_error",
            UploadFailure::Storage(_) => "storage_error",
            UploadFailure::Transform(_) => "transform_error",
            UploadFailure::TaskAborted(_) => "task_aborted",
        }
    }

    /// Adapter for `map_err` on stream operations.
    pub fn io(op: IoOp) -> impl FnOnce(std::io::Error) -> Self {
        move |source| UploadFailure::Io { op, source }
    }
}

/// Why a single derivative variant is missing.
#[derive(Debug, Error)]
pub enum DerivativeError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Image transform failed: {0}")]
    Transform(String),

    #[error("Variant name {0:?} addresses the original")]
    ReservedVariant(String),

    #[error("Derivative upload task aborted: {0}")]
    TaskAborted(String),
}

/// Failure of one file in a batch.
#[derive(Debug)]
pub struct UploadError {
    /// Client-supplied file name.
    pub file_name: String,
    pub cause: UploadFailure,
    /// Failed variants, only populated for [`UploadFailure::UploadFailed`].
    pub derivative_errors: BTreeMap<String, DerivativeError>,
}

impl UploadError {
    pub fn new(file_name: impl Into<String>, cause: UploadFailure) -> Self {
        Self {
            file_name: file_name.into(),
            cause,
            derivative_errors: BTreeMap::new(),
        }
    }

    pub fn with_derivative_errors(mut self, errors: BTreeMap<String, DerivativeError>) -> Self {
        self.derivative_errors = errors;
        self
    }

    pub fn code(&self) -> &'static str {
        self.cause.code()
    }

    /// Emit the failure and each derivative cause as error events.
    pub fn log(&self) {
        tracing::error!(
            file_name = %self.file_name,
            code = self.code(),
            error = %self.cause,
            "Upload failed"
        );
        for (variant, error) in &self.derivative_errors {
            tracing::error!(
                file_name = %self.file_name,
                variant = %variant,
                error = %error,
                "Derivative failed"
            );
        }
    }

    pub fn summary(&self) -> UploadErrorSummary {
        UploadErrorSummary {
            file_name: self.file_name.clone(),
            code: self.code(),
            message: self.cause.to_string(),
            derivative_errors: self
                .derivative_errors
                .iter()
                .map(|(variant, error)| (variant.clone(), error.to_string()))
                .collect(),
        }
    }
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file_name, self.cause)
    }
}

impl std::error::Error for UploadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

/// Serializable view of an [`UploadError`] for reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadErrorSummary {
    pub file_name: String,
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub derivative_errors: BTreeMap<String, String>,
}
