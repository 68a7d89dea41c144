//! Batch upload orchestration.

pub mod derivatives;
pub mod error;
pub mod pipeline;
pub mod types;

pub use derivatives::{DerivativeFanout, DerivativeReport};
pub use error::{DerivativeError, IoOp, UploadError, UploadErrorSummary, UploadFailure};
pub use pipeline::Uploader;
pub use types::{IncomingFile, UploadOutcome, UploadStream};
