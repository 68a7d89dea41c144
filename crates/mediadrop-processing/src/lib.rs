//! Mediadrop Upload Processing Library
//!
//! This crate turns a batch of incoming files into stored originals plus
//! resized image derivatives:
//! - Content sniffing and file-type classification (classifier)
//! - Image probing, resizing and encoding (image)
//! - Batch orchestration and derivative fan-out (upload)

pub mod classifier;
pub mod image;
pub mod traits;
pub mod upload;

// Re-export commonly used types
pub use classifier::{classify, extension_of, sniff_content_type, DetectedType, SNIFF_LEN};
pub use image::{ImageProcessor, ImageResize, ImageTransformer};
pub use traits::{Derivative, ImageTransformService, TransformError, TransformOutput};
pub use upload::{
    DerivativeError, DerivativeFanout, DerivativeReport, IncomingFile, IoOp, UploadError,
    UploadErrorSummary, UploadFailure, UploadOutcome, UploadStream, Uploader,
};
