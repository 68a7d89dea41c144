//! Core traits for derivative generation
//!
//! The upload pipeline never touches pixels itself; it hands the original to
//! an [`ImageTransformService`] and persists whatever comes back.

use async_trait::async_trait;
use bytes::Bytes;
use mediadrop_core::DerivativeSpec;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A transform call that produced nothing at all.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Transform task failed: {0}")]
    Internal(String),
}

/// One generated derivative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Derivative {
    /// Encoded bytes, still to be uploaded by the caller.
    InMemory(Bytes),
    /// Already written to this path by the transform engine.
    Written(PathBuf),
}

/// Per-variant results of one transform call.
#[derive(Debug, Default)]
pub struct TransformOutput {
    pub derivatives: BTreeMap<String, Derivative>,
    pub errors: BTreeMap<String, String>,
}

impl TransformOutput {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Image transform engine.
#[async_trait]
pub trait ImageTransformService: Send + Sync {
    /// Produce one derivative per spec from the encoded `data`.
    ///
    /// With `local_dest` set, each derivative is written to
    /// `{local_dest}/{variant}/{base_name}` and reported as
    /// [`Derivative::Written`]; otherwise the encoded bytes are returned.
    /// Variants that fail individually land in [`TransformOutput::errors`].
    async fn transform(
        &self,
        data: Bytes,
        base_name: &str,
        content_type: &str,
        specs: &[DerivativeSpec],
        local_dest: Option<&Path>,
    ) -> Result<TransformOutput, TransformError>;
}
