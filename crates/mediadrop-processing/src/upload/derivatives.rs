//! Derivative fan-out: transform once, then persist every variant.

use super::error::{DerivativeError, UploadFailure};
use crate::traits::{Derivative, ImageTransformService, TransformError};
use bytes::Bytes;
use mediadrop_core::DerivativeSpec;
use mediadrop_storage::{normalize_variant, object_key, Storage};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};

/// Outcome of persisting the derivatives of one image.
#[derive(Debug, Default)]
pub struct DerivativeReport {
    /// Storage key of every persisted variant.
    pub persisted: BTreeMap<String, String>,
    pub errors: BTreeMap<String, DerivativeError>,
}

impl DerivativeReport {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Semaphore for a configured limit, where 0 means unbounded.
pub(crate) fn limiter(limit: usize) -> Option<Arc<Semaphore>> {
    (limit > 0).then(|| Arc::new(Semaphore::new(limit)))
}

/// Generates derivatives through an [`ImageTransformService`] and stores them.
pub struct DerivativeFanout {
    transformer: Arc<dyn ImageTransformService>,
    max_concurrent_uploads: usize,
}

impl DerivativeFanout {
    pub fn new(transformer: Arc<dyn ImageTransformService>, max_concurrent_uploads: usize) -> Self {
        Self {
            transformer,
            max_concurrent_uploads,
        }
    }

    /// Produce and persist one derivative per spec for the stored original
    /// `generated_name`.
    ///
    /// Backends with a local directory get their variants written in place by
    /// the transform engine. Remote backends receive one concurrent upload per
    /// variant, all of which are awaited before returning. Per-variant failures
    /// are collected in the report; only a transform that yields nothing at all
    /// is an `Err`.
    pub async fn generate_and_persist(
        &self,
        data: Bytes,
        generated_name: &str,
        content_type: &str,
        specs: &[DerivativeSpec],
        storage: &Arc<dyn Storage>,
        directory: Option<&str>,
    ) -> Result<DerivativeReport, UploadFailure> {
        let mut report = DerivativeReport::default();

        let mut runnable = Vec::with_capacity(specs.len());
        for spec in specs {
            match normalize_variant(Some(&spec.variant)) {
                Some(variant) => runnable.push(DerivativeSpec {
                    variant,
                    ..spec.clone()
                }),
                None => {
                    report.errors.insert(
                        spec.variant.clone(),
                        DerivativeError::ReservedVariant(spec.variant.clone()),
                    );
                }
            }
        }
        if runnable.is_empty() {
            return Ok(report);
        }

        let local_dest = storage.local_directory(directory.unwrap_or_default());

        let output = self
            .transformer
            .transform(
                data,
                generated_name,
                content_type,
                &runnable,
                local_dest.as_deref(),
            )
            .await
            .map_err(|e| match e {
                TransformError::Decode(msg) | TransformError::Internal(msg) => {
                    UploadFailure::Transform(msg)
                }
            })?;

        for (variant, error) in output.errors {
            report
                .errors
                .insert(variant, DerivativeError::Transform(error));
        }

        let semaphore = limiter(self.max_concurrent_uploads);
        let mut uploads = JoinSet::new();
        let mut pending: HashMap<Id, String> = HashMap::new();

        for (variant, derivative) in output.derivatives {
            let key = object_key(directory, Some(&variant), generated_name);
            match derivative {
                Derivative::Written(path) => {
                    tracing::debug!(variant = %variant, path = %path.display(), "Derivative written in place");
                    report.persisted.insert(variant, key);
                }
                Derivative::InMemory(bytes) => {
                    let storage = Arc::clone(storage);
                    let semaphore = semaphore.clone();
                    let label = variant.clone();
                    let handle = uploads.spawn(async move {
                        let _permit = match semaphore {
                            Some(semaphore) => semaphore.acquire_owned().await.ok(),
                            None => None,
                        };
                        let result = storage.write_bytes(&key, bytes).await;
                        (variant, key, result)
                    });
                    pending.insert(handle.id(), label);
                }
            }
        }

        while let Some(joined) = uploads.join_next_with_id().await {
            match joined {
                Ok((id, (variant, key, result))) => {
                    pending.remove(&id);
                    match result {
                        Ok(_) => {
                            report.persisted.insert(variant, key);
                        }
                        Err(e) => {
                            tracing::warn!(variant = %variant, key = %key, error = %e, "Derivative upload failed");
                            report.errors.insert(variant, DerivativeError::Storage(e));
                        }
                    }
                }
                Err(e) => {
                    if let Some(variant) = pending.remove(&e.id()) {
                        tracing::warn!(variant = %variant, error = %e, "Derivative upload task aborted");
                        report
                            .errors
                            .insert(variant, DerivativeError::TaskAborted(e.to_string()));
                    }
                }
            }
        }

        // Variants whose task never reported back.
        for variant in pending.into_values() {
            report.errors.insert(
                variant,
                DerivativeError::TaskAborted("task did not complete".to_string()),
            );
        }

        Ok(report)
    }
}
