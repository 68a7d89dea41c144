//! Upload pipeline: classify → store original → generate derivatives.

use std::collections::HashMap;
use std::io::SeekFrom;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;
use tokio::task::{Id, JoinSet};

use mediadrop_core::{
    generate_name, AllowedTypes, Config, DerivativeSpec, ImageSizeSelection, UploadedFileRecord,
};
use mediadrop_storage::{create_storage, normalize_directory, object_key, Storage, StorageResult};

use super::derivatives::{limiter, DerivativeFanout};
use super::error::{IoOp, UploadError, UploadFailure};
use super::types::{IncomingFile, UploadOutcome};
use crate::classifier::{extension_of, DetectedType, SNIFF_LEN};
use crate::image::{ImageProcessor, ImageTransformer};
use crate::traits::ImageTransformService;

/// Batch uploader bound to one storage backend.
///
/// Cloning is cheap; clones share the backend and transformer but each keeps
/// its own upload directory.
#[derive(Clone)]
pub struct Uploader {
    config: Arc<Config>,
    storage: Arc<dyn Storage>,
    derivatives: Arc<DerivativeFanout>,
    upload_dir: Option<String>,
}

impl Uploader {
    pub fn new(
        config: Arc<Config>,
        storage: Arc<dyn Storage>,
        transformer: Arc<dyn ImageTransformService>,
    ) -> Self {
        let derivatives = Arc::new(DerivativeFanout::new(
            transformer,
            config.max_concurrent_derivative_uploads,
        ));
        Self {
            config,
            storage,
            derivatives,
            upload_dir: None,
        }
    }

    /// Build the configured storage backend and the built-in transformer.
    pub async fn from_config(config: Config) -> StorageResult<Self> {
        let storage = create_storage(&config).await?;
        Ok(Self::new(
            Arc::new(config),
            storage,
            Arc::new(ImageTransformer::new()),
        ))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Place subsequent uploads under `directory`, relative to the storage root.
    /// Backslashes are accepted as separators; an empty value resets to the root.
    pub fn set_upload_directory(&mut self, directory: &str) {
        let directory = normalize_directory(directory);
        self.upload_dir = (!directory.is_empty()).then_some(directory);
    }

    pub fn with_upload_directory(mut self, directory: &str) -> Self {
        self.set_upload_directory(directory);
        self
    }

    pub fn upload_directory(&self) -> Option<&str> {
        self.upload_dir.as_deref()
    }

    /// Storage key of `name`, or of its `variant` derivative.
    pub fn path_of_file(&self, name: &str, variant: Option<&str>) -> String {
        object_key(self.upload_directory(), variant, name)
    }

    /// Public URL of `name`, or of its `variant` derivative.
    pub fn url_of_file(&self, name: &str, variant: Option<&str>) -> String {
        self.storage.locate_url(&self.path_of_file(name, variant))
    }

    /// Where an attachment can be fetched from: a filesystem path for local
    /// backends, the public URL otherwise.
    pub fn attachment_uri(&self, name: &str, variant: Option<&str>) -> String {
        match self
            .storage
            .local_directory(self.upload_directory().unwrap_or_default())
        {
            Some(dir) => object_key(None, variant, name)
                .split('/')
                .fold(dir, |path, segment| path.join(segment))
                .display()
                .to_string(),
            None => self.url_of_file(name, variant),
        }
    }

    /// Derivatives requested by `selection` that are configured.
    pub fn image_specs(&self, selection: Option<&ImageSizeSelection>) -> Vec<DerivativeSpec> {
        selection
            .map(|selection| self.config.image_size_sets.resolve(selection))
            .unwrap_or_default()
    }

    /// Upload every file of `batch` concurrently.
    ///
    /// All files are processed to completion regardless of individual
    /// failures; the outcome lists each file exactly once, in completion
    /// order. The only batch-level error is an empty batch.
    pub async fn upload(
        &self,
        batch: Vec<IncomingFile>,
        allowed: &AllowedTypes,
        selection: Option<&ImageSizeSelection>,
    ) -> Result<UploadOutcome, UploadFailure> {
        if batch.is_empty() {
            return Err(UploadFailure::InvalidForm);
        }

        let start = std::time::Instant::now();
        let batch_size = batch.len();
        let specs: Arc<[DerivativeSpec]> = self.image_specs(selection).into();
        let allowed = Arc::new(allowed.clone());
        let outcome = Arc::new(Mutex::new(UploadOutcome::default()));
        let semaphore = limiter(self.config.max_concurrent_uploads);

        let names: Vec<String> = batch
            .iter()
            .map(|file| file.original_name().to_string())
            .collect();
        // Task id -> batch index, until the task reports back.
        let mut pending: HashMap<Id, usize> = HashMap::with_capacity(batch_size);
        let mut tasks = JoinSet::new();

        for (index, file) in batch.into_iter().enumerate() {
            let uploader = self.clone();
            let allowed = Arc::clone(&allowed);
            let specs = Arc::clone(&specs);
            let outcome = Arc::clone(&outcome);
            let semaphore = semaphore.clone();

            let handle = tasks.spawn(async move {
                let _permit = match semaphore {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                let result = uploader.upload_one(&file, &allowed, &specs).await;
                uploader.record(&outcome, result).await;
            });
            pending.insert(handle.id(), index);
        }

        // A file whose task panicked gets that task's own panic message.
        let mut aborted: Vec<(usize, String)> = Vec::new();
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, ())) => {
                    pending.remove(&id);
                }
                Err(e) => {
                    if let Some(index) = pending.remove(&e.id()) {
                        aborted.push((index, e.to_string()));
                    }
                }
            }
        }
        aborted.extend(
            pending
                .into_values()
                .map(|index| (index, "task did not complete".to_string())),
        );

        for (index, reason) in aborted {
            let error =
                UploadError::new(names[index].clone(), UploadFailure::TaskAborted(reason));
            self.record(&outcome, Err(error)).await;
        }

        let outcome = match Arc::try_unwrap(outcome) {
            Ok(outcome) => outcome.into_inner(),
            Err(shared) => std::mem::take(&mut *shared.lock().await),
        };

        tracing::info!(
            files = batch_size,
            uploaded = outcome.uploaded.len(),
            failed = outcome.failed.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Upload batch finished"
        );

        Ok(outcome)
    }

    async fn record(
        &self,
        outcome: &Mutex<UploadOutcome>,
        result: Result<UploadedFileRecord, UploadError>,
    ) {
        match result {
            Ok(record) => {
                tracing::debug!(
                    original_name = %record.original_name,
                    name = %record.name,
                    size_bytes = record.size_bytes,
                    "File uploaded"
                );
                outcome.lock().await.uploaded.push(record);
            }
            Err(error) => {
                if self.config.debug_errors {
                    error.log();
                } else {
                    tracing::debug!(file_name = %error.file_name, error = %error.cause, "File rejected");
                }
                outcome.lock().await.failed.push(error);
            }
        }
    }

    async fn upload_one(
        &self,
        file: &IncomingFile,
        allowed: &AllowedTypes,
        specs: &[DerivativeSpec],
    ) -> Result<UploadedFileRecord, UploadError> {
        let original_name = file.original_name();
        let fail = |cause: UploadFailure| UploadError::new(original_name, cause);

        let mut stream = file
            .open()
            .await
            .map_err(|e| fail(UploadFailure::io(IoOp::Open)(e)))?;

        let mut prefix = Vec::with_capacity(SNIFF_LEN);
        (&mut stream)
            .take(SNIFF_LEN as u64)
            .read_to_end(&mut prefix)
            .await
            .map_err(|e| fail(UploadFailure::io(IoOp::Read)(e)))?;

        let extension = extension_of(original_name);
        let mut detected = DetectedType::sniff(&prefix);
        let policy = detected.classify(&extension, allowed).map_err(fail)?;

        stream
            .seek(SeekFrom::Start(0))
            .await
            .map_err(|e| fail(UploadFailure::io(IoOp::Seek)(e)))?;

        let name = generate_name(&extension);
        let key = self.path_of_file(&name, None);
        let size_bytes = self
            .storage
            .write(&key, &mut stream)
            .await
            .map_err(|e| fail(e.into()))?;

        let mut record = UploadedFileRecord {
            name,
            original_name: original_name.to_string(),
            content_type: detected.content_type.clone(),
            category: policy.category,
            size_bytes,
            dimensions: None,
        };

        if !detected.is_image() || specs.is_empty() {
            return Ok(record);
        }

        stream
            .seek(SeekFrom::Start(0))
            .await
            .map_err(|e| fail(UploadFailure::io(IoOp::Seek)(e)))?;
        let mut data = Vec::with_capacity(size_bytes as usize);
        stream
            .read_to_end(&mut data)
            .await
            .map_err(|e| fail(UploadFailure::io(IoOp::Read)(e)))?;
        let data = Bytes::from(data);

        let dimensions = ImageProcessor::probe(data.clone())
            .await
            .map_err(|e| fail(UploadFailure::InvalidImage(e)))?;
        record.dimensions = Some(dimensions);

        let report = self
            .derivatives
            .generate_and_persist(
                data,
                &record.name,
                &record.content_type,
                specs,
                &self.storage,
                self.upload_directory(),
            )
            .await
            .map_err(fail)?;

        if !report.is_complete() {
            let cause = UploadFailure::UploadFailed {
                failed: report.errors.len(),
                requested: specs.len(),
            };
            return Err(fail(cause).with_derivative_errors(report.errors));
        }

        Ok(record)
    }
}
