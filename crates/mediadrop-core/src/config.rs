//! Configuration module
//!
//! Process-wide uploader configuration. It is built once (usually from the
//! environment), validated, and then shared read-only with the storage factory
//! and the upload orchestrator.

use std::env;

use crate::models::{ImageDimensions, ImageSizeSets};
use crate::storage_types::StorageBackend;

const LOCAL_STORAGE_PATH: &str = "./uploads";
const LOCAL_STORAGE_BASE_URL: &str = "http://localhost:3000/uploads";
const MAX_CONCURRENT_UPLOADS: usize = 16;
const MAX_CONCURRENT_DERIVATIVE_UPLOADS: usize = 8;

/// Uploader configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub storage_backend: StorageBackend,
    // Local backend
    pub local_storage_path: String,
    pub local_storage_base_url: String,
    // Remote backend
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, GCS interop, etc.)
    /// Public URL prefix for remote objects. Derived from bucket/region when unset.
    pub remote_base_url: Option<String>,
    pub image_size_sets: ImageSizeSets,
    /// Log every per-file failure at error level as it is produced.
    pub debug_errors: bool,
    /// Files processed at once per batch; 0 disables the limit.
    pub max_concurrent_uploads: usize,
    /// Derivative uploads in flight at once per file; 0 disables the limit.
    pub max_concurrent_derivative_uploads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_backend: StorageBackend::Local,
            local_storage_path: LOCAL_STORAGE_PATH.to_string(),
            local_storage_base_url: LOCAL_STORAGE_BASE_URL.to_string(),
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            remote_base_url: None,
            image_size_sets: ImageSizeSets::default(),
            debug_errors: false,
            max_concurrent_uploads: MAX_CONCURRENT_UPLOADS,
            max_concurrent_derivative_uploads: MAX_CONCURRENT_DERIVATIVE_UPLOADS,
        }
    }
}

impl Config {
    /// Local-filesystem configuration rooted at `path`, served under `base_url`.
    pub fn local(path: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            storage_backend: StorageBackend::Local,
            local_storage_path: path.into(),
            local_storage_base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_image_size_sets(mut self, sets: ImageSizeSets) -> Self {
        self.image_size_sets = sets;
        self
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => StorageBackend::Local,
        };

        let image_size_sets = match env::var("IMAGE_SIZE_SETS") {
            Ok(raw) => parse_image_size_sets(&raw)?,
            Err(_) => ImageSizeSets::default(),
        };

        let config = Config {
            storage_backend,
            local_storage_path: env::var("LOCAL_STORAGE_PATH")
                .unwrap_or_else(|_| LOCAL_STORAGE_PATH.to_string()),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL")
                .unwrap_or_else(|_| LOCAL_STORAGE_BASE_URL.to_string()),
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            remote_base_url: env::var("REMOTE_BASE_URL").ok(),
            image_size_sets,
            debug_errors: env::var("UPLOAD_DEBUG")
                .unwrap_or_else(|_| "false".to_string())
                .to_lowercase()
                .parse()
                .unwrap_or(false),
            max_concurrent_uploads: env::var("MAX_CONCURRENT_UPLOADS")
                .unwrap_or_else(|_| MAX_CONCURRENT_UPLOADS.to_string())
                .parse()
                .unwrap_or(MAX_CONCURRENT_UPLOADS),
            max_concurrent_derivative_uploads: env::var("MAX_CONCURRENT_DERIVATIVE_UPLOADS")
                .unwrap_or_else(|_| MAX_CONCURRENT_DERIVATIVE_UPLOADS.to_string())
                .parse()
                .unwrap_or(MAX_CONCURRENT_DERIVATIVE_UPLOADS),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        match self.storage_backend {
            StorageBackend::Local => {
                if self.local_storage_path.trim().is_empty() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must not be empty for the local backend"
                    ));
                }
            }
            StorageBackend::S3 => {
                if self.s3_bucket.as_deref().map_or(true, |b| b.trim().is_empty()) {
                    return Err(anyhow::anyhow!("S3_BUCKET must be set for the s3 backend"));
                }
                if self.s3_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set for the s3 backend"
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Parse size sets from `category:variant=WxH,variant=WxH;category:...`.
///
/// Example: `avatar:thumb=64x64,medium=256x256;post:large=1200x900`
pub fn parse_image_size_sets(raw: &str) -> Result<ImageSizeSets, anyhow::Error> {
    let mut sets = ImageSizeSets::new();

    for group in raw.split(';').map(str::trim).filter(|g| !g.is_empty()) {
        let (category, sizes) = group
            .split_once(':')
            .ok_or_else(|| anyhow::anyhow!("Invalid size set '{}': expected category:sizes", group))?;
        let category = category.trim();
        if category.is_empty() {
            return Err(anyhow::anyhow!("Size set '{}' has an empty category", group));
        }

        for size in sizes.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (variant, dims) = size.split_once('=').ok_or_else(|| {
                anyhow::anyhow!("Invalid size '{}' in set '{}': expected name=WxH", size, category)
            })?;
            let dims = ImageDimensions::parse(dims).map_err(|e| anyhow::anyhow!(e))?;
            sets.insert(category, variant, dims);
        }
    }

    Ok(sets)
}
