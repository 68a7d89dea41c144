use crate::keys::validate_key;
use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue};
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::{
    Attribute, Attributes, ClientOptions, ObjectStore, ObjectStoreExt, PutOptions, PutPayload,
};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Cache directive set on every object this backend writes.
pub const PUBLIC_CACHE_CONTROL: &str = "public, max-age=15552000";

/// Remote object store implementation (S3 and S3-compatible providers)
#[derive(Clone)]
pub struct S3Storage {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    base_url: String,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    /// * `base_url` - Public URL prefix for objects; derived from the endpoint or
    ///   bucket/region when `None`
    ///
    /// Every request carries `x-amz-acl: public-read`, so written objects are
    /// publicly readable.
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
        base_url: Option<String>,
    ) -> StorageResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-amz-acl"),
            HeaderValue::from_static("public-read"),
        );

        let mut builder = AmazonS3Builder::from_env()
            .with_region(region.clone())
            .with_bucket_name(bucket.clone())
            .with_client_options(ClientOptions::new().with_default_headers(headers));

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        let base_url = base_url.unwrap_or_else(|| match endpoint_url {
            // Path-style for S3-compatible providers: {endpoint}/{bucket}
            Some(ref endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
            None => format!("https://{}.s3.{}.amazonaws.com", bucket, region),
        });

        Ok(S3Storage {
            store: Arc::new(store),
            bucket,
            base_url,
        })
    }

    /// Wrap an already-configured object store, e.g. `InMemory` or a GCS client.
    pub fn from_store(store: Arc<dyn ObjectStore>, bucket: String, base_url: String) -> Self {
        S3Storage {
            store,
            bucket,
            base_url,
        }
    }

    /// Generate public URL for an object
    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    fn put_options() -> PutOptions {
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::CacheControl, PUBLIC_CACHE_CONTROL.into());
        PutOptions {
            attributes,
            ..Default::default()
        }
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn write(
        &self,
        key: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StorageResult<u64> {
        validate_key(key)?;
        let start = std::time::Instant::now();

        // The store takes a single payload, so the stream is buffered first.
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to read from stream: {}", e))
        })?;

        let size = buffer.len() as u64;
        let location = Path::from(key);

        self.store
            .put_opts(
                &location,
                PutPayload::from(Bytes::from(buffer)),
                Self::put_options(),
            )
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object store upload failed"
                );
                StorageError::UploadFailed(e.to_string())
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object store upload successful"
        );

        Ok(size)
    }

    fn locate_url(&self, key: &str) -> String {
        self.generate_url(key)
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        let location = Path::from(key);
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
