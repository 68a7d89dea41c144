//! Mediadrop Storage Library
//!
//! This crate provides the storage capability the upload pipeline writes through,
//! with implementations for the local filesystem and remote object stores.
//!
//! # Storage key format
//!
//! Both backends share one relative key layout, built by [`keys::object_key`]:
//!
//! - **Originals**: `{directory}/{file_name}`
//! - **Derivatives**: `{directory}/{variant}/{file_name}`
//!
//! Keys must not contain `..` segments or a leading `/`.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::{normalize_directory, normalize_variant, object_key};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use mediadrop_core::StorageBackend;
#[cfg(feature = "storage-s3")]
pub use s3::{S3Storage, PUBLIC_CACHE_CONTROL};
pub use traits::{Storage, StorageError, StorageResult};
