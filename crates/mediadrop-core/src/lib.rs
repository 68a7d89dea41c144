//! Mediadrop Core Library
//!
//! This crate provides the configuration, domain models, file-type policies and
//! name generation shared by the storage and processing crates.

pub mod config;
pub mod file_type;
pub mod models;
pub mod naming;
pub mod storage_types;

// Re-export commonly used types
pub use config::{parse_image_size_sets, Config};
pub use file_type::{AllowedTypes, FileCategory, FileTypePolicy};
pub use models::{
    CropPolicy, DerivativeSpec, ImageDimensions, ImageSizeSelection, ImageSizeSets,
    UploadedFileRecord,
};
pub use naming::generate_name;
pub use storage_types::StorageBackend;
