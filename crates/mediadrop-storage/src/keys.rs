//! Shared key generation for storage backends.
//!
//! Key format: `{directory}/{variant}/{file_name}`. The variant segment is
//! omitted for originals, the directory segment when no upload directory is set.

use crate::traits::{StorageError, StorageResult};

/// Variant name that addresses the original rather than a derivative.
pub const ORIGINAL_VARIANT: &str = "original";

/// Normalize a caller-supplied upload directory into slash-separated segments.
///
/// Backslashes become `/`, empty segments and `.` are dropped, and surrounding
/// slashes are trimmed: `"\\avatars\\2024\\"` becomes `"avatars/2024"`.
pub fn normalize_directory(directory: &str) -> String {
    directory
        .replace('\\', "/")
        .split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Normalize a size-variant name. Returns `None` when it addresses the original.
pub fn normalize_variant(variant: Option<&str>) -> Option<String> {
    let variant = variant?.trim().to_lowercase();
    if variant.is_empty() || variant == ORIGINAL_VARIANT {
        None
    } else {
        Some(variant)
    }
}

/// Build the relative key for `file_name`, optionally under a size variant.
pub fn object_key(directory: Option<&str>, variant: Option<&str>, file_name: &str) -> String {
    let mut segments = Vec::with_capacity(3);

    if let Some(directory) = directory.map(normalize_directory) {
        if !directory.is_empty() {
            segments.push(directory);
        }
    }
    if let Some(variant) = normalize_variant(variant) {
        segments.push(variant);
    }
    segments.push(file_name.to_string());

    segments.join("/")
}

/// Reject keys that are empty, absolute, or climb out of the storage root.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.starts_with('/') || key.starts_with('\\') {
        return Err(StorageError::InvalidKey(format!(
            "Storage key must be relative: {:?}",
            key
        )));
    }
    if key.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(StorageError::InvalidKey(format!(
            "Storage key contains a parent segment: {:?}",
            key
        )));
    }
    Ok(())
}
