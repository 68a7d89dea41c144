//! Domain models for the upload pipeline.

use crate::file_type::FileCategory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

impl ImageDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Parse dimensions from string format: "WxH"
    pub fn parse(s: &str) -> Result<Self, String> {
        let (width, height) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("Invalid dimensions format: {}. Expected: WxH", s))?;

        let width = width
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("Invalid width: {}", width))?;
        let height = height
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("Invalid height: {}", height))?;

        if width == 0 || height == 0 {
            return Err(format!("Dimensions must be non-zero: {}", s));
        }

        Ok(Self { width, height })
    }
}

/// How a derivative is fitted into its target box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropPolicy {
    /// Scale to cover the box, cropping the overflow.
    #[default]
    CropToFill,
    /// Scale to fit inside the box and pad with an RGBA background.
    Fit { background: [u8; 4] },
}

impl CropPolicy {
    pub const WHITE: [u8; 4] = [255, 255, 255, 255];

    pub fn fit_on_white() -> Self {
        CropPolicy::Fit {
            background: Self::WHITE,
        }
    }
}

/// One requested derivative of an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivativeSpec {
    /// Variant name, also the path segment the derivative is stored under.
    pub variant: String,
    pub width: u32,
    pub height: u32,
    pub crop: CropPolicy,
}

/// Named sets of target sizes, keyed by category label then variant name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSizeSets(BTreeMap<String, BTreeMap<String, ImageDimensions>>);

impl ImageSizeSets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        category: impl Into<String>,
        variant: impl Into<String>,
        dimensions: ImageDimensions,
    ) -> &mut Self {
        self.0
            .entry(category.into())
            .or_default()
            .insert(variant.into().trim().to_lowercase(), dimensions);
        self
    }

    pub fn category(&self, category: &str) -> Option<&BTreeMap<String, ImageDimensions>> {
        self.0.get(category)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolve a caller's selection into concrete derivative specs.
    ///
    /// Only variants present both in the configured category and in the
    /// selection are returned. An unknown category resolves to nothing.
    pub fn resolve(&self, selection: &ImageSizeSelection) -> Vec<DerivativeSpec> {
        let Some(sizes) = self.0.get(&selection.category) else {
            return Vec::new();
        };

        sizes
            .iter()
            .filter(|(variant, _)| {
                selection
                    .sizes
                    .iter()
                    .any(|wanted| wanted.trim().eq_ignore_ascii_case(variant))
            })
            .map(|(variant, dims)| DerivativeSpec {
                variant: variant.clone(),
                width: dims.width,
                height: dims.height,
                crop: selection.crop,
            })
            .collect()
    }
}

/// Which configured size set and variants an upload call asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSizeSelection {
    pub category: String,
    pub sizes: Vec<String>,
    #[serde(default)]
    pub crop: CropPolicy,
}

impl ImageSizeSelection {
    pub fn new(category: impl Into<String>, sizes: Vec<String>) -> Self {
        Self {
            category: category.into(),
            sizes,
            crop: CropPolicy::default(),
        }
    }

    pub fn with_crop(mut self, crop: CropPolicy) -> Self {
        self.crop = crop;
        self
    }
}

/// A successfully persisted original.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFileRecord {
    /// Generated storage name.
    pub name: String,
    pub original_name: String,
    /// Sniffed content signature.
    pub content_type: String,
    pub category: FileCategory,
    pub size_bytes: u64,
    /// Set for images whose derivatives were generated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<ImageDimensions>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sets() -> ImageSizeSets {
        let mut sets = ImageSizeSets::new();
        sets.insert("avatar", "thumb", ImageDimensions::new(64, 64))
            .insert("avatar", "Medium", ImageDimensions::new(256, 256))
            .insert("post", "large", ImageDimensions::new(1200, 900));
        sets
    }

    #[test]
    fn test_parse_dimensions() {
        assert_eq!(
            ImageDimensions::parse("320x240").unwrap(),
            ImageDimensions::new(320, 240)
        );
        assert_eq!(
            ImageDimensions::parse(" 64X32 ").unwrap(),
            ImageDimensions::new(64, 32)
        );
        assert!(ImageDimensions::parse("320x").is_err());
        assert!(ImageDimensions::parse("0x10").is_err());
        assert!(ImageDimensions::parse("abc").is_err());
    }

    #[test]
    fn test_resolve_keeps_intersection() {
        let selection = ImageSizeSelection::new(
            "avatar",
            vec!["thumb".to_string(), "huge".to_string(), "MEDIUM".to_string()],
        );
        let specs = sets().resolve(&selection);
        let variants: Vec<_> = specs.iter().map(|s| s.variant.as_str()).collect();
        assert_eq!(variants, vec!["medium", "thumb"]);
        assert!(specs.iter().all(|s| s.crop == CropPolicy::CropToFill));
    }

    #[test]
    fn test_resolve_unknown_category_is_empty() {
        let selection = ImageSizeSelection::new("banner", vec!["thumb".to_string()]);
        assert!(sets().resolve(&selection).is_empty());
    }

    #[test]
    fn test_resolve_carries_crop_policy() {
        let selection = ImageSizeSelection::new("post", vec!["large".to_string()])
            .with_crop(CropPolicy::fit_on_white());
        let specs = sets().resolve(&selection);
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].crop, CropPolicy::fit_on_white());
        assert_eq!((specs[0].width, specs[0].height), (1200, 900));
    }

    #[test]
    fn test_record_serialization_skips_missing_dimensions() {
        let record = UploadedFileRecord {
            name: "1700000000-abc.pdf".to_string(),
            original_name: "report.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            category: FileCategory::Pdf,
            size_bytes: 42,
            dimensions: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["category"], "pdf");
        assert!(json.get("dimensions").is_none());
    }
}
