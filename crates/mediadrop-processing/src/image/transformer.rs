//! Image transformer - produces sized derivatives of an uploaded image
//!
//! Decoding, resizing and encoding are CPU bound, so the whole batch of
//! variants for one image runs on the blocking pool.

use crate::image::resize::ImageResize;
use crate::traits::{Derivative, ImageTransformService, TransformError, TransformOutput};
use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, GenericImageView, ImageFormat};
use mediadrop_core::DerivativeSpec;
use std::io::Cursor;
use std::path::Path;

/// Built-in transform engine backed by the `image` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageTransformer;

impl ImageTransformer {
    pub fn new() -> Self {
        ImageTransformer
    }

    /// Detect image format from content type
    pub fn detect_format(content_type: &str) -> ImageFormat {
        match content_type {
            "image/jpeg" | "image/jpg" => ImageFormat::Jpeg,
            "image/png" => ImageFormat::Png,
            "image/gif" => ImageFormat::Gif,
            "image/webp" => ImageFormat::WebP,
            _ => ImageFormat::Jpeg,
        }
    }

    /// Encode `img` in `format`.
    pub fn encode(img: &DynamicImage, format: ImageFormat) -> Result<Bytes, image::ImageError> {
        let (width, height) = img.dimensions();
        let mut buffer = Vec::with_capacity(encode_capacity(width, height));
        let mut cursor = Cursor::new(&mut buffer);

        match format {
            // JPEG has no alpha channel.
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()).write_to(&mut cursor, format)?,
            _ => img.write_to(&mut cursor, format)?,
        }

        Ok(Bytes::from(buffer))
    }

    fn transform_blocking(
        data: &[u8],
        base_name: &str,
        format: ImageFormat,
        specs: &[DerivativeSpec],
        local_dest: Option<&Path>,
    ) -> Result<TransformOutput, TransformError> {
        let img = image::ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| TransformError::Decode(e.to_string()))?
            .decode()
            .map_err(|e| TransformError::Decode(e.to_string()))?;

        let mut output = TransformOutput::default();

        for spec in specs {
            let resized = ImageResize::apply(&img, spec);
            let encoded = match Self::encode(&resized, format) {
                Ok(encoded) => encoded,
                Err(e) => {
                    output.errors.insert(spec.variant.clone(), e.to_string());
                    continue;
                }
            };

            let derivative = match local_dest {
                Some(dest) => {
                    let variant_dir = dest.join(&spec.variant);
                    let path = variant_dir.join(base_name);
                    let written = std::fs::create_dir_all(&variant_dir)
                        .and_then(|_| std::fs::write(&path, &encoded));
                    match written {
                        Ok(()) => Derivative::Written(path),
                        Err(e) => {
                            output.errors.insert(
                                spec.variant.clone(),
                                format!("Failed to write {}: {}", path.display(), e),
                            );
                            continue;
                        }
                    }
                }
                None => Derivative::InMemory(encoded),
            };

            tracing::debug!(
                variant = %spec.variant,
                width = spec.width,
                height = spec.height,
                "Derivative generated"
            );
            output.derivatives.insert(spec.variant.clone(), derivative);
        }

        Ok(output)
    }
}

#[async_trait]
impl ImageTransformService for ImageTransformer {
    async fn transform(
        &self,
        data: Bytes,
        base_name: &str,
        content_type: &str,
        specs: &[DerivativeSpec],
        local_dest: Option<&Path>,
    ) -> Result<TransformOutput, TransformError> {
        let format = Self::detect_format(content_type);
        let base_name = base_name.to_string();
        let specs = specs.to_vec();
        let local_dest = local_dest.map(Path::to_path_buf);
        let start = std::time::Instant::now();

        let output = tokio::task::spawn_blocking(move || {
            Self::transform_blocking(&data, &base_name, format, &specs, local_dest.as_deref())
        })
        .await
        .map_err(|e| TransformError::Internal(e.to_string()))??;

        tracing::debug!(
            generated = output.derivatives.len(),
            failed = output.errors.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Image transform finished"
        );

        Ok(output)
    }
}

/// Output buffer estimate: one RGB pixel per byte triple.
fn encode_capacity(width: u32, height: u32) -> usize {
    (width as usize)
        .saturating_mul(height as usize)
        .saturating_mul(3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::processor::ImageProcessor;
    use image::{Rgba, RgbaImage};
    use mediadrop_core::{CropPolicy, ImageDimensions};
    use tempfile::tempdir;

    fn png(width: u32, height: u32) -> Bytes {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([0, 128, 255, 255]),
        ));
        ImageTransformer::encode(&img, ImageFormat::Png).unwrap()
    }

    fn specs() -> Vec<DerivativeSpec> {
        vec![
            DerivativeSpec {
                variant: "thumb".to_string(),
                width: 16,
                height: 16,
                crop: CropPolicy::CropToFill,
            },
            DerivativeSpec {
                variant: "medium".to_string(),
                width: 48,
                height: 32,
                crop: CropPolicy::fit_on_white(),
            },
        ]
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(ImageTransformer::detect_format("image/png"), ImageFormat::Png);
        assert_eq!(ImageTransformer::detect_format("image/jpg"), ImageFormat::Jpeg);
        assert_eq!(ImageTransformer::detect_format("image/gif"), ImageFormat::Gif);
        assert_eq!(
            ImageTransformer::detect_format("application/octet-stream"),
            ImageFormat::Jpeg
        );
    }

    #[test]
    fn test_encode_capacity_does_not_wrap_for_large_sizes() {
        assert_eq!(encode_capacity(40, 30), 3600);
        assert!(encode_capacity(40_000, 40_000) > u32::MAX as usize || usize::BITS == 32);
        assert_eq!(encode_capacity(u32::MAX, u32::MAX), usize::MAX);
    }

    #[test]
    fn test_encode_jpeg_drops_alpha() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 128])));
        let encoded = ImageTransformer::encode(&img, ImageFormat::Jpeg).unwrap();
        assert_eq!(&encoded[..3], b"\xFF\xD8\xFF");
    }

    #[tokio::test]
    async fn test_transform_in_memory() {
        let output = ImageTransformer::new()
            .transform(png(64, 64), "a.png", "image/png", &specs(), None)
            .await
            .unwrap();

        assert!(output.is_complete());
        let Some(Derivative::InMemory(thumb)) = output.derivatives.get("thumb") else {
            panic!("thumb should be in memory");
        };
        assert_eq!(
            ImageProcessor::dimensions(thumb).unwrap(),
            ImageDimensions::new(16, 16)
        );
        let Some(Derivative::InMemory(medium)) = output.derivatives.get("medium") else {
            panic!("medium should be in memory");
        };
        assert_eq!(
            ImageProcessor::dimensions(medium).unwrap(),
            ImageDimensions::new(48, 32)
        );
    }

    #[tokio::test]
    async fn test_transform_writes_local_variants() {
        let dir = tempdir().unwrap();
        let output = ImageTransformer::new()
            .transform(png(64, 64), "a.png", "image/png", &specs(), Some(dir.path()))
            .await
            .unwrap();

        assert!(output.is_complete());
        let thumb = dir.path().join("thumb").join("a.png");
        let medium = dir.path().join("medium").join("a.png");
        assert_eq!(output.derivatives["thumb"], Derivative::Written(thumb.clone()));
        assert_eq!(output.derivatives["medium"], Derivative::Written(medium.clone()));
        assert!(thumb.is_file());
        assert!(medium.is_file());
    }

    #[tokio::test]
    async fn test_transform_reports_per_variant_write_failure() {
        let dir = tempdir().unwrap();
        // A regular file where the thumb directory belongs.
        std::fs::write(dir.path().join("thumb"), b"blocked").unwrap();

        let output = ImageTransformer::new()
            .transform(png(64, 64), "a.png", "image/png", &specs(), Some(dir.path()))
            .await
            .unwrap();

        assert_eq!(output.errors.len(), 1);
        assert!(output.errors.contains_key("thumb"));
        assert!(output.derivatives.contains_key("medium"));
    }

    #[tokio::test]
    async fn test_transform_rejects_undecodable_input() {
        let result = ImageTransformer::new()
            .transform(
                Bytes::from_static(b"not an image"),
                "a.png",
                "image/png",
                &specs(),
                None,
            )
            .await;
        assert!(matches!(result, Err(TransformError::Decode(_))));
    }
}
