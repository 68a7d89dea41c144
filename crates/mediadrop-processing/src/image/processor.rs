//! Image processor - dimension probing

use image::ImageReader;
use mediadrop_core::ImageDimensions;
use std::io::Cursor;

pub struct ImageProcessor;

impl ImageProcessor {
    /// Read pixel dimensions from the image header without decoding pixels.
    pub fn dimensions(data: &[u8]) -> Result<ImageDimensions, image::ImageError> {
        let reader = ImageReader::new(Cursor::new(data)).with_guessed_format()?;
        let (width, height) = reader.into_dimensions()?;
        Ok(ImageDimensions::new(width, height))
    }

    /// [`ImageProcessor::dimensions`] on the blocking pool.
    pub async fn probe(data: bytes::Bytes) -> Result<ImageDimensions, String> {
        tokio::task::spawn_blocking(move || Self::dimensions(&data))
            .await
            .map_err(|e| format!("Dimension probe task failed: {}", e))?
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([10, 20, 30, 255]),
        ));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn test_dimensions_from_header() {
        let data = png(40, 30);
        assert_eq!(
            ImageProcessor::dimensions(&data).unwrap(),
            ImageDimensions::new(40, 30)
        );
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(ImageProcessor::dimensions(b"definitely not an image").is_err());
    }

    #[tokio::test]
    async fn test_probe_on_blocking_pool() {
        let dims = ImageProcessor::probe(bytes::Bytes::from(png(8, 6)))
            .await
            .unwrap();
        assert_eq!(dims, ImageDimensions::new(8, 6));
    }
}
