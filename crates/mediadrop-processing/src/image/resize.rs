use image::{imageops, DynamicImage, GenericImageView, Rgba, RgbaImage};
use mediadrop_core::{CropPolicy, DerivativeSpec};

/// Resizing primitives used for derivatives
pub struct ImageResize;

impl ImageResize {
    /// Select appropriate filter type based on resize ratio
    pub fn select_filter(
        orig_width: u32,
        orig_height: u32,
        new_width: u32,
        new_height: u32,
    ) -> imageops::FilterType {
        let width_ratio = orig_width as f32 / new_width.max(1) as f32;
        let height_ratio = orig_height as f32 / new_height.max(1) as f32;
        let max_ratio = width_ratio.max(height_ratio);

        if max_ratio > 2.0 {
            imageops::FilterType::Triangle
        } else if max_ratio > 1.5 {
            imageops::FilterType::CatmullRom
        } else {
            imageops::FilterType::Lanczos3
        }
    }

    /// Scale to cover the target box and crop the overflow around the center.
    pub fn crop_to_fill(img: &DynamicImage, target_width: u32, target_height: u32) -> DynamicImage {
        let (orig_width, orig_height) = img.dimensions();
        let filter = Self::select_filter(orig_width, orig_height, target_width, target_height);
        img.resize_to_fill(target_width, target_height, filter)
    }

    /// Scale to fit inside the target box and pad it with `background`.
    ///
    /// Images smaller than the box are centered at their original size.
    pub fn fit_with_background(
        img: &DynamicImage,
        target_width: u32,
        target_height: u32,
        background: [u8; 4],
    ) -> DynamicImage {
        let (orig_width, orig_height) = img.dimensions();

        let scale_width = target_width as f32 / orig_width as f32;
        let scale_height = target_height as f32 / orig_height as f32;
        let scale = scale_width.min(scale_height).min(1.0);

        let scaled_width = ((orig_width as f32 * scale).round() as u32).clamp(1, target_width);
        let scaled_height = ((orig_height as f32 * scale).round() as u32).clamp(1, target_height);

        let canvas_img = RgbaImage::from_pixel(target_width, target_height, Rgba(background));
        let mut canvas = DynamicImage::ImageRgba8(canvas_img);

        let x_offset = (target_width - scaled_width) / 2;
        let y_offset = (target_height - scaled_height) / 2;

        if scale < 1.0 {
            let filter = Self::select_filter(orig_width, orig_height, scaled_width, scaled_height);
            let resized = img.resize_exact(scaled_width, scaled_height, filter);
            imageops::overlay(&mut canvas, &resized, x_offset as i64, y_offset as i64);
        } else {
            imageops::overlay(&mut canvas, img, x_offset as i64, y_offset as i64);
        }

        canvas
    }

    /// Produce the derivative described by `spec`.
    pub fn apply(img: &DynamicImage, spec: &DerivativeSpec) -> DynamicImage {
        match spec.crop {
            CropPolicy::CropToFill => Self::crop_to_fill(img, spec.width, spec.height),
            CropPolicy::Fit { background } => {
                Self::fit_with_background(img, spec.width, spec.height, background)
            }
        }
    }
}
