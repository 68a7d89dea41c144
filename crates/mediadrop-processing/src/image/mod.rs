//! Image processing module
//!
//! This module provides image processing capabilities including:
//! - Header probing and validation (processor)
//! - Crop-to-fill and fit-with-background resizing (resize)
//! - Derivative generation for the upload pipeline (transformer)

pub mod processor;
pub mod resize;
pub mod transformer;

pub use processor::ImageProcessor;
pub use resize::ImageResize;
pub use transformer::ImageTransformer;
