//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations the pipeline
//! drives: decode, resize, and encode. Keeping them behind a trait lets the
//! orchestrator be tested with a recording mock that never touches pixels.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate's codecs and `fast_image_resize`.

use super::calculations::ResizeSpec;
use super::params::EncodeSpec;
use super::strategy::InterpolationStrategy;
use image::{DynamicImage, ImageFormat};
use std::io::Write;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Resize failed: {0}")]
    Resize(String),
    #[error("{width}x{height} output exceeds the {limit} pixel limit")]
    TooLarge { width: u32, height: u32, limit: u64 },
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// A decoded raster together with the format its bytes were detected as.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub image: DynamicImage,
    pub format: ImageFormat,
}

/// Trait for image processing backends.
pub trait ImageBackend {
    /// Decode raw bytes, sniffing the container format from the content.
    fn decode(&self, bytes: &[u8]) -> Result<Decoded, BackendError>;

    /// Apply the resize policy. Fails before allocating when the planned
    /// output is over [`MAX_OUTPUT_PIXELS`](super::calculations::MAX_OUTPUT_PIXELS).
    fn resize(
        &self,
        img: DynamicImage,
        spec: ResizeSpec,
        strategy: InterpolationStrategy,
    ) -> Result<DynamicImage, BackendError>;

    /// Encode `img` and write it to `sink` as it is produced.
    fn encode(
        &self,
        img: &DynamicImage,
        spec: EncodeSpec,
        sink: &mut dyn Write,
    ) -> Result<(), BackendError>;
}
