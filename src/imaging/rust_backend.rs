//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, TIFF, WebP) | `image::ImageReader` with content sniffing |
//! | Resize policy | [`plan_resize`](super::calculations::plan_resize) |
//! | Resample | `fast_image_resize::Resizer` (all six kernels) |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |
//!
//! Encoders write straight into the caller's sink; the encoded image is never
//! collected in memory first.

use super::backend::{BackendError, Decoded, ImageBackend};
use super::calculations::{MAX_OUTPUT_PIXELS, ResizePlan, ResizeSpec, plan_resize};
use super::params::{EncodeSpec, JpegQuality, PngTier};
use super::strategy::InterpolationStrategy;
use fast_image_resize::{IntoImageView, ResizeOptions, Resizer};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::{ColorType, DynamicImage, ImageReader};
use std::borrow::Cow;
use std::io::{Cursor, Write};
use tracing::{debug, info};

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode an in-memory image, detecting its format from the leading bytes.
pub fn decode(bytes: &[u8]) -> Result<Decoded, BackendError> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let format = reader
        .format()
        .ok_or_else(|| BackendError::Decode("unrecognized image format".to_string()))?;

    let image = reader
        .decode()
        .map_err(|e| BackendError::Decode(format!("{format:?}: {e}")))?;

    debug!(
        ?format,
        width = image.width(),
        height = image.height(),
        color = ?image.color(),
        "Decoded image"
    );
    Ok(Decoded { image, format })
}

/// Apply the resize policy to `img`.
///
/// Returns `img` itself when there is nothing to do; otherwise a new raster
/// of the planned size, resampled with `strategy`.
pub fn resize(
    spec: ResizeSpec,
    img: DynamicImage,
    strategy: InterpolationStrategy,
) -> Result<DynamicImage, BackendError> {
    let source = (img.width(), img.height());
    let plan = plan_resize(spec, source);
    if plan.exceeds_pixel_limit() {
        let (width, height) = plan.target().unwrap_or(source);
        return Err(BackendError::TooLarge {
            width,
            height,
            limit: MAX_OUTPUT_PIXELS,
        });
    }

    match plan {
        ResizePlan::Passthrough => {
            debug!(width = source.0, height = source.1, "Keeping original size");
            Ok(img)
        }
        ResizePlan::Scale { width, height } => {
            info!("Resizing image with Resize");
            debug!(%strategy, from = ?source, to = ?(width, height), "Scaling by single bound");
            resample(&img, width, height, strategy)
        }
        ResizePlan::Fit { width, height } => {
            info!("Resizing image with Thumbnail");
            debug!(%strategy, from = ?source, to = ?(width, height), "Fitting inside bounds");
            resample(&img, width, height, strategy)
        }
    }
}

/// Resample into a fresh raster of the same color type.
///
/// Color types `fast_image_resize` has no view for are widened to RGBA8 first.
fn resample(
    img: &DynamicImage,
    width: u32,
    height: u32,
    strategy: InterpolationStrategy,
) -> Result<DynamicImage, BackendError> {
    let src = match img.pixel_type() {
        Some(_) => Cow::Borrowed(img),
        None => Cow::Owned(DynamicImage::ImageRgba8(img.to_rgba8())),
    };
    let alg = strategy
        .resize_alg()
        .map_err(|e| BackendError::Resize(format!("{strategy}: {e}")))?;

    let mut dst = DynamicImage::new(width, height, src.color());
    Resizer::new()
        .resize(&*src, &mut dst, &ResizeOptions::new().resize_alg(alg))
        .map_err(|e| BackendError::Resize(format!("{strategy}: {e}")))?;
    Ok(dst)
}

/// Encode `img` per `spec`, writing into `sink`.
pub fn encode(
    img: &DynamicImage,
    spec: EncodeSpec,
    sink: &mut dyn Write,
) -> Result<(), BackendError> {
    match spec {
        EncodeSpec::Jpeg { quality } => encode_jpeg(img, quality, sink),
        EncodeSpec::Png { tier } => encode_png(img, tier, sink),
    }
}

fn encode_jpeg(
    img: &DynamicImage,
    quality: JpegQuality,
    sink: &mut dyn Write,
) -> Result<(), BackendError> {
    info!("Encoding image as JPEG");
    let encoder = JpegEncoder::new_with_quality(sink, quality.value());
    jpeg_compatible(img)
        .write_with_encoder(encoder)
        .map_err(|e| BackendError::Encode(format!("JPEG encode failed: {e}")))
}

/// Baseline JPEG carries 8-bit gray or RGB only: drop alpha, narrow wide samples.
fn jpeg_compatible(img: &DynamicImage) -> Cow<'_, DynamicImage> {
    match img.color() {
        ColorType::L8 | ColorType::Rgb8 => Cow::Borrowed(img),
        ColorType::La8 | ColorType::L16 | ColorType::La16 => {
            Cow::Owned(DynamicImage::ImageLuma8(img.to_luma8()))
        }
        _ => Cow::Owned(DynamicImage::ImageRgb8(img.to_rgb8())),
    }
}

/// Fixed compression settings per tier, lowest effort first.
///
/// The levels are zlib's: `none` writes stored deflate blocks.
pub(crate) fn png_settings(tier: PngTier) -> (CompressionType, PngFilterType) {
    match tier {
        PngTier::None => (CompressionType::Uncompressed, PngFilterType::NoFilter),
        PngTier::BestSpeed => (CompressionType::Level(1), PngFilterType::Adaptive),
        PngTier::Default => (CompressionType::Level(6), PngFilterType::Adaptive),
        PngTier::BestCompression => (CompressionType::Level(9), PngFilterType::Adaptive),
    }
}

fn encode_png(img: &DynamicImage, tier: PngTier, sink: &mut dyn Write) -> Result<(), BackendError> {
    info!("Encoding image as PNG");
    let (compression, filter) = png_settings(tier);
    debug!(%tier, "PNG compression tier");
    let encoder = PngEncoder::new_with_quality(sink, compression, filter);
    png_compatible(img)
        .write_with_encoder(encoder)
        .map_err(|e| BackendError::Encode(format!("PNG encode failed: {e}")))
}

/// PNG has no float samples; widen float rasters to 16-bit RGBA.
fn png_compatible(img: &DynamicImage) -> Cow<'_, DynamicImage> {
    match img.color() {
        ColorType::Rgb32F | ColorType::Rgba32F => {
            Cow::Owned(DynamicImage::ImageRgba16(img.to_rgba16()))
        }
        _ => Cow::Borrowed(img),
    }
}

impl ImageBackend for RustBackend {
    fn decode(&self, bytes: &[u8]) -> Result<Decoded, BackendError> {
        decode(bytes)
    }

    fn resize(
        &self,
        img: DynamicImage,
        spec: ResizeSpec,
        strategy: InterpolationStrategy,
    ) -> Result<DynamicImage, BackendError> {
        resize(spec, img, strategy)
    }

    fn encode(
        &self,
        img: &DynamicImage,
        spec: EncodeSpec,
        sink: &mut dyn Write,
    ) -> Result<(), BackendError> {
        encode(img, spec, sink)
    }
}
