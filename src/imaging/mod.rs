//! Image processing: decode, resize, encode.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (format sniffed from content) |
//! | **Resize policy** | [`plan_resize`]: pass-through, single-bound scale, or box fit |
//! | **Resample** | `fast_image_resize`, algorithm picked by [`InterpolationStrategy`] |
//! | **Encode** | `JpegEncoder` (quality 0–100) / `PngEncoder` (compression tier) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Strategy**: The closed set of interpolation strategies
//! - **Parameters**: Data structures describing the encode target
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
mod params;
pub mod rust_backend;
pub mod strategy;

pub use backend::{BackendError, Decoded, ImageBackend};
pub use calculations::{
    MAX_OUTPUT_PIXELS, ResizePlan, ResizeSpec, calculate_fit_dimensions, plan_resize,
};
pub use params::{EncodeSpec, JpegQuality, OutputFormat, PngTier};
pub use rust_backend::{RustBackend, decode, encode, resize};
pub use strategy::{InterpolationStrategy, UnknownStrategy, lookup};
