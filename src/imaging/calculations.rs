//! Pure calculation functions for resize dimensions.
//!
//! All functions here are pure and testable without any I/O or images. Ratios
//! are evaluated with integer cross-multiplication so results do not depend on
//! floating-point rounding.

/// Requested maximum dimensions. `0` means "unset" for either bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResizeSpec {
    pub max_width: u32,
    pub max_height: u32,
}

impl ResizeSpec {
    pub fn new(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width,
            max_height,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.max_width == 0 && self.max_height == 0
    }
}

/// Largest raster the resize stage will allocate: 512 MiB as 8-bit RGBA.
pub const MAX_OUTPUT_PIXELS: u64 = 1 << 27;

/// What the resize stage should do with a given source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizePlan {
    /// Hand the source through untouched.
    Passthrough,
    /// Proportional resize driven by a single bound.
    Scale { width: u32, height: u32 },
    /// Largest aspect-preserving size inside a `max_width × max_height` box.
    Fit { width: u32, height: u32 },
}

impl ResizePlan {
    /// Target dimensions, or `None` when no resampling is needed.
    pub fn target(&self) -> Option<(u32, u32)> {
        match *self {
            ResizePlan::Passthrough => None,
            ResizePlan::Scale { width, height } | ResizePlan::Fit { width, height } => {
                Some((width, height))
            }
        }
    }

    /// Whether the target raster is larger than [`MAX_OUTPUT_PIXELS`].
    pub fn exceeds_pixel_limit(&self) -> bool {
        self.target()
            .is_some_and(|(w, h)| w as u64 * h as u64 > MAX_OUTPUT_PIXELS)
    }
}

/// `round(value * numerator / denominator)`, half rounding up.
///
/// `denominator` must be non-zero.
fn scale_round(value: u32, numerator: u32, denominator: u32) -> u32 {
    let (v, n, d) = (value as u128, numerator as u128, denominator as u128);
    let rounded = (2 * v * n + d) / (2 * d);
    rounded.min(u32::MAX as u128) as u32
}

/// Decide how to resize an image of `source` dimensions under `spec`.
///
/// - Both bounds unset → [`ResizePlan::Passthrough`].
/// - One bound set → [`ResizePlan::Scale`]: that dimension equals the bound,
///   the other follows the source aspect ratio.
/// - Both set → [`ResizePlan::Fit`]: the more restrictive of the two implied
///   scale factors wins, so the result touches the box on one side and stays
///   inside it on the other.
///
/// Upscaling is allowed in every mode. A degenerate source (zero width or
/// height) or a target equal to the source size is a pass-through.
///
/// # Examples
/// ```
/// # use resizer::imaging::{ResizePlan, ResizeSpec, plan_resize};
/// // 1000x500 with max-width 500 → 500x250
/// assert_eq!(
///     plan_resize(ResizeSpec::new(500, 0), (1000, 500)),
///     ResizePlan::Scale { width: 500, height: 250 }
/// );
///
/// // 500x1000 inside a 300x300 box → height-limited 150x300
/// assert_eq!(
///     plan_resize(ResizeSpec::new(300, 300), (500, 1000)),
///     ResizePlan::Fit { width: 150, height: 300 }
/// );
/// ```
pub fn plan_resize(spec: ResizeSpec, source: (u32, u32)) -> ResizePlan {
    let (src_w, src_h) = source;
    let ResizeSpec {
        max_width,
        max_height,
    } = spec;

    if spec.is_noop() || src_w == 0 || src_h == 0 {
        return ResizePlan::Passthrough;
    }

    let plan = match (max_width, max_height) {
        (w, 0) => ResizePlan::Scale {
            width: w,
            height: scale_round(src_h, w, src_w).max(1),
        },
        (0, h) => ResizePlan::Scale {
            width: scale_round(src_w, h, src_h).max(1),
            height: h,
        },
        (w, h) => {
            let (width, height) = calculate_fit_dimensions(source, (w, h));
            ResizePlan::Fit { width, height }
        }
    };

    match plan.target() {
        Some(target) if target == source => ResizePlan::Passthrough,
        _ => plan,
    }
}

/// Calculate the largest size that fits inside `bounds` at the source aspect ratio.
///
/// Compares `bound_w / src_w` against `bound_h / src_h` and keeps the smaller
/// factor. The limiting side equals its bound; the other is rounded and
/// clamped to `[1, bound]`.
///
/// Both `source` and `bounds` must be non-zero in each dimension.
pub fn calculate_fit_dimensions(source: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (max_w, max_h) = bounds;

    let width_limited = (max_w as u64) * (src_h as u64) <= (max_h as u64) * (src_w as u64);

    if width_limited {
        let h = scale_round(src_h, max_w, src_w).clamp(1, max_h);
        (max_w, h)
    } else {
        let w = scale_round(src_w, max_h, src_h).clamp(1, max_w);
        (w, max_h)
    }
}
