//! Parameter types for the encode stage.
//!
//! These describe *what* to produce, not *how*. They are built during config
//! validation and handed to the [`backend`](super::backend) unchanged.
//!
//! ## Types
//!
//! - [`OutputFormat`] — `jpeg` or `png`, parsed case-sensitively.
//! - [`JpegQuality`] — lossy quality 0–100 (default 70). Out-of-range values are rejected.
//! - [`PngTier`] — named compression effort. Unknown names fall back to `default`.
//! - [`EncodeSpec`] — one format plus its parameter.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
}

impl OutputFormat {
    pub fn name(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jpeg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            other => Err(format!("unsupported format '{other}' (expected jpeg or png)")),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// JPEG quality (0-100).
///
/// Unlike a clamp, construction fails for out-of-range input: a typo in the
/// quality should stop the run before anything is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegQuality(u8);

impl JpegQuality {
    pub const MAX: i64 = 100;

    pub fn new(value: i64) -> Option<Self> {
        (0..=Self::MAX)
            .contains(&value)
            .then(|| Self(value as u8))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for JpegQuality {
    fn default() -> Self {
        Self(70)
    }
}

/// PNG compression effort, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum PngTier {
    None,
    BestSpeed,
    #[default]
    Default,
    BestCompression,
}

impl PngTier {
    /// Resolve a tier name. Anything unrecognized is treated as `default`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "none" => PngTier::None,
            "best-speed" => PngTier::BestSpeed,
            "best-compression" => PngTier::BestCompression,
            _ => PngTier::Default,
        }
    }

    /// Whether `name` is one of the four tier names (as opposed to a fallback).
    pub fn is_known(name: &str) -> bool {
        matches!(name, "default" | "none" | "best-speed" | "best-compression")
    }

    pub fn name(self) -> &'static str {
        match self {
            PngTier::None => "none",
            PngTier::BestSpeed => "best-speed",
            PngTier::Default => "default",
            PngTier::BestCompression => "best-compression",
        }
    }
}

impl fmt::Display for PngTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Target format with its format-specific setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeSpec {
    Jpeg { quality: JpegQuality },
    Png { tier: PngTier },
}

impl EncodeSpec {
    pub fn format(&self) -> OutputFormat {
        match self {
            EncodeSpec::Jpeg { .. } => OutputFormat::Jpeg,
            EncodeSpec::Png { .. } => OutputFormat::Png,
        }
    }
}

impl Default for EncodeSpec {
    fn default() -> Self {
        EncodeSpec::Jpeg {
            quality: JpegQuality::default(),
        }
    }
}
