//! Interpolation strategies for resampling.
//!
//! The set is closed: six named kernels, matched case-sensitively. A name is
//! resolved once during config validation and the resulting enum value is
//! carried through the pipeline, so an unknown name never gets as far as a
//! network request.
//!
//! | Name | `fast_image_resize` algorithm | Support |
//! |---|---|---|
//! | `nearest-neighbor` | `ResizeAlg::Nearest` | — |
//! | `bilinear` | `FilterType::Bilinear` | 1 |
//! | `bicubic` | `FilterType::CatmullRom` | 2 |
//! | `mitchell-netravali` | `FilterType::Mitchell` | 2 |
//! | `lanczos2` | custom windowed sinc | 2 |
//! | `lanczos3` | `FilterType::Lanczos3` | 3 |

use fast_image_resize::{CreateFilterError, Filter, FilterType, ResizeAlg};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InterpolationStrategy {
    NearestNeighbor,
    #[default]
    Bilinear,
    Bicubic,
    MitchellNetravali,
    Lanczos2,
    Lanczos3,
}

/// Returned by [`lookup`] for names outside the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStrategy(pub String);

impl fmt::Display for UnknownStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown strategy '{}' (expected one of: {})",
            self.0,
            InterpolationStrategy::NAMES.join(", ")
        )
    }
}

impl std::error::Error for UnknownStrategy {}

impl InterpolationStrategy {
    pub const ALL: [InterpolationStrategy; 6] = [
        Self::NearestNeighbor,
        Self::Bilinear,
        Self::Bicubic,
        Self::MitchellNetravali,
        Self::Lanczos2,
        Self::Lanczos3,
    ];

    pub const NAMES: [&'static str; 6] = [
        "nearest-neighbor",
        "bilinear",
        "bicubic",
        "mitchell-netravali",
        "lanczos2",
        "lanczos3",
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::NearestNeighbor => "nearest-neighbor",
            Self::Bilinear => "bilinear",
            Self::Bicubic => "bicubic",
            Self::MitchellNetravali => "mitchell-netravali",
            Self::Lanczos2 => "lanczos2",
            Self::Lanczos3 => "lanczos3",
        }
    }

    /// The resampling algorithm this strategy runs.
    pub fn resize_alg(self) -> Result<ResizeAlg, CreateFilterError> {
        let filter = match self {
            Self::NearestNeighbor => return Ok(ResizeAlg::Nearest),
            Self::Bilinear => FilterType::Bilinear,
            Self::Bicubic => FilterType::CatmullRom,
            Self::MitchellNetravali => FilterType::Mitchell,
            Self::Lanczos2 => FilterType::Custom(Filter::new("Lanczos2", lanczos2, 2.0)?),
            Self::Lanczos3 => FilterType::Lanczos3,
        };
        Ok(ResizeAlg::Convolution(filter))
    }
}

/// Resolve a strategy by its exact name.
pub fn lookup(name: &str) -> Result<InterpolationStrategy, UnknownStrategy> {
    InterpolationStrategy::ALL
        .into_iter()
        .find(|s| s.name() == name)
        .ok_or_else(|| UnknownStrategy(name.to_string()))
}

impl FromStr for InterpolationStrategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup(s)
    }
}

impl fmt::Display for InterpolationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        let px = PI * x;
        px.sin() / px
    }
}

/// Two-lobe Lanczos window; `fast_image_resize` only ships the three-lobe one.
fn lanczos2(x: f64) -> f64 {
    if x.abs() < 2.0 {
        sinc(x) * sinc(x / 2.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_accepts_every_canonical_name() {
        for (name, expected) in InterpolationStrategy::NAMES
            .iter()
            .zip(InterpolationStrategy::ALL)
        {
            assert_eq!(lookup(name).unwrap(), expected);
            assert_eq!(expected.name(), *name);
        }
    }

    #[test]
    fn lookup_is_case_sensitive() {
        assert!(lookup("Bilinear").is_err());
        assert!(lookup("LANCZOS3").is_err());
    }

    #[test]
    fn lookup_rejects_unknown_and_near_misses() {
        for name in ["", "lanczos", "lanczos4", "cubic", "nearest", " bilinear", "bilinear "] {
            let err = lookup(name).unwrap_err();
            assert_eq!(err.0, name);
        }
    }

    #[test]
    fn unknown_strategy_message_lists_choices() {
        let msg = lookup("box").unwrap_err().to_string();
        assert!(msg.contains("'box'"));
        assert!(msg.contains("mitchell-netravali"));
    }

    #[test]
    fn from_str_matches_lookup() {
        let s: InterpolationStrategy = "lanczos2".parse().unwrap();
        assert_eq!(s, InterpolationStrategy::Lanczos2);
    }

    #[test]
    fn default_is_bilinear() {
        assert_eq!(InterpolationStrategy::default(), InterpolationStrategy::Bilinear);
    }

    #[test]
    fn strategies_map_to_resize_algorithms() {
        let expected = [
            ResizeAlg::Nearest,
            ResizeAlg::Convolution(FilterType::Bilinear),
            ResizeAlg::Convolution(FilterType::CatmullRom),
            ResizeAlg::Convolution(FilterType::Mitchell),
        ];
        for (strategy, alg) in InterpolationStrategy::ALL.into_iter().zip(expected) {
            assert_eq!(strategy.resize_alg().unwrap(), alg, "{strategy}");
        }
        assert_eq!(
            InterpolationStrategy::Lanczos3.resize_alg().unwrap(),
            ResizeAlg::Convolution(FilterType::Lanczos3)
        );
    }

    #[test]
    fn lanczos2_is_a_two_lobe_custom_filter() {
        let ResizeAlg::Convolution(FilterType::Custom(filter)) =
            InterpolationStrategy::Lanczos2.resize_alg().unwrap()
        else {
            panic!("lanczos2 should be a custom convolution");
        };
        assert_eq!(filter, Filter::new("Lanczos2", lanczos2, 2.0).unwrap());
    }

    #[test]
    fn every_strategy_yields_a_distinct_algorithm() {
        let algs: Vec<_> = InterpolationStrategy::ALL
            .into_iter()
            .map(|s| s.resize_alg().unwrap())
            .collect();
        for (i, a) in algs.iter().enumerate() {
            for b in &algs[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn lanczos2_kernel_shape() {
        assert!((lanczos2(0.0) - 1.0).abs() < 1e-12);
        assert!(lanczos2(1.0).abs() < 1e-12);
        assert_eq!(lanczos2(2.0), 0.0);
        assert_eq!(lanczos2(2.5), 0.0);
        // negative lobe between 1 and 2
        assert!(lanczos2(1.5) < 0.0);
        for step in 0..20 {
            let x = step as f64 / 10.0;
            assert!((lanczos2(x) - lanczos2(-x)).abs() < 1e-12, "asymmetric at {x}");
        }
    }
}
