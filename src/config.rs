//! Transform configuration.
//!
//! Every setting can come from four layers, later layers winning:
//!
//! ```text
//! stock defaults  <  --config FILE (TOML)  <  environment  <  command-line flags
//! ```
//!
//! Environment and flags are handled by clap (see `main.rs`) and arrive here
//! as a sparse [`ConfigOverrides`]. The TOML layer and the overrides are both
//! merged over [`stock_defaults_value`] with [`merge_toml`], then deserialized
//! into [`TransformConfig`].
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional except bucket and key - defaults shown below
//!
//! [resize]
//! max_width = 0                 # 0 = unset
//! max_height = 0                # 0 = unset
//! strategy = "bilinear"         # nearest-neighbor, bilinear, bicubic,
//!                               # mitchell-netravali, lanczos2, lanczos3
//!
//! [output]
//! format = "jpeg"               # jpeg or png
//! jpeg_quality = 70             # 0-100
//! png_compression = "default"   # none, best-speed, default, best-compression
//!
//! [source]
//! bucket = ""
//! key = ""
//! read_method = "authenticated" # authenticated, https, http
//! endpoint = "s3-us-west-2.amazonaws.com"
//! region = "us-west-2"
//! timeout_secs = 30
//! ```
//!
//! Unknown keys are rejected to catch typos early.
//!
//! A [`TransformConfig`] is still raw: strings and signed integers exactly as
//! given. [`TransformConfig::validate`] turns it into [`ValidatedParams`], the
//! only form the pipeline accepts. Validation never touches the network or
//! the image, so a bad parameter fails the run before any I/O.

use crate::fetch::{ObjectLocation, ReadMethod, SourceSettings};
use crate::imaging::{
    EncodeSpec, InterpolationStrategy, JpegQuality, OutputFormat, PngTier, ResizeSpec,
    UnknownStrategy,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("missing required parameter '{param}'")]
    Missing { param: &'static str },
    #[error("invalid value for '{param}': {reason}")]
    Invalid { param: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(param: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            param,
            reason: reason.into(),
        }
    }

    /// Name of the offending parameter, when the error is about one.
    pub fn param(&self) -> Option<&'static str> {
        match self {
            ConfigError::Missing { param } | ConfigError::Invalid { param, .. } => Some(*param),
            ConfigError::Io(_) | ConfigError::Toml(_) => None,
        }
    }
}

/// Raw transform configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformConfig {
    pub resize: ResizeConfig,
    pub output: OutputConfig,
    pub source: SourceConfig,
}

/// Resize bounds and kernel.
///
/// Bounds are signed so a negative value can be reported as such instead of
/// failing to parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResizeConfig {
    pub max_width: i64,
    pub max_height: i64,
    pub strategy: String,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            max_width: 0,
            max_height: 0,
            strategy: InterpolationStrategy::default().name().to_string(),
        }
    }
}

/// Output encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub format: String,
    pub jpeg_quality: i64,
    pub png_compression: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default().name().to_string(),
            jpeg_quality: i64::from(JpegQuality::default().value()),
            png_compression: PngTier::default().name().to_string(),
        }
    }
}

/// Where the source object lives and how to read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    pub bucket: String,
    pub key: String,
    pub read_method: String,
    pub endpoint: String,
    pub region: String,
    pub timeout_secs: i64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        let settings = SourceSettings::default();
        Self {
            bucket: String::new(),
            key: String::new(),
            read_method: ReadMethod::default().name().to_string(),
            endpoint: settings.endpoint,
            region: settings.region,
            timeout_secs: settings.timeout.as_secs() as i64,
        }
    }
}

/// Fully validated parameters for one pipeline run.
///
/// Only [`TransformConfig::validate`] constructs this.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedParams {
    location: ObjectLocation,
    read_method: ReadMethod,
    source: SourceSettings,
    resize: ResizeSpec,
    strategy: InterpolationStrategy,
    encode: EncodeSpec,
}

impl ValidatedParams {
    pub fn location(&self) -> &ObjectLocation {
        &self.location
    }

    pub fn read_method(&self) -> ReadMethod {
        self.read_method
    }

    pub fn source(&self) -> &SourceSettings {
        &self.source
    }

    pub fn resize(&self) -> ResizeSpec {
        self.resize
    }

    pub fn strategy(&self) -> InterpolationStrategy {
        self.strategy
    }

    pub fn encode(&self) -> EncodeSpec {
        self.encode
    }
}

fn required(value: &str, param: &'static str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Missing { param });
    }
    Ok(())
}

/// S3 keys are opaque, but a `.` or `..` segment gets resolved away by URL
/// parsing and would address another object.
fn plain_segments(value: &str, param: &'static str) -> Result<(), ConfigError> {
    match value.split('/').find(|seg| *seg == "." || *seg == "..") {
        Some(seg) => Err(ConfigError::invalid(
            param,
            format!("'{value}' has a '{seg}' path segment"),
        )),
        None => Ok(()),
    }
}

fn bound(value: i64, param: &'static str) -> Result<u32, ConfigError> {
    if value < 0 {
        return Err(ConfigError::invalid(param, format!("{value} is negative")));
    }
    u32::try_from(value).map_err(|_| ConfigError::invalid(param, format!("{value} is too large")))
}

impl TransformConfig {
    /// Check every parameter and build the typed run parameters.
    ///
    /// Errors name the parameter by its flag name (`max-width`, `format`, ...).
    pub fn validate(&self) -> Result<ValidatedParams, ConfigError> {
        let source = &self.source;
        required(&source.bucket, "s3-bucket")?;
        required(&source.key, "s3-key")?;
        plain_segments(&source.bucket, "s3-bucket")?;
        plain_segments(&source.key, "s3-key")?;
        let read_method: ReadMethod = source
            .read_method
            .parse()
            .map_err(|e: String| ConfigError::invalid("s3-read-method", e))?;
        required(&source.endpoint, "s3-endpoint")?;
        if read_method == ReadMethod::Authenticated {
            required(&source.region, "s3-region")?;
        }
        if source.timeout_secs <= 0 {
            return Err(ConfigError::invalid(
                "timeout-secs",
                format!("{} is not a positive number of seconds", source.timeout_secs),
            ));
        }

        let resize = ResizeSpec::new(
            bound(self.resize.max_width, "max-width")?,
            bound(self.resize.max_height, "max-height")?,
        );
        let strategy: InterpolationStrategy = self
            .resize
            .strategy
            .parse()
            .map_err(|e: UnknownStrategy| ConfigError::invalid("resize-strategy", e.to_string()))?;

        let output = &self.output;
        let format: OutputFormat = output
            .format
            .parse()
            .map_err(|e: String| ConfigError::invalid("format", e))?;
        let encode = match format {
            OutputFormat::Jpeg => {
                let quality = JpegQuality::new(output.jpeg_quality).ok_or_else(|| {
                    ConfigError::invalid(
                        "jpeg-compression",
                        format!("{} is outside 0-{}", output.jpeg_quality, JpegQuality::MAX),
                    )
                })?;
                EncodeSpec::Jpeg { quality }
            }
            OutputFormat::Png => {
                if !PngTier::is_known(&output.png_compression) {
                    debug!(
                        tier = %output.png_compression,
                        "Unknown PNG compression tier, using default"
                    );
                }
                EncodeSpec::Png {
                    tier: PngTier::from_name(&output.png_compression),
                }
            }
        };

        Ok(ValidatedParams {
            location: ObjectLocation::new(source.bucket.clone(), source.key.clone()),
            read_method,
            source: SourceSettings {
                endpoint: source.endpoint.clone(),
                region: source.region.clone(),
                timeout: Duration::from_secs(source.timeout_secs as u64),
            },
            resize,
            strategy,
            encode,
        })
    }
}

/// Values set on the command line or in the environment.
///
/// `None` means "not given": the lower layers keep their value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub max_width: Option<i64>,
    pub max_height: Option<i64>,
    pub strategy: Option<String>,
    pub format: Option<String>,
    pub jpeg_quality: Option<i64>,
    pub png_compression: Option<String>,
    pub bucket: Option<String>,
    pub key: Option<String>,
    pub read_method: Option<String>,
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub timeout_secs: Option<i64>,
}

impl ConfigOverrides {
    /// Sparse TOML table holding only the values that were given.
    pub fn to_value(&self) -> toml::Value {
        let mut root = toml::Table::new();
        let mut set = |section: &str, key: &str, value: Option<toml::Value>| {
            let Some(value) = value else { return };
            if let Some(table) = root
                .entry(section)
                .or_insert_with(|| toml::Value::Table(toml::Table::new()))
                .as_table_mut()
            {
                table.insert(key.to_string(), value);
            }
        };
        let int = |v: Option<i64>| v.map(toml::Value::Integer);
        let text = |v: &Option<String>| v.clone().map(toml::Value::String);

        set("resize", "max_width", int(self.max_width));
        set("resize", "max_height", int(self.max_height));
        set("resize", "strategy", text(&self.strategy));
        set("output", "format", text(&self.format));
        set("output", "jpeg_quality", int(self.jpeg_quality));
        set("output", "png_compression", text(&self.png_compression));
        set("source", "bucket", text(&self.bucket));
        set("source", "key", text(&self.key));
        set("source", "read_method", text(&self.read_method));
        set("source", "endpoint", text(&self.endpoint));
        set("source", "region", text(&self.region));
        set("source", "timeout_secs", int(self.timeout_secs));
        toml::Value::Table(root)
    }
}

// =============================================================================
// Config loading and merging
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer every other layer is merged on top of.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(TransformConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a TOML config file as a raw value.
///
/// Unlike the defaults, an explicitly named file must exist.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge `layers` in order over the stock defaults and deserialize.
///
/// Unknown keys in any layer are rejected here; value checks happen in
/// [`TransformConfig::validate`].
pub fn resolve_config(
    layers: impl IntoIterator<Item = toml::Value>,
) -> Result<TransformConfig, ConfigError> {
    let merged = layers
        .into_iter()
        .fold(stock_defaults_value(), merge_toml);
    Ok(merged.try_into()?)
}

/// Build the effective config: defaults, then the optional file, then overrides.
pub fn load_config(
    path: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<TransformConfig, ConfigError> {
    let mut layers = Vec::with_capacity(2);
    if let Some(path) = path {
        debug!(path = %path.display(), "Loading config file");
        layers.push(load_raw_config(path)?);
    }
    layers.push(overrides.to_value());
    resolve_config(layers)
}

/// Returns a fully-commented stock config file with all keys and explanations.
///
/// Used by `--gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# resizer configuration
# =====================
# Pass with --config FILE (or RESIZER_CONFIG=FILE).
# Values shown below are the defaults. Environment variables and
# command-line flags override anything set here.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Resize
# ---------------------------------------------------------------------------
[resize]
# Bounds in pixels. 0 leaves the dimension unset.
#   both 0        -> keep the original size
#   one set       -> that dimension becomes exactly the bound, aspect kept
#   both set      -> fit inside the box, aspect kept
max_width = 0
max_height = 0

# Interpolation kernel: nearest-neighbor, bilinear, bicubic,
# mitchell-netravali, lanczos2, lanczos3.
strategy = "bilinear"

# ---------------------------------------------------------------------------
# Output encoding
# ---------------------------------------------------------------------------
[output]
# jpeg or png.
format = "jpeg"

# JPEG quality (0 = smallest, 100 = best). Only checked when format = "jpeg".
jpeg_quality = 70

# PNG compression: none, best-speed, default, best-compression.
# Unrecognized names fall back to default.
png_compression = "default"

# ---------------------------------------------------------------------------
# Source object
# ---------------------------------------------------------------------------
[source]
# Both required (here, via S3_BUCKET / S3_KEY, or via flags).
bucket = ""
key = ""

# authenticated (SigV4, credentials from AWS_ACCESS_KEY_ID /
# AWS_SECRET_ACCESS_KEY / AWS_SESSION_TOKEN), https, or http.
read_method = "authenticated"

# Host serving path-style URLs: {scheme}://{endpoint}/{bucket}/{key}
endpoint = "s3-us-west-2.amazonaws.com"

# Region used when signing authenticated requests.
region = "us-west-2"

# Whole-request timeout in seconds.
timeout_secs = 30
"##
}
