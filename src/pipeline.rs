//! The transform pipeline.
//!
//! ```text
//! Validate → Fetch → Decode → Resize → Encode → Flush
//! ```
//!
//! Each stage either hands its output to the next or ends the run with a
//! [`PipelineError`] tagged by the [`Stage`] that failed. There are no
//! retries and no partial success. Each stage runs inside a `tracing` span
//! named after it, so `-v` logs how long every stage took.
//!
//! [`Pipeline`] is generic over the [`ImageBackend`] and takes the byte
//! source and output sink as trait objects, so tests can drive it with a
//! recording backend, an in-memory source, and a `Vec<u8>` sink.

use crate::config::{ConfigError, TransformConfig, ValidatedParams};
use crate::fetch::{FetchError, ImageSource, source_for};
use crate::imaging::{BackendError, ImageBackend, RustBackend};
use crate::sink::Sink;
use std::fmt;
use std::io::{self, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, info_span};

/// Pipeline stage that can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validate,
    Fetch,
    Decode,
    Resize,
    Encode,
    Write,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Validate => "validate",
            Stage::Fetch => "fetch",
            Stage::Decode => "decode",
            Stage::Resize => "resize",
            Stage::Encode => "encode",
            Stage::Write => "write",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("validate: {0}")]
    Config(#[from] ConfigError),
    #[error("fetch: {0}")]
    Fetch(#[from] FetchError),
    #[error("decode: {0}")]
    Decode(#[source] BackendError),
    #[error("resize: {0}")]
    Resize(#[source] BackendError),
    #[error("encode: {0}")]
    Encode(#[source] BackendError),
    #[error("write: {0}")]
    Write(#[from] io::Error),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Config(_) => Stage::Validate,
            PipelineError::Fetch(_) => Stage::Fetch,
            PipelineError::Decode(_) => Stage::Decode,
            PipelineError::Resize(_) => Stage::Resize,
            PipelineError::Encode(_) => Stage::Encode,
            PipelineError::Write(_) => Stage::Write,
        }
    }

    /// Process exit status: 2 for bad configuration, 1 for anything else.
    pub fn exit_code(&self) -> u8 {
        match self.stage() {
            Stage::Validate => 2,
            _ => 1,
        }
    }
}

pub struct Pipeline<B: ImageBackend> {
    backend: B,
}

impl<B: ImageBackend> Pipeline<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Fetch, decode, resize, and encode one image into `sink`, then flush it.
    pub fn run(
        &self,
        source: &dyn ImageSource,
        params: &ValidatedParams,
        sink: &mut dyn Write,
    ) -> Result<(), PipelineError> {
        let location = params.location();
        let bytes = {
            let _span = info_span!("fetch").entered();
            debug!(%location, method = %params.read_method(), "Fetching");
            source.fetch(location)?
        };

        let decoded = {
            let _span = info_span!("decode").entered();
            let decoded = self.backend.decode(&bytes).map_err(PipelineError::Decode)?;
            drop(bytes);
            debug!(
                format = ?decoded.format,
                width = decoded.image.width(),
                height = decoded.image.height(),
                "Source image"
            );
            decoded
        };

        let resized = {
            let _span = info_span!("resize").entered();
            self.backend
                .resize(decoded.image, params.resize(), params.strategy())
                .map_err(PipelineError::Resize)?
        };

        {
            let _span = info_span!("encode").entered();
            self.backend
                .encode(&resized, params.encode(), sink)
                .map_err(PipelineError::Encode)?;
            info!("Finished encoding image");
        }

        let _span = info_span!("write").entered();
        sink.flush()?;
        Ok(())
    }

    /// Validate `config`, then [`run`](Self::run). Nothing is fetched when
    /// validation fails.
    pub fn run_config(
        &self,
        config: &TransformConfig,
        source: &dyn ImageSource,
        sink: &mut dyn Write,
    ) -> Result<(), PipelineError> {
        let params = config.validate()?;
        self.run(source, &params, sink)
    }
}

/// One complete invocation with the production backend.
///
/// Validates, picks the source for the configured read method, runs the
/// pipeline into stdout (or an atomically written file), and commits the
/// output only if every stage succeeded.
pub fn transform(config: &TransformConfig, output: Option<&Path>) -> Result<(), PipelineError> {
    let params = config.validate()?;
    let source = source_for(params.read_method(), params.source())?;
    let mut sink = match output {
        Some(path) => Sink::file(path)?,
        None => Sink::stdout(),
    };
    Pipeline::new(RustBackend::new()).run(source.as_ref(), &params, &mut sink)?;
    sink.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::ObjectLocation;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::imaging::{EncodeSpec, InterpolationStrategy, PngTier, ResizeSpec};
    use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::format::FmtSpan;

    /// In-memory source that records what was asked for.
    struct FakeSource {
        bytes: Option<Vec<u8>>,
        requests: RefCell<Vec<ObjectLocation>>,
    }

    impl FakeSource {
        fn serving(bytes: Vec<u8>) -> Self {
            Self {
                bytes: Some(bytes),
                requests: RefCell::new(Vec::new()),
            }
        }

        fn not_found() -> Self {
            Self {
                bytes: None,
                requests: RefCell::new(Vec::new()),
            }
        }

        fn request_count(&self) -> usize {
            self.requests.borrow().len()
        }
    }

    impl ImageSource for FakeSource {
        fn fetch(&self, location: &ObjectLocation) -> Result<Vec<u8>, FetchError> {
            self.requests.borrow_mut().push(location.clone());
            self.bytes.clone().ok_or_else(|| FetchError::Status {
                status: reqwest::StatusCode::NOT_FOUND,
                url: location.to_string(),
            })
        }
    }

    /// Accepts writes, fails to flush.
    #[derive(Default)]
    struct BrokenFlush {
        written: Vec<u8>,
        flushes: usize,
    }

    impl Write for BrokenFlush {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flushes += 1;
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    fn config() -> TransformConfig {
        let mut config = TransformConfig::default();
        config.source.bucket = "bucket".to_string();
        config.source.key = "image.png".to_string();
        config.source.read_method = "http".to_string();
        config
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 90])
        });
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn stages_run_in_order() {
        let backend = MockBackend::with_dimensions(1000, 500);
        let pipeline = Pipeline::new(backend);
        let source = FakeSource::serving(vec![0; 16]);
        let mut config = config();
        config.resize.max_width = 500;
        config.resize.strategy = "lanczos2".to_string();
        let mut sink = Vec::new();

        pipeline.run_config(&config, &source, &mut sink).unwrap();

        assert_eq!(
            source.requests.borrow().as_slice(),
            [ObjectLocation::new("bucket", "image.png")]
        );
        assert_eq!(
            pipeline.backend().get_operations(),
            vec![
                RecordedOp::Decode { len: 16 },
                RecordedOp::Resize {
                    width: 1000,
                    height: 500,
                    spec: ResizeSpec::new(500, 0),
                    strategy: InterpolationStrategy::Lanczos2,
                },
                RecordedOp::Encode {
                    width: 500,
                    height: 250,
                    spec: EncodeSpec::default(),
                },
            ]
        );
        assert_eq!(sink, b"MOCK");
    }

    #[test]
    fn invalid_config_fails_before_fetch() {
        let pipeline = Pipeline::new(MockBackend::with_dimensions(10, 10));
        let source = FakeSource::serving(vec![1, 2, 3]);
        let mut sink = Vec::new();

        let cases: [(fn(&mut TransformConfig), &str); 7] = [
            (|c| c.resize.strategy = "cubic".into(), "resize-strategy"),
            (|c| c.output.jpeg_quality = 101, "jpeg-compression"),
            (|c| c.output.jpeg_quality = -1, "jpeg-compression"),
            (|c| c.output.format = "webp".into(), "format"),
            (|c| c.resize.max_height = -5, "max-height"),
            (|c| c.source.key.clear(), "s3-key"),
            (|c| c.source.key = "a/../secret.jpg".into(), "s3-key"),
        ];
        for (tweak, param) in cases {
            let mut config = config();
            tweak(&mut config);
            let err = pipeline.run_config(&config, &source, &mut sink).unwrap_err();
            assert_eq!(err.stage(), Stage::Validate);
            match err {
                PipelineError::Config(e) => assert_eq!(e.param(), Some(param)),
                other => panic!("expected config error, got {other:?}"),
            }
        }

        assert_eq!(source.request_count(), 0);
        assert!(pipeline.backend().get_operations().is_empty());
        assert!(sink.is_empty());
    }

    #[test]
    fn fetch_failure_stops_before_decode() {
        let pipeline = Pipeline::new(MockBackend::with_dimensions(10, 10));
        let source = FakeSource::not_found();
        let mut sink = Vec::new();

        let err = pipeline.run_config(&config(), &source, &mut sink).unwrap_err();
        assert_eq!(err.stage(), Stage::Fetch);
        assert!(pipeline.backend().get_operations().is_empty());
        assert!(sink.is_empty());
    }

    #[test]
    fn decode_failure_is_terminal() {
        let pipeline = Pipeline::new(MockBackend::failing_decode());
        let source = FakeSource::serving(b"not an image".to_vec());
        let mut sink = Vec::new();

        let err = pipeline.run_config(&config(), &source, &mut sink).unwrap_err();
        assert_eq!(err.stage(), Stage::Decode);
        assert_eq!(
            pipeline.backend().get_operations(),
            vec![RecordedOp::Decode { len: 12 }]
        );
        assert!(sink.is_empty());
    }

    #[test]
    fn encode_failure_is_terminal() {
        let pipeline = Pipeline::new(MockBackend::failing_encode(4, 4));
        let source = FakeSource::serving(vec![0; 4]);
        let mut sink = Vec::new();

        let err = pipeline.run_config(&config(), &source, &mut sink).unwrap_err();
        assert_eq!(err.stage(), Stage::Encode);
        assert!(sink.is_empty());
    }

    #[test]
    fn oversized_target_is_resize_error() {
        let pipeline = Pipeline::new(MockBackend::with_dimensions(1, 1000));
        let source = FakeSource::serving(vec![0; 4]);
        let mut config = config();
        config.resize.max_width = 100_000;
        let mut sink = Vec::new();

        let err = pipeline.run_config(&config, &source, &mut sink).unwrap_err();
        assert_eq!(err.stage(), Stage::Resize);
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().starts_with("resize: "));
        assert!(!pipeline
            .backend()
            .get_operations()
            .iter()
            .any(|op| matches!(op, RecordedOp::Encode { .. })));
        assert!(sink.is_empty());
    }

    #[test]
    fn flush_failure_is_write_stage() {
        let pipeline = Pipeline::new(MockBackend::with_dimensions(4, 4));
        let source = FakeSource::serving(vec![0; 4]);
        let mut sink = BrokenFlush::default();

        let err = pipeline.run_config(&config(), &source, &mut sink).unwrap_err();
        assert_eq!(err.stage(), Stage::Write);
        assert_eq!(sink.flushes, 1);
        assert_eq!(sink.written, b"MOCK");
    }

    #[test]
    fn error_display_and_exit_code() {
        let err = PipelineError::from(FetchError::MissingCredentials("AWS_ACCESS_KEY_ID"));
        assert_eq!(
            err.to_string(),
            "fetch: missing credentials: AWS_ACCESS_KEY_ID is not set"
        );
        assert_eq!(err.exit_code(), 1);

        let err = PipelineError::from(ConfigError::Missing { param: "s3-bucket" });
        assert!(err.to_string().starts_with("validate: "));
        assert_eq!(err.exit_code(), 2);

        let err = PipelineError::Decode(BackendError::Decode("bad".into()));
        assert_eq!(err.stage().to_string(), "decode");
        assert_eq!(err.exit_code(), 1);
    }

    // =========================================================================
    // End to end with the real backend
    // =========================================================================

    fn run_real(source_dims: (u32, u32), bounds: (i64, i64)) -> (u32, u32) {
        let pipeline = Pipeline::new(RustBackend::new());
        let source = FakeSource::serving(png_bytes(source_dims.0, source_dims.1));
        let mut config = config();
        config.resize.max_width = bounds.0;
        config.resize.max_height = bounds.1;
        config.output.format = "png".to_string();
        config.output.png_compression = "best-speed".to_string();
        let mut sink = Vec::new();

        pipeline.run_config(&config, &source, &mut sink).unwrap();

        let out = image::load_from_memory_with_format(&sink, ImageFormat::Png).unwrap();
        out.dimensions()
    }

    #[test]
    fn no_bounds_keeps_size() {
        assert_eq!(run_real((1000, 500), (0, 0)), (1000, 500));
    }

    #[test]
    fn width_bound_scales_proportionally() {
        assert_eq!(run_real((1000, 500), (500, 0)), (500, 250));
    }

    #[test]
    fn box_fit_landscape() {
        assert_eq!(run_real((1000, 500), (300, 300)), (300, 150));
    }

    #[test]
    fn box_fit_portrait() {
        assert_eq!(run_real((500, 1000), (300, 300)), (150, 300));
    }

    #[test]
    fn png_none_keeps_pixels() {
        let original = png_bytes(37, 23);
        let pipeline = Pipeline::new(RustBackend::new());
        let source = FakeSource::serving(original.clone());
        let mut config = config();
        config.output.format = "png".to_string();
        config.output.png_compression = "none".to_string();
        let params = config.validate().unwrap();
        assert_eq!(
            params.encode(),
            EncodeSpec::Png {
                tier: PngTier::None
            }
        );
        let mut sink = Vec::new();

        pipeline.run(&source, &params, &mut sink).unwrap();

        let expected = image::load_from_memory(&original).unwrap().to_rgb8();
        let actual = image::load_from_memory(&sink).unwrap().to_rgb8();
        assert_eq!(actual, expected);
    }

    #[test]
    fn jpeg_output_at_quality_extremes() {
        for quality in [0, 100] {
            let pipeline = Pipeline::new(RustBackend::new());
            let source = FakeSource::serving(png_bytes(64, 48));
            let mut config = config();
            config.resize.max_width = 32;
            config.output.jpeg_quality = quality;
            let mut sink = Vec::new();

            pipeline.run_config(&config, &source, &mut sink).unwrap();

            assert_eq!(&sink[..2], &[0xFF, 0xD8]);
            let out = image::load_from_memory_with_format(&sink, ImageFormat::Jpeg).unwrap();
            assert_eq!(out.dimensions(), (32, 24));
        }
    }

    #[test]
    fn runaway_upscale_fails_without_allocating() {
        let pipeline = Pipeline::new(RustBackend::new());
        let source = FakeSource::serving(png_bytes(1, 1000));
        let mut config = config();
        config.resize.max_width = 100_000;
        let mut sink = Vec::new();

        let err = pipeline.run_config(&config, &source, &mut sink).unwrap_err();
        assert_eq!(err.stage(), Stage::Resize);
        assert!(matches!(
            err,
            PipelineError::Resize(BackendError::TooLarge {
                width: 100_000,
                height: 100_000_000,
                ..
            })
        ));
        assert!(sink.is_empty());
    }

    /// Shared log buffer for a scoped subscriber.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn every_stage_closes_a_span() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_span_events(FmtSpan::CLOSE)
            .finish();
        let pipeline = Pipeline::new(MockBackend::with_dimensions(40, 20));
        let source = FakeSource::serving(vec![0; 4]);
        let mut config = config();
        config.resize.max_width = 10;
        let mut sink = Vec::new();

        tracing::subscriber::with_default(subscriber, || {
            pipeline.run_config(&config, &source, &mut sink)
        })
        .unwrap();

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        for stage in ["fetch", "decode", "resize", "encode", "write"] {
            assert!(
                logs.lines()
                    .any(|l| l.contains(&format!(" {stage}: ")) && l.contains("close")),
                "no closed {stage} span in:\n{logs}"
            );
        }
    }

    #[test]
    fn corrupt_source_is_decode_error() {
        let pipeline = Pipeline::new(RustBackend::new());
        let mut bytes = png_bytes(8, 8);
        bytes.truncate(20);
        let source = FakeSource::serving(bytes);
        let mut sink = Vec::new();

        let err = pipeline.run_config(&config(), &source, &mut sink).unwrap_err();
        assert_eq!(err.stage(), Stage::Decode);
        assert!(sink.is_empty());
    }
}
