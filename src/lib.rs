//! # resizer
//!
//! Fetch one image from an S3 bucket (or a plain HTTP mirror of one), resize
//! it under an aspect-preserving policy, re-encode it as JPEG or PNG, and
//! write the result to stdout or a file.
//!
//! # Architecture: One Image, Six Stages
//!
//! ```text
//! Validate   config          →  ValidatedParams   (no I/O)
//! Fetch      bucket/key      →  bytes             (authenticated S3, https, http)
//! Decode     bytes           →  raster            (format sniffed from content)
//! Resize     raster          →  raster            (pass-through, scale, or fit)
//! Encode     raster          →  sink              (jpeg quality / png tier)
//! Flush      sink            →  stdout or file    (file output is atomic)
//! ```
//!
//! Every parameter is checked before the first byte is fetched, so a typo in
//! a strategy name or an out-of-range quality costs nothing. Every later
//! failure ends the run with an error tagged by its stage; there are no
//! retries.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | Layered settings (defaults, TOML file, env, flags) and validation |
//! | [`fetch`] | Byte sources: SigV4-signed S3 GET and anonymous HTTP(S) GET |
//! | [`imaging`] | Decode, resize policy, interpolation kernels, JPEG/PNG encoding |
//! | [`pipeline`] | Stage orchestration and the stage-tagged [`pipeline::PipelineError`] |
//! | [`sink`] | Buffered stdout or atomically committed file output |
//! | [`logging`] | `tracing` subscriber on stderr |
//!
//! # Design Decisions
//!
//! ## Resize Policy
//!
//! `max_width` and `max_height` are both optional (`0` = unset). One bound
//! scales the image so that dimension matches exactly; two bounds fit the
//! image inside the box. Either way the aspect ratio is kept, and upscaling
//! is allowed. The math lives in [`imaging::plan_resize`] and uses integer
//! arithmetic throughout, so the same inputs always give the same pixels.
//!
//! ## Strict JPEG, Lenient PNG
//!
//! A JPEG quality outside 0-100 is a configuration error. An unknown PNG
//! compression tier quietly means `default`. Existing callers rely on both.
//!
//! ## Stdout Is for Image Bytes
//!
//! Logs go to stderr. With `--output`, the image is staged in a temp file
//! beside the target and renamed into place only after a successful encode.

pub mod config;
pub mod fetch;
pub mod imaging;
pub mod logging;
pub mod pipeline;
pub mod sink;
