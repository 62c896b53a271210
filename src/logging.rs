//! Diagnostic logging to stderr.
//!
//! stdout may carry image bytes, so every event goes to stderr. `RUST_LOG`
//! wins when set; otherwise `--verbose` picks `debug` over `info`.
//!
//! Pipeline stages run in spans; verbose runs log each span's close with its
//! busy and idle time.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
};

fn default_level(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}

fn span_events(verbose: bool) -> FmtSpan {
    if verbose { FmtSpan::CLOSE } else { FmtSpan::NONE }
}

pub fn init(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbose)));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_timer(fmt::time::uptime())
        .with_span_events(span_events(verbose));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
}
