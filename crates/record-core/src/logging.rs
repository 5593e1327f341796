//! Process-wide `tracing` setup, shared by the ingest backend binary. A
//! library crate (`record-sdk`) must not install a global subscriber on
//! behalf of its host process, so this lives here and is only ever called
//! from a `main`.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

/// Install a `tracing-subscriber` formatter driven by `RUST_LOG` (defaulting
/// to `info`), matching the teacher's `telemetry` module: one formatter
/// installed once at process start, span close events included so request
/// handling duration is visible without per-call instrumentation.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}
