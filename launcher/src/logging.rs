//! Tracing setup for launcher diagnostics.
//!
//! Step output is never captured: children inherit stdout/stderr. Tracing is
//! the launcher's own voice (stage transitions, swallowed failures) and goes
//! to stderr so it interleaves with the steps' output.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "warn,launcher=info";

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `info` for the launcher and `warn` for
/// everything else.
///
/// # Example
/// ```bash
/// RUST_LOG=launcher=debug auto-updating-validator mykey
/// ```
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
