//! Tracing subscriber setup for the binary
//!
//! Logs go to stderr so that fetched payloads on stdout stay clean for piping.

use tracing_subscriber::EnvFilter;

/// Default filter directive for a given number of `-v` flags
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// Installs the global subscriber
///
/// `RUST_LOG` takes precedence over the verbosity flag. Calling this twice is
/// harmless; the second call is ignored.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
