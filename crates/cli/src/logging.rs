//! Tracing subscriber setup.
//!
//! `RICHACL_LOG` takes an [`EnvFilter`] directive and overrides the level
//! chosen with `-v`.

use std::io;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding filter directives.
pub const LOG_ENV: &str = "RICHACL_LOG";

/// Default directive for a `-v` count.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "warn,richacl=debug",
        _ => "warn,richacl=trace",
    }
}

/// Installs the global subscriber writing to stderr.
///
/// Only the first call in a process takes effect; later calls keep the
/// subscriber already installed.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(true);
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init();
}
