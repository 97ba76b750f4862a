//! Diagnostic logging for the command-line front end.
//!
//! Library code only emits `tracing` events; the binary installs the subscriber.
//! Logs go to stderr so JSON output on stdout stays machine-readable.

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// Level used when neither `RUST_LOG` nor `-v` ask for more.
const DEFAULT_LOG_LEVEL: &str = "warn";

/// Maps `-v` repetitions (and `-q`) to a filter directive for this crate.
pub fn level_for(verbosity: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }

    match verbosity {
        0 => DEFAULT_LOG_LEVEL,
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn build_env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("podextract={level}")))
}

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if a global subscriber has already been installed.
pub fn init_logging(verbosity: u8, quiet: bool) -> Result<()> {
    fmt::fmt()
        .with_env_filter(build_env_filter(level_for(verbosity, quiet)))
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_mapping() {
        assert_eq!(level_for(0, false), "warn");
        assert_eq!(level_for(1, false), "info");
        assert_eq!(level_for(2, false), "debug");
        assert_eq!(level_for(7, false), "trace");
        assert_eq!(level_for(3, true), "error");
    }
}
