//! `tracing` subscriber installation.
//!
//! Logs go to stderr only. They are off unless `PIPE_LOG` is set or `-v` is
//! given, so a stage's own stderr is not interleaved with ours by default.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding an `EnvFilter` directive string.
pub const LOG_ENV_VAR: &str = "PIPE_LOG";

/// Maps a `-v` count to a filter directive.
#[must_use]
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "off",
        1 => "pipe=info",
        2 => "pipe=debug",
        _ => "pipe=trace",
    }
}

/// Builds the filter: `PIPE_LOG` wins when set and valid, otherwise the
/// verbosity decides.
pub fn log_filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)))
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(verbosity: u8) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(log_filter(verbosity))
        .try_init()?;
    Ok(())
}
