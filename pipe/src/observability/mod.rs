//! Logging setup for the `pipe` binary.

mod logging;

pub use logging::{default_directive, init_tracing, log_filter, LOG_ENV_VAR};
