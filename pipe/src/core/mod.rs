//! Core domain types shared by every layer: the invocation state machine
//! and per-stage exit statuses.

mod status;

pub use status::{PipelineState, StageExit, SIGNAL_EXIT_OFFSET};
