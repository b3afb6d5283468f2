//! Lifecycle events for observability.
//!
//! Event types emitted by a pipeline run:
//!
//! | Type | Payload |
//! |------|---------|
//! | `pipeline.state` | `from`, `to` |
//! | `stage.spawned` | `stage`, `program`, `pid`, `stdin`, `stdout` |
//! | `stage.launch_failed` | `stage`, `program`, error fields |
//! | `stage.exited` | `stage`, `program`, `pid`, `exit` |
//! | `pipeline.completed` | `run_id`, `exit_code`, `failures` |

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// A state machine transition.
pub const PIPELINE_STATE: &str = "pipeline.state";
/// A stage process was started.
pub const STAGE_SPAWNED: &str = "stage.spawned";
/// A stage process could not be started.
pub const STAGE_LAUNCH_FAILED: &str = "stage.launch_failed";
/// A stage process was reaped.
pub const STAGE_EXITED: &str = "stage.exited";
/// Every stage was reaped.
pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
