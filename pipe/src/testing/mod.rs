//! Testing utilities for pipelines.
//!
//! [`RecordingSpawner`] stands in for the OS so launch and reap logic can be
//! exercised without starting processes. The assertions work on reports
//! and collected events from real or fake runs.

mod assertions;
mod mocks;

pub use assertions::{
    assert_all_reaped, assert_all_succeeded, assert_stage_exit, assert_state_history,
    recorded_states,
};
pub use mocks::{FakeProcess, RecordingSpawner, SpawnRecord};
