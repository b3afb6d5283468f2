//! Pipeline construction and execution.
//!
//! A run moves through four steps:
//! - [`StageSplitter`](crate::stages::StageSplitter) turns arguments into stages
//! - [`allocate_channels`] creates one channel between each adjacent pair
//! - [`StageLauncher`] starts every stage with its streams wired up
//! - [`PipelineSupervisor`] reaps every started stage and aggregates exits
//!
//! [`Pipeline`] drives all four and tracks the state machine.

mod channels;
mod launcher;
mod result;
mod runner;
mod spawner;
mod state;
mod supervisor;


pub use channels::{allocate_channels, Channel};
pub use launcher::{LaunchOutcome, LaunchSlot, LaunchedStage, PipelineEndpoints, StageLauncher};
pub use result::{aggregate_exit_code, PipelineReport, PipelineResult, StageOutcome};
pub use runner::Pipeline;
pub use spawner::{
    ProcessSpawner, StageProcess, StageStdio, StreamKind, StreamSink, StreamSource, TokioProcess,
    TokioSpawner,
};
pub use state::StateTracker;
pub use supervisor::PipelineSupervisor;
