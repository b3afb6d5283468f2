//! # Pipe
//!
//! Chain external programs into a pipeline without a shell.
//!
//! `pipe` takes a flat argument vector, splits it into stages, connects each
//! stage's standard output to the next stage's standard input through an
//! anonymous channel, runs all stages concurrently and reaps every one of
//! them before reporting an exit code.
//!
//! - **Stage splitting**: explicit delimiter, inferred from `PATH`, or one
//!   stage per argument
//! - **Descriptor discipline**: each child holds only its own two channel
//!   ends; the parent holds none once spawning is over
//! - **Event-driven observability**: lifecycle events through [`events::EventSink`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pipe::prelude::*;
//!
//! let pipeline = Pipeline::new(PipelineConfig::default());
//! let result = pipeline.run(&args).await?;
//! std::process::exit(result.exit_code());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{ExitPolicy, PipelineConfig, SplitMode, StageLimit};
    pub use crate::core::{PipelineState, StageExit};
    pub use crate::errors::PipeError;
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{
        Pipeline, PipelineEndpoints, PipelineReport, PipelineResult, ProcessSpawner,
        StageOutcome, TokioSpawner,
    };
    pub use crate::stages::{CommandResolver, PathResolver, StageSpec};
}
