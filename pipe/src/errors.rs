//! Error types for pipeline construction and execution.
//!
//! Every failure the tool can report is a [`PipeError`]. Each variant maps to
//! a fixed process exit code through [`PipeError::exit_code`], so the binary
//! never has to guess how to surface a failure.

use std::collections::HashMap;
use std::io;
use thiserror::Error;

/// Exit code for a missing program or malformed delimiter placement (`EINVAL`).
pub const EXIT_INVALID_ARGUMENTS: i32 = libc::EINVAL;

/// Exit code for pipelines longer than the configured ceiling (`E2BIG`).
pub const EXIT_TOO_MANY_STAGES: i32 = libc::E2BIG;

/// Exit code for descriptor or process table exhaustion (`EMFILE`).
pub const EXIT_RESOURCE_EXHAUSTED: i32 = libc::EMFILE;

/// Exit code for a program that could not be found, as shells report it.
pub const EXIT_NOT_FOUND: i32 = 127;

/// Exit code for a program that exists but could not be executed.
pub const EXIT_NOT_EXECUTABLE: i32 = 126;

/// The main error type for pipe operations.
#[derive(Debug, Error)]
pub enum PipeError {
    /// No stages were given, or a delimiter left an empty stage.
    #[error("invalid arguments: {reason}")]
    InvalidArguments {
        /// What was wrong with the argument vector.
        reason: String,
    },

    /// The argument vector describes more stages than allowed.
    #[error("too many stages: {count} given, at most {max} allowed")]
    TooManyStages {
        /// Number of stages found.
        count: usize,
        /// Configured ceiling.
        max: usize,
    },

    /// The OS refused to hand out a descriptor or a process slot.
    #[error("cannot {operation}: {source}")]
    ResourceExhausted {
        /// What was being allocated.
        operation: String,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },

    /// A stage's program could not be started.
    #[error("{program}: {source}")]
    LaunchFailed {
        /// Zero-based index of the stage.
        stage: usize,
        /// The program as given on the command line.
        program: String,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },
}

impl PipeError {
    /// Creates an invalid arguments error.
    #[must_use]
    pub fn invalid_arguments(reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            reason: reason.into(),
        }
    }

    /// Creates a too many stages error.
    #[must_use]
    pub fn too_many_stages(count: usize, max: usize) -> Self {
        Self::TooManyStages { count, max }
    }

    /// Creates a resource exhaustion error.
    #[must_use]
    pub fn resource_exhausted(operation: impl Into<String>, source: io::Error) -> Self {
        Self::ResourceExhausted {
            operation: operation.into(),
            source,
        }
    }

    /// Creates a launch failure error.
    #[must_use]
    pub fn launch_failed(stage: usize, program: impl Into<String>, source: io::Error) -> Self {
        Self::LaunchFailed {
            stage,
            program: program.into(),
            source,
        }
    }

    /// Classifies an error returned while spawning a stage.
    ///
    /// Table exhaustion becomes [`PipeError::ResourceExhausted`]; everything
    /// else (missing program, bad permissions, exec format) is a launch
    /// failure of that stage.
    #[must_use]
    pub fn from_spawn_error(stage: usize, program: impl Into<String>, source: io::Error) -> Self {
        let program = program.into();
        if is_exhaustion(&source) {
            Self::resource_exhausted(format!("spawn stage {} ({program})", stage + 1), source)
        } else {
            Self::launch_failed(stage, program, source)
        }
    }

    /// Returns the process exit code this error is reported with.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidArguments { .. } => EXIT_INVALID_ARGUMENTS,
            Self::TooManyStages { .. } => EXIT_TOO_MANY_STAGES,
            Self::ResourceExhausted { .. } => EXIT_RESOURCE_EXHAUSTED,
            Self::LaunchFailed { source, .. } => match source.kind() {
                io::ErrorKind::NotFound => EXIT_NOT_FOUND,
                _ => EXIT_NOT_EXECUTABLE,
            },
        }
    }

    /// Returns the stage index the error belongs to, if any.
    #[must_use]
    pub fn stage(&self) -> Option<usize> {
        match self {
            Self::LaunchFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Returns a short machine-readable name for the error kind.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::InvalidArguments { .. } => "invalid_arguments",
            Self::TooManyStages { .. } => "too_many_stages",
            Self::ResourceExhausted { .. } => "resource_exhausted",
            Self::LaunchFailed { .. } => "launch_failed",
        }
    }

    /// Converts to a dictionary representation for event payloads.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!(self.kind_name()));
        map.insert("exit_code".to_string(), serde_json::json!(self.exit_code()));
        if let Some(stage) = self.stage() {
            map.insert("stage".to_string(), serde_json::json!(stage));
        }
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

fn is_exhaustion(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::EAGAIN | libc::EMFILE | libc::ENFILE | libc::ENOMEM)
    )
}
