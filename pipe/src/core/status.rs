//! Pipeline state and stage exit enums.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::ExitStatus;

/// Offset added to a signal number when a stage is killed by that signal.
pub const SIGNAL_EXIT_OFFSET: i32 = 128;

/// The lifecycle state of one pipeline invocation.
///
/// The happy path is `Parsing -> Allocating -> Spawning -> Running ->
/// Reaping -> Done`. `Failed` is entered from any of the first four states;
/// when children were already spawned it still passes through `Reaping`
/// before settling in `Failed` again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Splitting the argument vector into stages.
    Parsing,
    /// Creating inter-stage channels.
    Allocating,
    /// Starting stage processes.
    Spawning,
    /// All stages started; the parent holds no channel ends.
    Running,
    /// Waiting for every started stage to terminate.
    Reaping,
    /// Every stage reaped, no failure recorded.
    Done,
    /// A validation, resource or launch failure was recorded.
    Failed,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::Parsing
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parsing => write!(f, "parsing"),
            Self::Allocating => write!(f, "allocating"),
            Self::Spawning => write!(f, "spawning"),
            Self::Running => write!(f, "running"),
            Self::Reaping => write!(f, "reaping"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl PipelineState {
    /// Returns true if the state ends the invocation.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if moving from `self` to `next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        use PipelineState::{Allocating, Done, Failed, Parsing, Reaping, Running, Spawning};

        matches!(
            (self, next),
            (Parsing, Allocating)
                | (Allocating, Spawning)
                | (Spawning, Running)
                | (Running, Reaping)
                | (Reaping, Done)
                | (Parsing | Allocating | Spawning | Running, Failed)
                | (Failed, Reaping)
                | (Reaping, Failed)
        )
    }
}

/// How a single stage ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum StageExit {
    /// The program exited normally with this code.
    Exited(i32),
    /// The program was terminated by this signal.
    Signaled(i32),
    /// The stage was never started.
    NotLaunched,
    /// Waiting on the stage failed, so its status is unknown.
    Lost,
}

impl StageExit {
    /// Returns the shell-style exit code for this stage, if it ran.
    ///
    /// Signals map to `128 + signal`. A lost status counts as a generic
    /// failure.
    #[must_use]
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(*code),
            Self::Signaled(signal) => Some(SIGNAL_EXIT_OFFSET + signal),
            Self::Lost => Some(1),
            Self::NotLaunched => None,
        }
    }

    /// Returns true if the stage ran and exited with code 0.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }
}

impl From<ExitStatus> for StageExit {
    fn from(status: ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;

        match (status.code(), status.signal()) {
            (Some(code), _) => Self::Exited(code),
            (None, Some(signal)) => Self::Signaled(signal),
            (None, None) => Self::Lost,
        }
    }
}

impl fmt::Display for StageExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exited with {code}"),
            Self::Signaled(signal) => write!(f, "killed by signal {signal}"),
            Self::NotLaunched => write!(f, "not launched"),
            Self::Lost => write!(f, "status lost"),
        }
    }
}
