//! Configuration for pipeline construction and result aggregation.

use crate::errors::PipeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default token separating two stages on the command line.
pub const DEFAULT_DELIMITER: &str = "|";

/// Default ceiling on the number of stages.
pub const DEFAULT_MAX_STAGES: usize = 8;

/// How the argument vector is cut into stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SplitMode {
    /// `Delimited` when the delimiter is present, `Inferred` otherwise.
    Auto,
    /// Stages are separated by the delimiter token only.
    Delimited,
    /// A token naming a command on `PATH` starts a new stage.
    Inferred,
    /// Every argument is a whole stage, split into words.
    PerArgument,
}

impl Default for SplitMode {
    fn default() -> Self {
        Self::Auto
    }
}

impl fmt::Display for SplitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Delimited => write!(f, "delimited"),
            Self::Inferred => write!(f, "inferred"),
            Self::PerArgument => write!(f, "per-argument"),
        }
    }
}

impl FromStr for SplitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "delimited" => Ok(Self::Delimited),
            "inferred" => Ok(Self::Inferred),
            "per-argument" => Ok(Self::PerArgument),
            other => Err(format!(
                "unknown split mode '{other}' (expected auto, delimited, inferred or per-argument)"
            )),
        }
    }
}

/// What happens when a pipeline has more stages than `max_stages`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageLimit {
    /// Refuse to build the pipeline.
    Reject,
    /// Run the pipeline anyway.
    Ignore,
}

impl Default for StageLimit {
    fn default() -> Self {
        Self::Reject
    }
}

/// How per-stage statuses collapse into the pipeline's exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitPolicy {
    /// The last stage's status.
    Last,
    /// The rightmost non-zero status, or 0 if every stage succeeded.
    Pipefail,
}

impl Default for ExitPolicy {
    fn default() -> Self {
        Self::Last
    }
}

impl fmt::Display for ExitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Last => write!(f, "last"),
            Self::Pipefail => write!(f, "pipefail"),
        }
    }
}

/// Configuration for one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Token separating stages.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Maximum number of stages.
    #[serde(default = "default_max_stages")]
    pub max_stages: usize,
    /// Whether `max_stages` is enforced.
    #[serde(default)]
    pub stage_limit: StageLimit,
    /// How arguments are split into stages.
    #[serde(default)]
    pub split_mode: SplitMode,
    /// How the exit code is chosen.
    #[serde(default)]
    pub exit_policy: ExitPolicy,
}

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

fn default_max_stages() -> usize {
    DEFAULT_MAX_STAGES
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            max_stages: default_max_stages(),
            stage_limit: StageLimit::default(),
            split_mode: SplitMode::default(),
            exit_policy: ExitPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the delimiter token.
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Sets the stage ceiling.
    #[must_use]
    pub fn with_max_stages(mut self, max_stages: usize) -> Self {
        self.max_stages = max_stages;
        self
    }

    /// Sets the stage limit policy.
    #[must_use]
    pub fn with_stage_limit(mut self, stage_limit: StageLimit) -> Self {
        self.stage_limit = stage_limit;
        self
    }

    /// Sets the split mode.
    #[must_use]
    pub fn with_split_mode(mut self, split_mode: SplitMode) -> Self {
        self.split_mode = split_mode;
        self
    }

    /// Sets the exit policy.
    #[must_use]
    pub fn with_exit_policy(mut self, exit_policy: ExitPolicy) -> Self {
        self.exit_policy = exit_policy;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the delimiter is empty or the ceiling is zero.
    pub fn validate(&self) -> Result<(), PipeError> {
        if self.delimiter.is_empty() {
            return Err(PipeError::invalid_arguments("delimiter cannot be empty"));
        }
        if self.max_stages == 0 {
            return Err(PipeError::invalid_arguments("max stages must be at least 1"));
        }
        Ok(())
    }

    /// Returns true if a pipeline of `count` stages exceeds an enforced ceiling.
    #[must_use]
    pub fn exceeds_limit(&self, count: usize) -> bool {
        self.stage_limit == StageLimit::Reject && count > self.max_stages
    }
}
