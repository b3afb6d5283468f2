//! Per-stage outcomes and the aggregate pipeline result.

use crate::config::ExitPolicy;
use crate::core::StageExit;
use crate::errors::PipeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What happened to one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutcome {
    /// Zero-based stage index.
    pub index: usize,
    /// The stage's program, for display.
    pub program: String,
    /// OS process id, if the stage was started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// How the stage ended.
    pub exit: StageExit,
    /// When the stage was started (or given up on).
    pub started_at: DateTime<Utc>,
    /// When the stage was reaped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl StageOutcome {
    /// Creates an outcome for a stage that was never started.
    #[must_use]
    pub fn not_launched(index: usize, program: impl Into<String>) -> Self {
        Self {
            index,
            program: program.into(),
            pid: None,
            exit: StageExit::NotLaunched,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Returns the stage's run time in milliseconds, if it was reaped.
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        self.ended_at
            .map(|ended| (ended - self.started_at).num_milliseconds())
    }
}

/// Every stage's outcome plus the exit code the policy derives from them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Identifier of this invocation, as logged.
    pub run_id: Uuid,
    /// Outcomes ordered by stage index.
    pub stages: Vec<StageOutcome>,
    /// The policy-derived exit code, ignoring launch failures.
    pub exit_code: i32,
}

impl PipelineReport {
    /// Builds a report, deriving the exit code with `policy`.
    #[must_use]
    pub fn new(run_id: Uuid, mut stages: Vec<StageOutcome>, policy: ExitPolicy) -> Self {
        stages.sort_by_key(|stage| stage.index);
        let exit_code = aggregate_exit_code(&stages, policy);
        Self {
            run_id,
            stages,
            exit_code,
        }
    }

    /// Returns the outcome of the last stage.
    #[must_use]
    pub fn last_stage(&self) -> Option<&StageOutcome> {
        self.stages.last()
    }

    /// Returns the pids of every started stage.
    #[must_use]
    pub fn pids(&self) -> Vec<u32> {
        self.stages.iter().filter_map(|stage| stage.pid).collect()
    }
}

/// Collapses stage exits into one code.
///
/// With [`ExitPolicy::Last`] this is the last stage's code. With
/// [`ExitPolicy::Pipefail`] it is the rightmost non-zero code, or 0. A stage
/// that never ran contributes nothing; the launch failure that caused it is
/// reported separately.
#[must_use]
pub fn aggregate_exit_code(stages: &[StageOutcome], policy: ExitPolicy) -> i32 {
    match policy {
        ExitPolicy::Last => stages
            .last()
            .and_then(|stage| stage.exit.code())
            .unwrap_or(1),
        ExitPolicy::Pipefail => stages
            .iter()
            .rev()
            .filter_map(|stage| stage.exit.code())
            .find(|code| *code != 0)
            .unwrap_or(0),
    }
}

/// The outcome of a pipeline that got as far as spawning.
///
/// Construction-time failures never produce a `PipelineResult`; they are
/// returned as errors before any process exists.
#[derive(Debug)]
pub struct PipelineResult {
    report: PipelineReport,
    failures: Vec<PipeError>,
}

impl PipelineResult {
    /// Creates a result.
    #[must_use]
    pub fn new(report: PipelineReport, failures: Vec<PipeError>) -> Self {
        Self { report, failures }
    }

    /// Returns the per-stage report.
    #[must_use]
    pub fn report(&self) -> &PipelineReport {
        &self.report
    }

    /// Returns the launch or resource failures, in stage order.
    #[must_use]
    pub fn failures(&self) -> &[PipeError] {
        &self.failures
    }

    /// Returns the first recorded failure.
    #[must_use]
    pub fn failure(&self) -> Option<&PipeError> {
        self.failures.first()
    }

    /// Returns the code the process should exit with.
    ///
    /// A recorded failure wins over any stage's status.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.failure()
            .map_or(self.report.exit_code, PipeError::exit_code)
    }

    /// Returns true if nothing failed and the exit code is 0.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.report.exit_code == 0
    }
}
