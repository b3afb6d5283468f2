//! Starting one process per stage with its streams wired up.
//!
//! Stage `i` reads from channel `i - 1` and writes to channel `i`. The first
//! stage reads the pipeline's input endpoint and the last stage writes the
//! output endpoint; both default to the parent's own streams. Standard error
//! is always inherited.

use super::channels::Channel;
use super::spawner::{ProcessSpawner, StageProcess, StageStdio, StreamSink, StreamSource};
use crate::errors::PipeError;
use crate::events::{EventSink, STAGE_LAUNCH_FAILED, STAGE_SPAWNED};
use crate::stages::StageSpec;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// The two outer ends of a pipeline.
#[derive(Debug)]
pub struct PipelineEndpoints {
    /// Fed to the first stage.
    pub stdin: StreamSource,
    /// Written by the last stage.
    pub stdout: StreamSink,
}

impl PipelineEndpoints {
    /// Both ends inherited from the parent.
    #[must_use]
    pub fn inherit() -> Self {
        Self {
            stdin: StreamSource::Inherit,
            stdout: StreamSink::Inherit,
        }
    }

    /// Custom endpoints.
    #[must_use]
    pub fn new(stdin: StreamSource, stdout: StreamSink) -> Self {
        Self { stdin, stdout }
    }
}

impl Default for PipelineEndpoints {
    fn default() -> Self {
        Self::inherit()
    }
}

/// A stage whose process is running.
#[derive(Debug)]
pub struct LaunchedStage {
    /// Zero-based stage index.
    pub index: usize,
    /// The stage's program, for display.
    pub program: String,
    /// OS process id captured at spawn time.
    pub pid: Option<u32>,
    /// When the process was started.
    pub started_at: DateTime<Utc>,
    /// Handle used to reap the process.
    pub process: Box<dyn StageProcess>,
}

/// The launch state of one stage.
#[derive(Debug)]
pub enum LaunchSlot {
    /// The stage is running.
    Launched(LaunchedStage),
    /// The stage was never started.
    NotLaunched {
        /// Zero-based stage index.
        index: usize,
        /// The stage's program, for display.
        program: String,
    },
}

impl LaunchSlot {
    /// Returns the stage index.
    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            Self::Launched(stage) => stage.index,
            Self::NotLaunched { index, .. } => *index,
        }
    }
}

/// Everything the supervisor needs after launching.
#[derive(Debug, Default)]
pub struct LaunchOutcome {
    /// One slot per stage, in stage order.
    pub slots: Vec<LaunchSlot>,
    /// Launch and resource failures, in stage order.
    pub failures: Vec<PipeError>,
}

impl LaunchOutcome {
    /// Returns the number of running stages.
    #[must_use]
    pub fn launched_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, LaunchSlot::Launched(_)))
            .count()
    }

    /// Returns true if any stage failed to launch.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Starts every stage of a pipeline.
#[derive(Debug, Clone, Copy)]
pub struct StageLauncher<'a> {
    spawner: &'a dyn ProcessSpawner,
    events: &'a dyn EventSink,
}

impl<'a> StageLauncher<'a> {
    /// Creates a launcher.
    #[must_use]
    pub fn new(spawner: &'a dyn ProcessSpawner, events: &'a dyn EventSink) -> Self {
        Self { spawner, events }
    }

    /// Launches `stages`, consuming `channels` and `endpoints`.
    ///
    /// `channels` must hold exactly `stages.len() - 1` channels. A stage
    /// whose program cannot be started is recorded as a failure and the
    /// remaining stages are still started, so its neighbours see a broken
    /// pipe or end-of-stream as they would in a shell. Resource exhaustion
    /// stops further spawning. In every case the parent holds no channel end
    /// once this returns.
    pub fn launch(
        &self,
        stages: &[StageSpec],
        mut channels: Vec<Channel>,
        endpoints: PipelineEndpoints,
    ) -> LaunchOutcome {
        let mut outcome = LaunchOutcome::default();

        let expected = stages.len().saturating_sub(1);
        if channels.len() != expected {
            outcome.failures.push(PipeError::invalid_arguments(format!(
                "{} stages need {expected} channels, got {}",
                stages.len(),
                channels.len()
            )));
            outcome.slots = not_launched(stages, 0);
            return outcome;
        }

        let last = expected;
        let mut pipeline_stdin = Some(endpoints.stdin);
        let mut pipeline_stdout = Some(endpoints.stdout);

        for (index, spec) in stages.iter().enumerate() {
            let stdin = if index == 0 {
                pipeline_stdin.take()
            } else {
                channels[index - 1].take_reader().map(StreamSource::Pipe)
            };
            let stdout = if index == last {
                pipeline_stdout.take()
            } else {
                channels[index].take_writer().map(StreamSink::Pipe)
            };
            let (Some(stdin), Some(stdout)) = (stdin, stdout) else {
                outcome.failures.push(PipeError::invalid_arguments(format!(
                    "stage {} has no stream to claim",
                    index + 1
                )));
                outcome.slots.extend(not_launched(stages, index));
                break;
            };

            let stdio = StageStdio {
                stdin,
                stdout,
                stderr: StreamSink::Inherit,
            };
            match self.launch_one(index, spec, stdio) {
                Ok(stage) => outcome.slots.push(LaunchSlot::Launched(stage)),
                Err(err) => {
                    let exhausted = matches!(err, PipeError::ResourceExhausted { .. });
                    outcome.failures.push(err);
                    if exhausted {
                        outcome.slots.extend(not_launched(stages, index));
                        break;
                    }
                    outcome.slots.push(LaunchSlot::NotLaunched {
                        index,
                        program: spec.program_name(),
                    });
                }
            }
        }

        // Ends that were never claimed (only after an early stop) close here.
        drop(channels);
        outcome
    }

    fn launch_one(
        &self,
        index: usize,
        spec: &StageSpec,
        stdio: StageStdio,
    ) -> Result<LaunchedStage, PipeError> {
        let (stdin_kind, stdout_kind, _) = stdio.kinds();
        let program = spec.program_name();
        let started_at = Utc::now();

        match self.spawner.spawn(spec, stdio) {
            Ok(process) => {
                let pid = process.id();
                debug!(stage = index, %spec, ?pid, %stdin_kind, %stdout_kind, "Spawned stage");
                self.events.try_emit(
                    STAGE_SPAWNED,
                    Some(serde_json::json!({
                        "stage": index,
                        "program": program,
                        "pid": pid,
                        "stdin": stdin_kind,
                        "stdout": stdout_kind,
                    })),
                );
                Ok(LaunchedStage {
                    index,
                    program,
                    pid,
                    started_at,
                    process,
                })
            }
            Err(source) => {
                let err = PipeError::from_spawn_error(index, program.clone(), source);
                warn!(stage = index, %spec, error = %err, "Failed to launch stage");
                let mut payload = err.to_dict();
                payload.insert("program".to_string(), serde_json::json!(program));
                self.events
                    .try_emit(STAGE_LAUNCH_FAILED, Some(serde_json::json!(payload)));
                Err(err)
            }
        }
    }
}

fn not_launched(stages: &[StageSpec], from: usize) -> Vec<LaunchSlot> {
    stages
        .iter()
        .enumerate()
        .skip(from)
        .map(|(index, spec)| LaunchSlot::NotLaunched {
            index,
            program: spec.program_name(),
        })
        .collect()
}
