//! Reaping stage processes and collecting their statuses.

use super::launcher::{LaunchOutcome, LaunchSlot, LaunchedStage};
use super::result::{PipelineReport, PipelineResult, StageOutcome};
use crate::config::ExitPolicy;
use crate::core::StageExit;
use crate::events::{EventSink, STAGE_EXITED};
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, warn};
use uuid::Uuid;

/// Waits for every launched stage and builds the pipeline result.
#[derive(Debug, Clone, Copy)]
pub struct PipelineSupervisor<'a> {
    events: &'a dyn EventSink,
    policy: ExitPolicy,
}

impl<'a> PipelineSupervisor<'a> {
    /// Creates a supervisor that aggregates exits with `policy`.
    #[must_use]
    pub fn new(events: &'a dyn EventSink, policy: ExitPolicy) -> Self {
        Self { events, policy }
    }

    /// Reaps every launched stage of `outcome`.
    ///
    /// Stages are waited on concurrently and may finish in any order; this
    /// returns only once all of them have been reaped. A stage whose wait
    /// fails is recorded as [`StageExit::Lost`].
    pub async fn supervise(&self, run_id: Uuid, outcome: LaunchOutcome) -> PipelineResult {
        let LaunchOutcome { slots, failures } = outcome;

        let mut stages = Vec::with_capacity(slots.len());
        let mut waiting = FuturesUnordered::new();
        for slot in slots {
            match slot {
                LaunchSlot::Launched(stage) => waiting.push(self.reap(stage)),
                LaunchSlot::NotLaunched { index, program } => {
                    stages.push(StageOutcome::not_launched(index, program));
                }
            }
        }

        while let Some(reaped) = waiting.next().await {
            stages.push(reaped);
        }

        let report = PipelineReport::new(run_id, stages, self.policy);
        debug!(
            exit_code = report.exit_code,
            failures = failures.len(),
            "All stages reaped"
        );
        PipelineResult::new(report, failures)
    }

    async fn reap(&self, mut stage: LaunchedStage) -> StageOutcome {
        let exit = match stage.process.wait().await {
            Ok(exit) => exit,
            Err(err) => {
                warn!(stage = stage.index, program = %stage.program, error = %err, "Lost track of stage");
                StageExit::Lost
            }
        };

        debug!(stage = stage.index, program = %stage.program, pid = ?stage.pid, %exit, "Stage exited");
        self.events.try_emit(
            STAGE_EXITED,
            Some(serde_json::json!({
                "stage": stage.index,
                "program": stage.program,
                "pid": stage.pid,
                "exit": exit,
            })),
        );

        StageOutcome {
            index: stage.index,
            program: stage.program,
            pid: stage.pid,
            exit,
            started_at: stage.started_at,
            ended_at: Some(Utc::now()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::pipeline::{allocate_channels, PipelineEndpoints, StageLauncher};
    use crate::stages::StageSpec;
    use crate::testing::{assert_all_reaped, assert_stage_exit, RecordingSpawner};
    use pretty_assertions::assert_eq;

    async fn run(spawner: &RecordingSpawner, programs: &[&str], policy: ExitPolicy) -> PipelineResult {
        let sink = CollectingEventSink::new();
        let stages: Vec<StageSpec> = programs.iter().map(|p| StageSpec::new(*p)).collect();
        let channels = allocate_channels(stages.len()).unwrap();
        let outcome = StageLauncher::new(spawner, &sink).launch(
            &stages,
            channels,
            PipelineEndpoints::inherit(),
        );
        PipelineSupervisor::new(&sink, policy)
            .supervise(Uuid::new_v4(), outcome)
            .await
    }

    #[tokio::test]
    async fn test_reaps_every_stage() {
        let spawner = RecordingSpawner::new();
        let result = run(&spawner, &["a", "b", "c"], ExitPolicy::Last).await;

        assert_eq!(spawner.reaped_count(), 3);
        assert_all_reaped(result.report());
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_last_stage_status_wins() {
        let spawner = RecordingSpawner::new()
            .with_exit("a", StageExit::Exited(2))
            .with_exit("b", StageExit::Exited(0));
        let result = run(&spawner, &["a", "b"], ExitPolicy::Last).await;

        assert_eq!(result.exit_code(), 0);
        assert_stage_exit(result.report(), 0, StageExit::Exited(2));
    }

    #[tokio::test]
    async fn test_pipefail_policy() {
        let spawner = RecordingSpawner::new().with_exit("a", StageExit::Exited(2));
        let result = run(&spawner, &["a", "b"], ExitPolicy::Pipefail).await;

        assert_eq!(result.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_signal_exit_code() {
        let spawner = RecordingSpawner::new().with_exit("b", StageExit::Signaled(libc::SIGPIPE));
        let result = run(&spawner, &["a", "b"], ExitPolicy::Last).await;

        assert_eq!(result.exit_code(), 128 + libc::SIGPIPE);
    }

    #[tokio::test]
    async fn test_wait_error_is_lost() {
        let spawner = RecordingSpawner::new().with_wait_error("b", libc::ECHILD);
        let result = run(&spawner, &["a", "b"], ExitPolicy::Last).await;

        assert_stage_exit(result.report(), 1, StageExit::Lost);
        assert_eq!(result.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_launch_failure_still_reaps_others() {
        let spawner = RecordingSpawner::new().with_spawn_error("missing", libc::ENOENT);
        let result = run(&spawner, &["a", "missing", "c"], ExitPolicy::Last).await;

        assert_eq!(spawner.reaped_count(), 2);
        assert_stage_exit(result.report(), 1, StageExit::NotLaunched);
        assert_eq!(result.exit_code(), 127);
        assert_eq!(result.report().stages.len(), 3);
    }

    #[tokio::test]
    async fn test_emits_exit_events() {
        let spawner = RecordingSpawner::new();
        let sink = CollectingEventSink::new();
        let stages = vec![StageSpec::new("a"), StageSpec::new("b")];
        let outcome = StageLauncher::new(&spawner, &sink).launch(
            &stages,
            allocate_channels(2).unwrap(),
            PipelineEndpoints::inherit(),
        );
        PipelineSupervisor::new(&sink, ExitPolicy::Last)
            .supervise(Uuid::new_v4(), outcome)
            .await;

        let exited = sink.events_of_type(STAGE_EXITED);
        assert_eq!(exited.len(), 2);
        let exit = exited[0].1.as_ref().unwrap()["exit"].clone();
        assert_eq!(exit, serde_json::json!({"kind": "exited", "value": 0}));
    }
}
