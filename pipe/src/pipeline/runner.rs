//! The pipeline entry point: split, allocate, launch, supervise.

use super::channels::allocate_channels;
use super::launcher::{PipelineEndpoints, StageLauncher};
use super::result::PipelineResult;
use super::spawner::{ProcessSpawner, TokioSpawner};
use super::state::StateTracker;
use super::supervisor::PipelineSupervisor;
use crate::config::PipelineConfig;
use crate::core::PipelineState;
use crate::errors::PipeError;
use crate::events::{EventSink, NoOpEventSink, PIPELINE_COMPLETED};
use crate::stages::{CommandResolver, PathResolver, StageSpec, StageSplitter};
use std::ffi::OsString;
use std::sync::Arc;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// A configured pipeline runner.
///
/// # Example
///
/// ```rust,ignore
/// let result = Pipeline::new(PipelineConfig::default())
///     .run(&["echo".into(), "hello".into(), "|".into(), "wc".into(), "-c".into()])
///     .await?;
/// assert_eq!(result.exit_code(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    spawner: Arc<dyn ProcessSpawner>,
    resolver: Arc<dyn CommandResolver>,
    events: Arc<dyn EventSink>,
}

impl Pipeline {
    /// Creates a runner that starts real processes and resolves programs
    /// against `PATH`.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            spawner: Arc::new(TokioSpawner::new()),
            resolver: Arc::new(PathResolver::from_env()),
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Replaces the process spawner.
    #[must_use]
    pub fn with_spawner(mut self, spawner: Arc<dyn ProcessSpawner>) -> Self {
        self.spawner = spawner;
        self
    }

    /// Replaces the resolver used when stage boundaries are inferred.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn CommandResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Sets the sink for lifecycle events.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Splits `args` into stages without running anything.
    pub fn plan(&self, args: &[OsString]) -> Result<Vec<StageSpec>, PipeError> {
        StageSplitter::new(&self.config, self.resolver.as_ref()).split(args)
    }

    /// Runs the pipeline described by `args` on the parent's own streams.
    pub async fn run(&self, args: &[OsString]) -> Result<PipelineResult, PipeError> {
        self.run_with_endpoints(args, PipelineEndpoints::inherit())
            .await
    }

    /// Runs the pipeline described by `args` between `endpoints`.
    ///
    /// Returns `Err` only for failures detected before any process was
    /// started (bad arguments, too many stages, channel allocation). Once
    /// spawning begins, launch and resource failures are carried in the
    /// [`PipelineResult`] next to the statuses of the stages that did run,
    /// and every started stage has been reaped by the time this returns.
    pub async fn run_with_endpoints(
        &self,
        args: &[OsString],
        endpoints: PipelineEndpoints,
    ) -> Result<PipelineResult, PipeError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline", %run_id, stages = tracing::field::Empty);
        self.execute(run_id, args, endpoints)
            .instrument(span)
            .await
    }

    async fn execute(
        &self,
        run_id: Uuid,
        args: &[OsString],
        endpoints: PipelineEndpoints,
    ) -> Result<PipelineResult, PipeError> {
        let events = self.events.as_ref();
        let mut tracker = StateTracker::new(events);

        let stages = match self.plan(args) {
            Ok(stages) => stages,
            Err(err) => {
                tracker.advance(PipelineState::Failed);
                return Err(err);
            }
        };
        tracing::Span::current().record("stages", stages.len());

        tracker.advance(PipelineState::Allocating);
        let channels = match allocate_channels(stages.len()) {
            Ok(channels) => channels,
            Err(err) => {
                tracker.advance(PipelineState::Failed);
                return Err(err);
            }
        };

        tracker.advance(PipelineState::Spawning);
        let outcome = StageLauncher::new(self.spawner.as_ref(), events).launch(
            &stages,
            channels,
            endpoints,
        );

        let failed = outcome.has_failures();
        if failed {
            tracker.advance(PipelineState::Failed);
        } else {
            tracker.advance(PipelineState::Running);
        }
        if !failed || outcome.launched_count() > 0 {
            tracker.advance(PipelineState::Reaping);
        }

        let result = PipelineSupervisor::new(events, self.config.exit_policy)
            .supervise(run_id, outcome)
            .await;

        let terminal = if failed {
            PipelineState::Failed
        } else {
            PipelineState::Done
        };
        if tracker.state() != terminal {
            tracker.advance(terminal);
        }

        info!(
            exit_code = result.exit_code(),
            failures = result.failures().len(),
            "Pipeline completed"
        );
        events
            .emit(
                PIPELINE_COMPLETED,
                Some(serde_json::json!({
                    "run_id": run_id,
                    "exit_code": result.exit_code(),
                    "failures": result.failures().iter().map(PipeError::to_dict).collect::<Vec<_>>(),
                })),
            )
            .await;

        Ok(result)
    }
}
