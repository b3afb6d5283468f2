//! Tracking the per-invocation state machine.

use crate::core::PipelineState;
use crate::events::{EventSink, PIPELINE_STATE};
use tracing::{debug, warn};

/// Records state transitions of one pipeline run and reports each one to
/// an [`EventSink`].
#[derive(Debug)]
pub struct StateTracker<'a> {
    state: PipelineState,
    history: Vec<PipelineState>,
    events: &'a dyn EventSink,
}

impl<'a> StateTracker<'a> {
    /// Creates a tracker in [`PipelineState::Parsing`].
    #[must_use]
    pub fn new(events: &'a dyn EventSink) -> Self {
        Self {
            state: PipelineState::Parsing,
            history: vec![PipelineState::Parsing],
            events,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Returns every state visited so far, including the current one.
    #[must_use]
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    /// Moves to `next`.
    ///
    /// An illegal transition is logged and still applied, so the history
    /// shows what actually happened.
    pub fn advance(&mut self, next: PipelineState) {
        if !self.state.can_transition_to(next) {
            warn!(from = %self.state, to = %next, "Unexpected pipeline state transition");
        }
        debug!(from = %self.state, to = %next, "Pipeline state");
        self.events.try_emit(
            PIPELINE_STATE,
            Some(serde_json::json!({
                "from": self.state,
                "to": next,
            })),
        );
        self.state = next;
        self.history.push(next);
    }
}
