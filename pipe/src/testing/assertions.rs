//! Test assertions for pipeline reports and events.

use crate::core::{PipelineState, StageExit};
use crate::events::{CollectingEventSink, PIPELINE_STATE};
use crate::pipeline::PipelineReport;

/// Asserts that every stage of the report was started and exited normally
/// with status 0.
pub fn assert_all_succeeded(report: &PipelineReport) {
    for stage in &report.stages {
        assert_eq!(
            stage.exit,
            StageExit::Exited(0),
            "Expected stage {} ({}) to succeed, got {}",
            stage.index,
            stage.program,
            stage.exit
        );
    }
}

/// Asserts that stage `index` ended with `expected`.
pub fn assert_stage_exit(report: &PipelineReport, index: usize, expected: StageExit) {
    let stage = report
        .stages
        .iter()
        .find(|stage| stage.index == index)
        .unwrap_or_else(|| panic!("No stage {index} in report with {} stages", report.stages.len()));
    assert_eq!(
        stage.exit, expected,
        "Expected stage {index} ({}) to end with {expected}, got {}",
        stage.program, stage.exit
    );
}

/// Asserts that every started stage has an end time.
pub fn assert_all_reaped(report: &PipelineReport) {
    for stage in report.stages.iter().filter(|stage| stage.pid.is_some()) {
        assert!(
            stage.ended_at.is_some(),
            "Stage {} ({}) was started but never reaped",
            stage.index,
            stage.program
        );
    }
}

/// Returns the states recorded by `pipeline.state` events, starting with
/// the initial state.
pub fn recorded_states(sink: &CollectingEventSink) -> Vec<PipelineState> {
    let mut states = vec![PipelineState::Parsing];
    for (_, data) in sink.events_of_type(PIPELINE_STATE) {
        let to = data
            .as_ref()
            .and_then(|data| data.get("to"))
            .cloned()
            .and_then(|to| serde_json::from_value(to).ok());
        if let Some(state) = to {
            states.push(state);
        }
    }
    states
}

/// Asserts that the sink saw exactly the `expected` state sequence.
pub fn assert_state_history(sink: &CollectingEventSink, expected: &[PipelineState]) {
    let actual = recorded_states(sink);
    assert_eq!(
        actual, expected,
        "Expected state history {expected:?}, got {actual:?}"
    );
}
