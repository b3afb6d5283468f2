//! Descriptor and child-process hygiene.
//!
//! Kept in its own test binary with a single test so nothing else in the
//! process opens or closes descriptors while they are being counted.

#![cfg(target_os = "linux")]

use pipe::config::{PipelineConfig, SplitMode};
use pipe::pipeline::{Pipeline, PipelineEndpoints, PipelineResult, StreamSink, StreamSource};
use std::ffi::OsString;
use std::io::Read;

fn open_descriptors() -> usize {
    std::fs::read_dir("/proc/self/fd").unwrap().count()
}

/// Returns the parent pid of `pid`, or `None` if no such process exists.
fn parent_of(pid: u32) -> Option<u32> {
    let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    let after_name = &stat[stat.rfind(')')? + 1..];
    after_name.split_whitespace().nth(1)?.parse().ok()
}

fn args(items: &[&str]) -> Vec<OsString> {
    items.iter().map(OsString::from).collect()
}

async fn run_captured(pipeline: &Pipeline, argv: &[&str]) -> (PipelineResult, String) {
    let (mut reader, writer) = os_pipe::pipe().unwrap();
    let endpoints = PipelineEndpoints::new(StreamSource::Inherit, StreamSink::Pipe(writer));
    let result = pipeline
        .run_with_endpoints(&args(argv), endpoints)
        .await
        .unwrap();
    let mut output = String::new();
    reader.read_to_string(&mut output).unwrap();
    (result, output)
}

fn assert_no_children_left(result: &PipelineResult) {
    let me = std::process::id();
    for pid in result.report().pids() {
        assert_ne!(
            parent_of(pid),
            Some(me),
            "stage process {pid} is still our child after the run"
        );
    }
}

#[test]
fn test_runs_leave_no_descriptors_or_children() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let pipeline = Pipeline::new(PipelineConfig::default().with_split_mode(SplitMode::Delimited));

    // The runtime opens its signal and I/O driver descriptors lazily on the
    // first spawn.
    runtime.block_on(run_captured(&pipeline, &["true"]));
    let before = open_descriptors();

    let runs: [&[&str]; 5] = [
        &["echo", "hello"],
        &["echo", "hello", "|", "wc", "-c"],
        &["yes", "|", "head", "-n", "3", "|", "cat", "|", "wc", "-l"],
        &["echo", "x", "|", "definitely-not-a-real-program-4242", "|", "cat"],
        &["sh", "-c", "kill -KILL $$", "|", "cat"],
    ];
    for argv in runs {
        let (result, _) = runtime.block_on(run_captured(&pipeline, argv));
        assert_no_children_left(&result);
        assert_eq!(
            open_descriptors(),
            before,
            "descriptor count changed after running {argv:?}"
        );
    }

    let (result, output) = runtime.block_on(run_captured(&pipeline, &["echo", "hello", "|", "wc", "-c"]));
    assert_eq!(output.trim(), "6");
    assert!(result.is_success());
}
