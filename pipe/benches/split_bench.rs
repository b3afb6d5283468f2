//! Benchmarks for argument splitting.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pipe::config::{PipelineConfig, SplitMode};
use pipe::stages::{FixedResolver, StageSplitter};
use std::ffi::OsString;

fn args(items: &[&str]) -> Vec<OsString> {
    items.iter().map(OsString::from).collect()
}

fn split_benchmark(c: &mut Criterion) {
    let resolver = FixedResolver::new(["cat", "grep", "sort", "uniq", "wc", "tr"]);

    let delimited = PipelineConfig::default().with_split_mode(SplitMode::Delimited);
    let delimited_args = args(&[
        "cat", "log.txt", "|", "grep", "-v", "debug", "|", "sort", "|", "uniq", "-c", "|", "wc", "-l",
    ]);
    c.bench_function("split_delimited", |b| {
        let splitter = StageSplitter::new(&delimited, &resolver);
        b.iter(|| splitter.split(black_box(&delimited_args)));
    });

    let inferred = PipelineConfig::default().with_split_mode(SplitMode::Inferred);
    let inferred_args = args(&["cat", "log.txt", "grep -v debug", "sort", "uniq", "-c", "wc", "-l"]);
    c.bench_function("split_inferred", |b| {
        let splitter = StageSplitter::new(&inferred, &resolver);
        b.iter(|| splitter.split(black_box(&inferred_args)));
    });

    let per_argument = PipelineConfig::default().with_split_mode(SplitMode::PerArgument);
    let per_argument_args = args(&["cat log.txt", "grep -v 'debug line'", "sort", "uniq -c", "wc -l"]);
    c.bench_function("split_per_argument", |b| {
        let splitter = StageSplitter::new(&per_argument, &resolver);
        b.iter(|| splitter.split(black_box(&per_argument_args)));
    });
}

criterion_group!(benches, split_benchmark);
criterion_main!(benches);
