//! `pipe`: run external programs as a pipeline without a shell.

use std::ffi::OsString;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{ArgAction, Parser};

use pipe::config::{ExitPolicy, PipelineConfig, SplitMode, StageLimit, DEFAULT_DELIMITER, DEFAULT_MAX_STAGES};
use pipe::errors::PipeError;
use pipe::events::LoggingEventSink;
use pipe::observability::init_tracing;
use pipe::pipeline::Pipeline;

/// Command-line interface definition.
#[derive(Debug, Parser)]
#[command(
    name = "pipe",
    version,
    about = "Chain programs into a pipeline without a shell",
    override_usage = "pipe [OPTIONS] <PROG1> [ARGS1...] [| <PROG2> [ARGS2...] ...]"
)]
struct Cli {
    /// Token that separates stages.
    #[arg(short, long, default_value = DEFAULT_DELIMITER)]
    delimiter: String,
    /// How arguments are split into stages: auto, delimited, inferred, per-argument.
    #[arg(short, long, default_value_t = SplitMode::Auto)]
    split: SplitMode,
    /// Maximum number of stages.
    #[arg(long, default_value_t = DEFAULT_MAX_STAGES)]
    max_stages: usize,
    /// Accept pipelines longer than --max-stages.
    #[arg(long)]
    no_stage_limit: bool,
    /// Exit with the rightmost non-zero stage status instead of the last one.
    #[arg(long)]
    pipefail: bool,
    /// Raise log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    /// Programs, their arguments and delimiters.
    #[arg(trailing_var_arg = true, value_name = "PIPELINE")]
    args: Vec<OsString>,
}

impl Cli {
    fn config(&self) -> PipelineConfig {
        PipelineConfig::default()
            .with_delimiter(self.delimiter.clone())
            .with_max_stages(self.max_stages)
            .with_split_mode(self.split)
            .with_stage_limit(if self.no_stage_limit {
                StageLimit::Ignore
            } else {
                StageLimit::Reject
            })
            .with_exit_policy(if self.pipefail {
                ExitPolicy::Pipefail
            } else {
                ExitPolicy::Last
            })
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(code) => code,
        Err(err) => match err.downcast_ref::<PipeError>() {
            // The variant's message already carries its OS error text.
            Some(pipe_err) => {
                eprintln!("pipe: {pipe_err}");
                to_exit_code(pipe_err.exit_code())
            }
            None => {
                eprintln!("pipe: {err:#}");
                ExitCode::FAILURE
            }
        },
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    init_tracing(cli.verbose).ok();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| PipeError::resource_exhausted("start the async runtime", err))?;

    let pipeline =
        Pipeline::new(cli.config()).with_event_sink(Arc::new(LoggingEventSink::debug()));
    let result = runtime.block_on(pipeline.run(&cli.args))?;

    for failure in result.failures() {
        eprintln!("pipe: {failure}");
    }
    Ok(to_exit_code(result.exit_code()))
}

fn to_exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code.rem_euclid(256)).unwrap_or(1))
}
