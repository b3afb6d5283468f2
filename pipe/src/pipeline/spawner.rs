//! Process creation behind a trait.
//!
//! The launcher decides *what* each stage's streams are; a
//! [`ProcessSpawner`] only turns a [`StageSpec`] plus a [`StageStdio`] into
//! a running process.

use crate::core::StageExit;
use crate::stages::StageSpec;
use async_trait::async_trait;
use os_pipe::{PipeReader, PipeWriter};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::io;
use std::process::Stdio;

/// Where a stage's standard input comes from.
#[derive(Debug)]
pub enum StreamSource {
    /// The parent's standard input.
    Inherit,
    /// The read end of a channel.
    Pipe(PipeReader),
}

/// Where a stage's standard output or error goes.
#[derive(Debug)]
pub enum StreamSink {
    /// The parent's corresponding stream.
    Inherit,
    /// The write end of a channel.
    Pipe(PipeWriter),
}

/// The shape of a stream slot, without the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// Inherited from the parent.
    Inherit,
    /// Connected to a channel end.
    Pipe,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inherit => write!(f, "inherit"),
            Self::Pipe => write!(f, "pipe"),
        }
    }
}

impl StreamSource {
    /// Returns the kind of this source.
    #[must_use]
    pub fn kind(&self) -> StreamKind {
        match self {
            Self::Inherit => StreamKind::Inherit,
            Self::Pipe(_) => StreamKind::Pipe,
        }
    }
}

impl StreamSink {
    /// Returns the kind of this sink.
    #[must_use]
    pub fn kind(&self) -> StreamKind {
        match self {
            Self::Inherit => StreamKind::Inherit,
            Self::Pipe(_) => StreamKind::Pipe,
        }
    }
}

impl From<StreamSource> for Stdio {
    fn from(source: StreamSource) -> Self {
        match source {
            StreamSource::Inherit => Self::inherit(),
            StreamSource::Pipe(reader) => reader.into(),
        }
    }
}

impl From<StreamSink> for Stdio {
    fn from(sink: StreamSink) -> Self {
        match sink {
            StreamSink::Inherit => Self::inherit(),
            StreamSink::Pipe(writer) => writer.into(),
        }
    }
}

/// The three standard streams handed to one stage.
#[derive(Debug)]
pub struct StageStdio {
    /// Standard input.
    pub stdin: StreamSource,
    /// Standard output.
    pub stdout: StreamSink,
    /// Standard error.
    pub stderr: StreamSink,
}

impl StageStdio {
    /// All three streams inherited from the parent.
    #[must_use]
    pub fn inherit() -> Self {
        Self {
            stdin: StreamSource::Inherit,
            stdout: StreamSink::Inherit,
            stderr: StreamSink::Inherit,
        }
    }

    /// Returns the kinds of the three streams.
    #[must_use]
    pub fn kinds(&self) -> (StreamKind, StreamKind, StreamKind) {
        (self.stdin.kind(), self.stdout.kind(), self.stderr.kind())
    }
}

/// A started stage process.
#[async_trait]
pub trait StageProcess: Send + Debug {
    /// Returns the OS process id, if known.
    fn id(&self) -> Option<u32>;

    /// Waits for the process to terminate and reaps it.
    async fn wait(&mut self) -> io::Result<StageExit>;
}

/// Creates stage processes.
pub trait ProcessSpawner: Send + Sync + Debug {
    /// Starts `spec` with the given streams.
    ///
    /// The spawner takes ownership of `stdio`; every handle in it is closed
    /// in the parent by the time this returns, whether or not the spawn
    /// succeeded.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the program could not be started. Errors
    /// raised in the child before the program replaces it (missing file,
    /// permission denied) are reported here as well.
    fn spawn(&self, spec: &StageSpec, stdio: StageStdio) -> io::Result<Box<dyn StageProcess>>;
}

/// Spawns real processes with `tokio::process`.
///
/// Must be called from within a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

impl TokioSpawner {
    /// Creates a new spawner.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ProcessSpawner for TokioSpawner {
    fn spawn(&self, spec: &StageSpec, stdio: StageStdio) -> io::Result<Box<dyn StageProcess>> {
        let mut command = tokio::process::Command::new(spec.program());
        command
            .args(spec.args())
            .stdin(stdio.stdin)
            .stdout(stdio.stdout)
            .stderr(stdio.stderr);

        let child = command.spawn()?;
        // `command` still owns the parent's copies of the claimed ends; they
        // close when it drops at the end of this scope.
        Ok(Box::new(TokioProcess { child }))
    }
}

/// A process started by [`TokioSpawner`].
#[derive(Debug)]
pub struct TokioProcess {
    child: tokio::process::Child,
}

#[async_trait]
impl StageProcess for TokioProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn wait(&mut self) -> io::Result<StageExit> {
        let status = self.child.wait().await?;
        Ok(StageExit::from(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_kinds() {
        let (reader, writer) = os_pipe::pipe().unwrap();
        let stdio = StageStdio {
            stdin: StreamSource::Pipe(reader),
            stdout: StreamSink::Pipe(writer),
            stderr: StreamSink::Inherit,
        };

        assert_eq!(
            stdio.kinds(),
            (StreamKind::Pipe, StreamKind::Pipe, StreamKind::Inherit)
        );
        assert_eq!(StageStdio::inherit().kinds().0, StreamKind::Inherit);
        assert_eq!(StreamKind::Pipe.to_string(), "pipe");
    }

    #[tokio::test]
    async fn test_tokio_spawner_runs_program() {
        let (mut reader, writer) = os_pipe::pipe().unwrap();
        let stdio = StageStdio {
            stdin: StreamSource::Inherit,
            stdout: StreamSink::Pipe(writer),
            stderr: StreamSink::Inherit,
        };

        let spec = StageSpec::new("echo").with_arg("spawned");
        let mut process = TokioSpawner::new().spawn(&spec, stdio).unwrap();
        assert!(process.id().is_some());
        assert_eq!(process.wait().await.unwrap(), StageExit::Exited(0));

        let mut output = String::new();
        std::io::Read::read_to_string(&mut reader, &mut output).unwrap();
        assert_eq!(output, "spawned\n");
    }

    #[tokio::test]
    async fn test_tokio_spawner_reports_missing_program() {
        let spec = StageSpec::new("definitely-not-a-real-program-4242");
        let err = TokioSpawner::new()
            .spawn(&spec, StageStdio::inherit())
            .unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_tokio_spawner_reports_exit_code() {
        let spec = StageSpec::new("sh").with_args(["-c", "exit 3"]);
        let mut process = TokioSpawner::new()
            .spawn(&spec, StageStdio::inherit())
            .unwrap();

        assert_eq!(process.wait().await.unwrap(), StageExit::Exited(3));
    }
}
