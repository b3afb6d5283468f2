//! In-memory process spawner for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::core::StageExit;
use crate::pipeline::{ProcessSpawner, StageProcess, StageStdio, StreamKind};
use crate::stages::StageSpec;

/// One recorded call to [`RecordingSpawner::spawn`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRecord {
    /// The program, lossily decoded.
    pub program: String,
    /// The arguments, lossily decoded.
    pub args: Vec<String>,
    /// Kind of the stdin handed over.
    pub stdin: StreamKind,
    /// Kind of the stdout handed over.
    pub stdout: StreamKind,
    /// Kind of the stderr handed over.
    pub stderr: StreamKind,
}

/// A spawner that starts nothing.
///
/// It records every call, fails for programs registered with
/// [`with_spawn_error`](Self::with_spawn_error), and hands back fake
/// processes that finish with the exit registered through
/// [`with_exit`](Self::with_exit) (default `Exited(0)`). The stream handles
/// it receives are dropped immediately, like a real spawner closing the
/// parent's copies.
#[derive(Debug)]
pub struct RecordingSpawner {
    calls: Mutex<Vec<SpawnRecord>>,
    exits: HashMap<String, StageExit>,
    spawn_errors: HashMap<String, i32>,
    wait_errors: HashMap<String, i32>,
    next_pid: AtomicU32,
    reaped: Arc<AtomicUsize>,
}

impl Default for RecordingSpawner {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            exits: HashMap::new(),
            spawn_errors: HashMap::new(),
            wait_errors: HashMap::new(),
            next_pid: AtomicU32::new(4000),
            reaped: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl RecordingSpawner {
    /// Creates a spawner where every program succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `program` finish with `exit`.
    #[must_use]
    pub fn with_exit(mut self, program: impl Into<String>, exit: StageExit) -> Self {
        self.exits.insert(program.into(), exit);
        self
    }

    /// Makes spawning `program` fail with the OS error `errno`.
    #[must_use]
    pub fn with_spawn_error(mut self, program: impl Into<String>, errno: i32) -> Self {
        self.spawn_errors.insert(program.into(), errno);
        self
    }

    /// Makes waiting on `program` fail with the OS error `errno`.
    #[must_use]
    pub fn with_wait_error(mut self, program: impl Into<String>, errno: i32) -> Self {
        self.wait_errors.insert(program.into(), errno);
        self
    }

    /// Returns every recorded spawn call, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<SpawnRecord> {
        self.calls.lock().clone()
    }

    /// Returns how many fake processes have been waited on.
    #[must_use]
    pub fn reaped_count(&self) -> usize {
        self.reaped.load(Ordering::SeqCst)
    }
}

impl ProcessSpawner for RecordingSpawner {
    fn spawn(&self, spec: &StageSpec, stdio: StageStdio) -> io::Result<Box<dyn StageProcess>> {
        let (stdin, stdout, stderr) = stdio.kinds();
        drop(stdio);

        let program = spec.program_name();
        self.calls.lock().push(SpawnRecord {
            program: program.clone(),
            args: spec
                .args()
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect(),
            stdin,
            stdout,
            stderr,
        });

        if let Some(errno) = self.spawn_errors.get(&program) {
            return Err(io::Error::from_raw_os_error(*errno));
        }

        Ok(Box::new(FakeProcess {
            pid: self.next_pid.fetch_add(1, Ordering::SeqCst),
            exit: self.exits.get(&program).copied().unwrap_or(StageExit::Exited(0)),
            wait_error: self.wait_errors.get(&program).copied(),
            reaped: Arc::clone(&self.reaped),
        }))
    }
}

/// A process handed out by [`RecordingSpawner`].
#[derive(Debug)]
pub struct FakeProcess {
    pid: u32,
    exit: StageExit,
    wait_error: Option<i32>,
    reaped: Arc<AtomicUsize>,
}

#[async_trait]
impl StageProcess for FakeProcess {
    fn id(&self) -> Option<u32> {
        Some(self.pid)
    }

    async fn wait(&mut self) -> io::Result<StageExit> {
        tokio::task::yield_now().await;
        self.reaped.fetch_add(1, Ordering::SeqCst);
        match self.wait_error {
            Some(errno) => Err(io::Error::from_raw_os_error(errno)),
            None => Ok(self.exit),
        }
    }
}
