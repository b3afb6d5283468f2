//! Stage specifications.

use std::ffi::{OsStr, OsString};
use std::fmt;

/// Specification for a single stage in a pipeline: a program and its
/// arguments, passed to the OS verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSpec {
    program: OsString,
    args: Vec<OsString>,
}

impl StageSpec {
    /// Creates a stage specification with no arguments.
    #[must_use]
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Sets the arguments.
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<OsString>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Adds an argument.
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Builds a stage from a non-empty run of tokens. The first token is the
    /// program.
    #[must_use]
    pub fn from_tokens(tokens: &[OsString]) -> Option<Self> {
        let (program, args) = tokens.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    /// Returns the program name or path.
    #[must_use]
    pub fn program(&self) -> &OsStr {
        &self.program
    }

    /// Returns the arguments, excluding the program.
    #[must_use]
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Returns the program as a lossily decoded string, for messages.
    #[must_use]
    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }
}

impl fmt::Display for StageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}
