//! Command lookup used to infer stage boundaries.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// Answers whether a word names a runnable command.
pub trait CommandResolver: Send + Sync + Debug {
    /// Returns true if `name` resolves to an executable.
    fn resolves(&self, name: &str) -> bool;
}

/// Resolves commands against the directories of a `PATH`-style search list.
#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    dirs: Vec<PathBuf>,
}

impl PathResolver {
    /// Creates a resolver over the given directories.
    #[must_use]
    pub fn new(dirs: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            dirs: dirs.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a resolver over the current process's `PATH`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_path_var(std::env::var_os("PATH").unwrap_or_default())
    }

    /// Creates a resolver from a raw `PATH` value.
    #[must_use]
    pub fn from_path_var(path: impl Into<OsString>) -> Self {
        let path = path.into();
        Self {
            dirs: std::env::split_paths(&path)
                .filter(|dir| !dir.as_os_str().is_empty())
                .collect(),
        }
    }

    /// Returns the search directories.
    #[must_use]
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Returns the first executable named `name` in the search list.
    ///
    /// A name containing `/` is checked as a path and not searched.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() {
            return None;
        }
        if name.contains('/') {
            let path = PathBuf::from(name);
            return is_executable(&path).then_some(path);
        }
        self.dirs
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| is_executable(candidate))
    }
}

impl CommandResolver for PathResolver {
    fn resolves(&self, name: &str) -> bool {
        self.find(name).is_some()
    }
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|metadata| metadata.is_file() && metadata.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Resolves a fixed set of command names. Useful when the answer must not
/// depend on the host.
#[derive(Debug, Clone, Default)]
pub struct FixedResolver {
    names: HashSet<String>,
}

impl FixedResolver {
    /// Creates a resolver that knows exactly `names`.
    #[must_use]
    pub fn new(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl CommandResolver for FixedResolver {
    fn resolves(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}
