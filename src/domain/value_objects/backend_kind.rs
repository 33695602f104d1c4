use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Which engine drives the repository operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// The external `git` executable
    #[serde(alias = "cmd", alias = "commandline", alias = "git")]
    CommandLine,
    /// `libgit2`, in process
    #[serde(alias = "lib", alias = "libgit2", alias = "git2")]
    Library,
}

impl Default for BackendKind {
    fn default() -> Self {
        Self::CommandLine
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::CommandLine => write!(f, "command-line"),
            BackendKind::Library => write!(f, "library"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = BackendKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cmd" | "command-line" | "commandline" | "git" => Ok(BackendKind::CommandLine),
            "lib" | "library" | "libgit2" | "git2" => Ok(BackendKind::Library),
            _ => Err(BackendKindError::Unsupported(s.to_string())),
        }
    }
}

impl BackendKind {
    /// Whether a real `--depth` clone is possible
    pub fn supports_shallow_clone(&self) -> bool {
        matches!(self, BackendKind::CommandLine)
    }

    /// Whether a clone can skip populating the worktree
    pub fn supports_no_checkout(&self) -> bool {
        matches!(self, BackendKind::CommandLine)
    }
}

/// Errors raised when parsing a [`BackendKind`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendKindError {
    #[error("Unsupported backend: '{0}'. Supported backends are: cmd, lib")]
    Unsupported(String),
}
