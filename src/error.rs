//! Crate-wide error taxonomy.
//!
//! Mirrors the error classes a build invocation can produce: configuration
//! mistakes caught before any subprocess runs, per-object discovery
//! failures, cache corruption, subprocess failures, persistence failures,
//! and host-probe failures. See the module docs on [`crate::driver`] for how
//! each variant is surfaced.

use std::path::PathBuf;
use std::process::ExitStatus;

pub type Result<T, E = BuildError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Invalid project declaration, unknown option, or an unresolved
    /// conflict between two options added with `replace = false`.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The preprocessor failed, or its dependency list couldn't be parsed,
    /// for one object. Local to that object; its consumers are reported
    /// stale-but-unbuildable but do not abort the whole run.
    #[error("dependency discovery failed for {file}: {reason}")]
    Discovery { file: PathBuf, reason: String },

    /// A cache record was corrupt or unreadable. Treated as "target is
    /// stale"; never fatal on its own.
    #[error("cache record for {key} is corrupt: {reason}")]
    CorruptCacheRecord { key: String, reason: String },

    /// A subprocess (compiler, assembler, linker, generator script) exited
    /// non-zero. Fatal: triggers fail-fast shutdown of the scheduler.
    #[error("{tool} failed on {target} with {status}\n{stderr}")]
    Build { target: PathBuf, tool: PathBuf, status: ExitStatus, stderr: String },

    /// The persistence store could not be opened or written. Fatal.
    #[error("persistence error at {path}: {reason}")]
    Persistence { path: PathBuf, reason: String },

    /// Probing the host for a compiler/assembler/linker or its system
    /// include directories failed. Fatal, reported with the offending tool.
    #[error("host probe failed for {tool}: {reason}")]
    HostProbe { tool: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl BuildError {
    pub fn configuration(msg: impl std::fmt::Display) -> Self {
        Self::Configuration(msg.to_string())
    }

    pub fn discovery(file: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::Discovery { file: file.into(), reason: reason.to_string() }
    }

    pub fn persistence(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::Persistence { path: path.into(), reason: reason.to_string() }
    }

    pub fn host_probe(tool: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::HostProbe { tool: tool.into(), reason: reason.to_string() }
    }

    /// Whether this error should abort the entire scheduler run (fail-fast)
    /// rather than being attributed to a single target.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Discovery { .. } | Self::CorruptCacheRecord { .. })
    }
}
