//! Error types for sentinel-core.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::DeviationId;

/// Coarse classification used to pick an exit code and decide whether a
/// failure may ever be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Environment is unusable (not a repository, not initialised).
    Config,
    /// A structural rule refused the call; fix the precondition and re-run.
    Precondition,
    /// Persisted state is inconsistent or corrupt. Never auto-repaired.
    Integrity,
    /// Anything else (I/O, serialization).
    Runtime,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Precondition => write!(f, "precondition"),
            ErrorCategory::Integrity => write!(f, "integrity"),
            ErrorCategory::Runtime => write!(f, "runtime"),
        }
    }
}

/// All errors that can arise from state-directory operations.
#[derive(Debug, Error)]
pub enum StateError {
    /// I/O failure, with annotated path.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (write path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization error (write path).
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed YAML on load, with path and line context from serde_yaml.
    #[error("corrupt state file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Malformed JSON on load.
    #[error("corrupt state file {path}: {source}")]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// File parsed but violates a record invariant.
    #[error("corrupt state file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// The `.sentinel/` directory does not exist.
    #[error("no state directory at {path}; run `sentinel init` first")]
    NotInitialized { path: PathBuf },

    /// Another invocation holds the state lock.
    #[error("state directory is locked by another invocation ({holder}); remove {path} if that process is gone")]
    StateLocked { path: PathBuf, holder: String },

    /// A baseline already exists and the write was not an explicit overwrite.
    #[error("baseline already exists at {path}; capture again with an explicit overwrite")]
    BaselineExists { path: PathBuf },

    /// An open deviation was recorded again with a different description.
    #[error("deviation '{id}' is already open with a different description (existing: {existing:?}, incoming: {incoming:?})")]
    DuplicateIdConflict {
        id: DeviationId,
        existing: String,
        incoming: String,
    },
}

impl StateError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            StateError::NotInitialized { .. } => ErrorCategory::Config,
            StateError::StateLocked { .. } | StateError::BaselineExists { .. } => {
                ErrorCategory::Precondition
            }
            StateError::Parse { .. }
            | StateError::ParseJson { .. }
            | StateError::Corrupt { .. }
            | StateError::DuplicateIdConflict { .. } => ErrorCategory::Integrity,
            StateError::Io { .. } | StateError::Yaml(_) | StateError::Json(_) => {
                ErrorCategory::Runtime
            }
        }
    }
}

/// Convenience constructor for [`StateError::Io`].
pub fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StateError {
    StateError::Io { path: path.into(), source }
}
