use std::path::PathBuf;
use thiserror::Error;

/// Fatal conditions. Everything scoped to a single record, term, or embedding
/// call is absorbed near where it happens and surfaces only as a diagnostic;
/// these variants are the failures that terminate an operation.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("index not found at {path}: missing {artifact}")]
    IndexNotFound {
        path: PathBuf,
        artifact: &'static str,
    },

    #[error("unknown embedding model '{0}'")]
    ModelInitialization(String),

    #[error("source file not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("failed to write index artifact {artifact}: {reason}")]
    Persist {
        artifact: &'static str,
        reason: String,
    },

    #[error("corrupt index artifact {artifact}: {reason}")]
    Corrupt {
        artifact: &'static str,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A value that may have survived an absorbed failure.
///
/// Best-effort stages (embedding calls, expansion lookups) always hand their
/// caller something usable; when the real operation failed, `value` is the
/// substitute default and `failure` says why. Callers log the reason and move
/// on.
#[derive(Debug, Clone)]
pub struct Recovered<T> {
    pub value: T,
    pub failure: Option<String>,
}

impl<T> Recovered<T> {
    pub fn ok(value: T) -> Self {
        Self {
            value,
            failure: None,
        }
    }

    pub fn absorbed(value: T, reason: impl Into<String>) -> Self {
        Self {
            value,
            failure: Some(reason.into()),
        }
    }
}
