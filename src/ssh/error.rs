// ABOUTME: SSH-specific error types.
// ABOUTME: Covers key loading, authentication, connection, and command execution failures.

use super::batch::BatchOutcome;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read key file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed key file: {0}")]
    Format(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("failed to open session: {0}")]
    Session(String),

    #[error("command `{command}` failed: {reason}")]
    Execution { command: String, reason: String },

    #[error("{} of {} commands failed", .0.failures().len(), .0.len())]
    Batch(BatchOutcome),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("SSH protocol error: {0}")]
    Transport(#[from] russh::Error),
}

/// Coarse classification of [`Error`], for callers that only need to branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Format,
    Auth,
    Connection,
    Session,
    Execution,
    Batch,
    Timeout,
    Transport,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io { .. } => ErrorKind::Io,
            Error::Format(_) => ErrorKind::Format,
            Error::Auth(_) => ErrorKind::Auth,
            Error::Connection(_) => ErrorKind::Connection,
            Error::Session(_) => ErrorKind::Session,
            Error::Execution { .. } => ErrorKind::Execution,
            Error::Batch(_) => ErrorKind::Batch,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Transport(_) => ErrorKind::Transport,
        }
    }

    /// Partial batch results, if this error came out of a batch run.
    pub fn batch_outcome(&self) -> Option<&BatchOutcome> {
        match self {
            Error::Batch(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub(crate) fn execution(command: &str, reason: impl Into<String>) -> Self {
        Error::Execution {
            command: command.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
