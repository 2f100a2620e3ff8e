// ABOUTME: Application-wide error types for sshbatch.
// ABOUTME: Uses thiserror for ergonomic error handling.

use crate::ssh;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no commands given")]
    NoCommands,

    #[error(transparent)]
    Ssh(#[from] ssh::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Process exit code for this error.
    ///
    /// A batch with failed commands exits with 2, whether it ran to the end
    /// or stopped early under fail-fast. Everything else exits with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Ssh(e) if e.kind() == ssh::ErrorKind::Batch => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
