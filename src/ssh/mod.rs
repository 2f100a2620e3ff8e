// ABOUTME: SSH client module for remote command execution.
// ABOUTME: Supports key-based (optionally encrypted) and password authentication.

mod batch;
mod client;
mod error;
mod exec;
#[cfg(test)]
mod fake;
mod key;
mod passphrase;
mod pem;

pub use batch::{BatchOutcome, BatchRunner, CommandFailure, FailurePolicy, run_batch};
pub use client::{Connection, ConnectionConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT};
pub use error::{Error, ErrorKind, Result};
pub use exec::{CommandChannel, CommandOutput, run_command};
pub use key::{SigningCredential, load_signing_key};
pub use passphrase::{
    FixedPassphrase, MAX_PASSPHRASE_ATTEMPTS, PassphrasePrompt, PassphraseSource, PromptState,
    RetryState, TerminalPassphrase,
};
pub use pem::PemBlock;
