// ABOUTME: Sequential execution of an ordered command list on one connection.
// ABOUTME: Aggregates index-aligned results with a sticky any-failed flag.

use super::client::Connection;
use super::error::{Error, Result};
use super::exec::CommandChannel;

/// What a batch does when a command hits a given class of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop running further commands.
    Abort,
    /// Record the failure and move on to the next command.
    Continue,
}

/// One command of a batch that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    /// Position of the command in the submitted list.
    pub index: usize,
    pub command: String,
    pub reason: String,
}

/// Results of a batch run.
///
/// `results()[i]` belongs to `commands[i]`; commands that failed or never
/// ran are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    results: Vec<Option<String>>,
    failures: Vec<CommandFailure>,
    any_failed: bool,
}

impl BatchOutcome {
    fn with_len(len: usize) -> Self {
        Self {
            results: vec![None; len],
            failures: Vec::new(),
            any_failed: false,
        }
    }

    /// Number of submitted commands.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn results(&self) -> &[Option<String>] {
        &self.results
    }

    /// Result of the command at `index`, if it succeeded.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.results.get(index)?.as_deref()
    }

    /// Successful results in command order.
    pub fn successes(&self) -> impl Iterator<Item = &str> {
        self.results.iter().filter_map(|r| r.as_deref())
    }

    pub fn failures(&self) -> &[CommandFailure] {
        &self.failures
    }

    /// True once any command has failed; never reset.
    pub fn any_failed(&self) -> bool {
        self.any_failed
    }

    pub fn into_results(self) -> Vec<Option<String>> {
        self.results
    }

    fn record_success(&mut self, index: usize, output: String) {
        self.results[index] = Some(output);
    }

    fn record_failure(&mut self, failure: CommandFailure) {
        self.any_failed = true;
        self.failures.push(failure);
    }
}

/// Runs commands one at a time, each on its own session.
///
/// By default a session that cannot be opened aborts the whole batch with
/// [`Error::Session`] and no results, while a failing command is recorded and
/// the batch carries on.
#[derive(Debug, Clone, Copy)]
pub struct BatchRunner {
    on_session_error: FailurePolicy,
    on_command_error: FailurePolicy,
}

impl Default for BatchRunner {
    fn default() -> Self {
        Self {
            on_session_error: FailurePolicy::Abort,
            on_command_error: FailurePolicy::Continue,
        }
    }
}

impl BatchRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_session_error(mut self, policy: FailurePolicy) -> Self {
        self.on_session_error = policy;
        self
    }

    pub fn on_command_error(mut self, policy: FailurePolicy) -> Self {
        self.on_command_error = policy;
        self
    }

    /// Run `commands` in order. Each successful output is trimmed and
    /// suffixed with `delimiter`.
    ///
    /// Returns [`Error::Batch`] with the partial outcome if any command
    /// failed.
    pub async fn run<C, S>(
        &self,
        channel: &mut C,
        commands: &[S],
        delimiter: &str,
    ) -> Result<BatchOutcome>
    where
        C: CommandChannel + ?Sized,
        S: AsRef<str> + Sync,
    {
        let mut outcome = BatchOutcome::with_len(commands.len());

        for (index, command) in commands.iter().enumerate() {
            let command = command.as_ref();

            let (policy, reason) = match channel.exec(command).await {
                Ok(output) if output.success() => {
                    outcome.record_success(index, format!("{}{delimiter}", output.stdout.trim()));
                    continue;
                }
                Ok(output) => (
                    self.on_command_error,
                    format!("exited with status {}", output.exit_code),
                ),
                Err(Error::Session(reason)) => match self.on_session_error {
                    FailurePolicy::Abort => {
                        tracing::error!(command, error = %reason, "failed to open session, aborting batch");
                        return Err(Error::Session(reason));
                    }
                    FailurePolicy::Continue => (FailurePolicy::Continue, reason),
                },
                Err(Error::Execution { reason, .. }) => (self.on_command_error, reason),
                Err(e) => (self.on_command_error, e.to_string()),
            };

            tracing::warn!(index, command, error = %reason, "command failed");
            outcome.record_failure(CommandFailure {
                index,
                command: command.to_string(),
                reason,
            });

            if policy == FailurePolicy::Abort {
                tracing::warn!(
                    remaining = commands.len() - index - 1,
                    "stopping batch after failure"
                );
                break;
            }
        }

        if outcome.any_failed() {
            Err(Error::Batch(outcome))
        } else {
            Ok(outcome)
        }
    }
}

/// Run `commands` with the default failure policies. See [`BatchRunner`].
pub async fn run_batch<C, S>(channel: &mut C, commands: &[S], delimiter: &str) -> Result<BatchOutcome>
where
    C: CommandChannel + ?Sized,
    S: AsRef<str> + Sync,
{
    BatchRunner::default().run(channel, commands, delimiter).await
}

impl Connection {
    /// Run a batch of commands with the default failure policies.
    pub async fn run_batch<S>(&mut self, commands: &[S], delimiter: &str) -> Result<BatchOutcome>
    where
        S: AsRef<str> + Sync,
    {
        run_batch(self, commands, delimiter).await
    }
}
