// ABOUTME: Single-command execution over a fresh SSH channel.
// ABOUTME: Captures stdout, stderr, and the exit status of one remote command.

use super::client::Connection;
use super::error::{Error, Result};
use async_trait::async_trait;
use russh::ChannelMsg;
use std::time::Duration;

/// Output from a remote command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code of the command.
    pub exit_code: u32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Something that can run one command per call on a fresh remote session.
///
/// Failing to open the session must be reported as [`Error::Session`] so
/// batch runs can tell it apart from a failing command.
#[async_trait]
pub trait CommandChannel: Send {
    async fn exec(&mut self, command: &str) -> Result<CommandOutput>;
}

#[async_trait]
impl CommandChannel for Connection {
    async fn exec(&mut self, command: &str) -> Result<CommandOutput> {
        let timeout = self.command_timeout;
        self.exec_with_timeout(command, timeout).await
    }
}

/// Run `command` and return its stdout, untrimmed.
///
/// A nonzero exit status is an [`Error::Execution`]; stderr is discarded.
pub async fn run_command<C>(channel: &mut C, command: &str) -> Result<String>
where
    C: CommandChannel + ?Sized,
{
    let output = channel.exec(command).await?;
    if !output.success() {
        return Err(Error::execution(
            command,
            format!("exited with status {}", output.exit_code),
        ));
    }
    Ok(output.stdout)
}

impl Connection {
    /// Execute a command on the remote host using the connection's command
    /// timeout.
    pub async fn exec(&mut self, command: &str) -> Result<CommandOutput> {
        CommandChannel::exec(self, command).await
    }

    /// Execute a command and return its stdout. See [`run_command`].
    pub async fn run_command(&mut self, command: &str) -> Result<String> {
        run_command(self, command).await
    }

    /// Execute a command with a custom timeout. `None` waits indefinitely.
    pub async fn exec_with_timeout(
        &mut self,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput> {
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, self.exec_inner(command)).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout {
                    operation: "command",
                    after: limit,
                }),
            },
            None => self.exec_inner(command).await,
        }
    }

    async fn exec_inner(&self, command: &str) -> Result<CommandOutput> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::Session(e.to_string()))?;

        tracing::debug!(address = %self.address, command, "running command");

        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::execution(command, format!("failed to start: {e}")))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = None;
        let mut exit_signal = None;
        let mut got_eof = false;

        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    stdout.extend_from_slice(&data);
                }
                Some(ChannelMsg::ExtendedData { data, ext }) => {
                    if ext == 1 {
                        // stderr
                        stderr.extend_from_slice(&data);
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    exit_code = Some(exit_status);
                    if got_eof {
                        break;
                    }
                }
                Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                    exit_signal = Some(format!("{signal_name:?}"));
                }
                Some(ChannelMsg::Failure) => {
                    return Err(Error::execution(command, "server refused to run the command"));
                }
                Some(ChannelMsg::Eof) => {
                    got_eof = true;
                    if exit_code.is_some() {
                        break;
                    }
                }
                Some(ChannelMsg::Close) => {
                    break;
                }
                Some(_) => {}
                None => break,
            }
        }

        let Some(exit_code) = exit_code else {
            let reason = match exit_signal {
                Some(signal) => format!("killed by signal {signal}"),
                None => "channel closed without an exit status".to_string(),
            };
            return Err(Error::execution(command, reason));
        };

        tracing::debug!(command, exit_code, "command finished");

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}
