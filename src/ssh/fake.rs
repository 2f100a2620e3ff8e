// ABOUTME: Scripted command channel for unit tests.
// ABOUTME: Replays canned outputs and failures without a network connection.

use super::error::{Error, Result};
use super::exec::{CommandChannel, CommandOutput};
use async_trait::async_trait;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Output(CommandOutput),
    SessionFailure,
    ExecutionFailure,
}

impl Reply {
    pub(crate) fn ok(stdout: &str) -> Self {
        Self::exit(0, stdout)
    }

    pub(crate) fn exit(exit_code: u32, stdout: &str) -> Self {
        Reply::Output(CommandOutput {
            exit_code,
            stdout: stdout.to_string(),
            stderr: String::new(),
        })
    }
}

/// Answers `echo <text>` with `<text>\n` unless a reply was scripted.
#[derive(Debug, Default)]
pub(crate) struct ScriptedChannel {
    replies: HashMap<String, Reply>,
    pub(crate) executed: Vec<String>,
}

impl ScriptedChannel {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reply(mut self, command: &str, reply: Reply) -> Self {
        self.replies.insert(command.to_string(), reply);
        self
    }
}

#[async_trait]
impl CommandChannel for ScriptedChannel {
    async fn exec(&mut self, command: &str) -> Result<CommandOutput> {
        self.executed.push(command.to_string());

        let reply = match self.replies.get(command) {
            Some(reply) => reply.clone(),
            None => match command.strip_prefix("echo ") {
                Some(text) => Reply::ok(&format!("{text}\n")),
                None if command == "false" => Reply::exit(1, ""),
                None => Reply::exit(127, ""),
            },
        };

        match reply {
            Reply::Output(output) => Ok(output),
            Reply::SessionFailure => Err(Error::Session("channel open refused".to_string())),
            Reply::ExecutionFailure => Err(Error::execution(command, "connection reset")),
        }
    }
}
