// ABOUTME: Test support utilities.
// ABOUTME: Provides the in-process SSH server and scripted passphrase sources.

use sshbatch::ssh::PassphraseSource;
use std::collections::VecDeque;
use std::sync::Once;
use zeroize::Zeroizing;

// Each test binary only uses some of these modules, so allow dead_code.
#[allow(dead_code)]
pub mod ssh_server;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("sshbatch=debug".parse().unwrap())
            .add_directive("russh=info".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Answers passphrase prompts from a fixed script and records what it was asked.
#[allow(dead_code)]
#[derive(Default)]
pub struct ScriptedPassphrase {
    answers: VecDeque<String>,
    pub prompts: Vec<String>,
    pub notices: Vec<String>,
}

#[allow(dead_code)]
impl ScriptedPassphrase {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }
}

impl PassphraseSource for ScriptedPassphrase {
    fn read_passphrase(&mut self, prompt: &str) -> std::io::Result<Zeroizing<String>> {
        self.prompts.push(prompt.to_string());
        self.answers.pop_front().map(Zeroizing::new).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "script exhausted")
        })
    }

    fn notice(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }
}
