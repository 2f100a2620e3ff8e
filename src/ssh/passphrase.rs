// ABOUTME: Passphrase prompting with a bounded retry loop for encrypted private keys.
// ABOUTME: Sources are pluggable so non-interactive callers never block on a terminal.

use super::error::{Error, Result};
use std::fmt::Display;
use zeroize::Zeroizing;

/// Attempts allowed before giving up on an encrypted key.
pub const MAX_PASSPHRASE_ATTEMPTS: u32 = 3;

/// Somewhere to get key passphrases from.
pub trait PassphraseSource: Send {
    /// Read one passphrase. Implementations must not echo it.
    fn read_passphrase(&mut self, prompt: &str) -> std::io::Result<Zeroizing<String>>;

    /// Show an operator-facing notice. Ignored by default.
    fn notice(&mut self, _message: &str) {}
}

/// Reads passphrases from the controlling terminal with echo disabled.
///
/// Blocks the calling thread until the operator answers.
#[derive(Debug, Default)]
pub struct TerminalPassphrase;

impl PassphraseSource for TerminalPassphrase {
    fn read_passphrase(&mut self, prompt: &str) -> std::io::Result<Zeroizing<String>> {
        rpassword::prompt_password(prompt).map(Zeroizing::new)
    }

    fn notice(&mut self, message: &str) {
        eprintln!("{message}");
    }
}

/// Hands out the same pre-supplied passphrase on every request.
pub struct FixedPassphrase(Zeroizing<String>);

impl FixedPassphrase {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self(Zeroizing::new(passphrase.into()))
    }
}

impl std::fmt::Debug for FixedPassphrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FixedPassphrase(<redacted>)")
    }
}

impl PassphraseSource for FixedPassphrase {
    fn read_passphrase(&mut self, _prompt: &str) -> std::io::Result<Zeroizing<String>> {
        Ok(self.0.clone())
    }
}

/// Where the prompt loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptState {
    /// No attempt has failed yet.
    Prompting,
    /// At least one attempt failed and more are allowed.
    Retrying,
    /// The attempt budget is spent.
    Exhausted,
}

/// Attempt counter for the prompt loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    attempts: u32,
    max_attempts: u32,
}

impl RetryState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn state(&self) -> PromptState {
        if self.attempts >= self.max_attempts {
            PromptState::Exhausted
        } else if self.attempts == 0 {
            PromptState::Prompting
        } else {
            PromptState::Retrying
        }
    }

    /// Count a failed attempt and return the resulting state.
    pub fn record_failure(&mut self) -> PromptState {
        self.attempts = self.attempts.saturating_add(1);
        self.state()
    }
}

impl Default for RetryState {
    fn default() -> Self {
        Self::new(MAX_PASSPHRASE_ATTEMPTS)
    }
}

/// Drives a [`PassphraseSource`] until a decryption attempt succeeds or the
/// retry budget runs out.
pub struct PassphrasePrompt<'a> {
    source: &'a mut dyn PassphraseSource,
    prompt: String,
    retry: RetryState,
}

impl<'a> PassphrasePrompt<'a> {
    pub fn new(source: &'a mut dyn PassphraseSource, prompt: impl Into<String>) -> Self {
        Self {
            source,
            prompt: prompt.into(),
            retry: RetryState::default(),
        }
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.retry = RetryState::new(max_attempts);
        self
    }

    pub fn retry_state(&self) -> RetryState {
        self.retry
    }

    /// Prompt and call `attempt` with each passphrase until it succeeds.
    ///
    /// Fails with [`Error::Auth`] once the attempt budget is spent or the
    /// source cannot be read.
    pub fn run<T, E, F>(&mut self, mut attempt: F) -> Result<T>
    where
        F: FnMut(&str) -> std::result::Result<T, E>,
        E: Display,
    {
        loop {
            match self.retry.state() {
                PromptState::Exhausted => {
                    return Err(Error::Auth(format!(
                        "too many passphrase attempts ({})",
                        self.retry.attempts()
                    )));
                }
                PromptState::Retrying => self.source.notice("Wrong passphrase, try again"),
                PromptState::Prompting => {}
            }

            let passphrase = self
                .source
                .read_passphrase(&self.prompt)
                .map_err(|e| Error::Auth(format!("failed to read passphrase: {e}")))?;

            match attempt(passphrase.as_str()) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    tracing::debug!(
                        attempt = self.retry.attempts() + 1,
                        error = %e,
                        "passphrase rejected"
                    );
                    self.retry.record_failure();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct Scripted {
        answers: VecDeque<&'static str>,
        prompts: usize,
        notices: Vec<String>,
    }

    impl Scripted {
        fn new(answers: &[&'static str]) -> Self {
            Self {
                answers: answers.iter().copied().collect(),
                ..Default::default()
            }
        }
    }

    impl PassphraseSource for Scripted {
        fn read_passphrase(&mut self, _prompt: &str) -> std::io::Result<Zeroizing<String>> {
            self.prompts += 1;
            self.answers
                .pop_front()
                .map(|s| Zeroizing::new(s.to_string()))
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "no input"))
        }

        fn notice(&mut self, message: &str) {
            self.notices.push(message.to_string());
        }
    }

    fn unlock(passphrase: &str) -> std::result::Result<&'static str, &'static str> {
        if passphrase == "right" {
            Ok("plaintext")
        } else {
            Err("bad decrypt")
        }
    }

    #[test]
    fn retry_state_walks_through_states() {
        let mut retry = RetryState::default();
        assert_eq!(retry.state(), PromptState::Prompting);
        assert_eq!(retry.record_failure(), PromptState::Retrying);
        assert_eq!(retry.record_failure(), PromptState::Retrying);
        assert_eq!(retry.record_failure(), PromptState::Exhausted);
        assert_eq!(retry.attempts(), 3);
    }

    #[test]
    fn zero_budget_is_exhausted_immediately() {
        assert_eq!(RetryState::new(0).state(), PromptState::Exhausted);
    }

    #[test]
    fn correct_passphrase_on_any_allowed_attempt_succeeds() {
        for k in 1..=3 {
            let mut answers = vec!["wrong"; k - 1];
            answers.push("right");
            let mut source = Scripted::new(&answers);

            let mut prompt = PassphrasePrompt::new(&mut source, "Passphrase: ");
            let plaintext = prompt.run(unlock).unwrap();
            assert_eq!(plaintext, "plaintext");
            assert_eq!(prompt.retry_state().attempts(), (k - 1) as u32);

            assert_eq!(source.prompts, k);
            assert_eq!(source.notices.len(), k - 1);
        }
    }

    #[test]
    fn three_wrong_passphrases_fail_with_auth_error() {
        let mut source = Scripted::new(&["a", "b", "c", "right"]);
        let err = PassphrasePrompt::new(&mut source, "Passphrase: ")
            .run(unlock)
            .unwrap_err();

        assert!(matches!(err, Error::Auth(_)), "got {err:?}");
        assert!(err.to_string().contains("too many"));
        assert_eq!(source.prompts, 3, "must not prompt a fourth time");
        assert_eq!(source.notices, vec!["Wrong passphrase, try again"; 2]);
    }

    #[test]
    fn unreadable_source_is_auth_error() {
        let mut source = Scripted::new(&[]);
        let err = PassphrasePrompt::new(&mut source, "Passphrase: ")
            .run(unlock)
            .unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[test]
    fn fixed_source_repeats_its_passphrase() {
        let mut source = FixedPassphrase::new("right");
        let value = PassphrasePrompt::new(&mut source, "")
            .max_attempts(1)
            .run(unlock)
            .unwrap();
        assert_eq!(value, "plaintext");
        assert_eq!(format!("{source:?}"), "FixedPassphrase(<redacted>)");
    }
}
