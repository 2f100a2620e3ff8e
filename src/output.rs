// ABOUTME: Output formatting for command results and CLI feedback.
// ABOUTME: Supports normal, quiet, and JSON output modes.

use crate::ssh::BatchOutcome;
use serde::Serialize;
use std::io::Write;
use std::time::Instant;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Results on stdout, progress and failures on stderr
    Normal,
    /// Results only
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Print a progress message (normal mode only, to stderr).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            eprintln!("{message}");
        }
    }

    /// Print the output of a single command verbatim.
    pub fn command_output(&self, command: &str, output: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                print!("{output}");
                let _ = std::io::stdout().flush();
            }
            OutputMode::Json => self.emit(&CommandEvent {
                event: "result",
                index: 0,
                command,
                output: Some(output),
                error: None,
                duration_secs: self.duration(),
            }),
        }
    }

    /// Print every successful batch result in order, and failures.
    pub fn batch(&self, commands: &[String], outcome: &BatchOutcome) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                for result in outcome.successes() {
                    print!("{result}");
                }
                let _ = std::io::stdout().flush();
                if self.mode == OutputMode::Normal {
                    for failure in outcome.failures() {
                        eprintln!("Failed to execute {}: {}", failure.command, failure.reason);
                    }
                }
            }
            OutputMode::Json => {
                for (index, command) in commands.iter().enumerate() {
                    let failure = outcome.failures().iter().find(|f| f.index == index);
                    let output = outcome.get(index);
                    if output.is_none() && failure.is_none() {
                        // never ran
                        continue;
                    }
                    self.emit(&CommandEvent {
                        event: if failure.is_some() { "failure" } else { "result" },
                        index,
                        command,
                        output,
                        error: failure.map(|f| f.reason.as_str()),
                        duration_secs: None,
                    });
                }
            }
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => {
                let event = ErrorEvent {
                    event: "error",
                    message,
                    duration_secs: self.duration(),
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }

    fn duration(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    fn emit(&self, event: &CommandEvent<'_>) {
        if let Ok(json) = serde_json::to_string(event) {
            println!("{json}");
        }
    }
}

#[derive(Serialize)]
struct CommandEvent<'a> {
    event: &'a str,
    index: usize,
    command: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

#[derive(Serialize)]
struct ErrorEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}
