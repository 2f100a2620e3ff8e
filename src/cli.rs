// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines connection flags and the run/batch subcommands.

use clap::{Args, Parser, Subcommand, ValueEnum};
use sshbatch::output::OutputMode;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "sshbatch")]
#[command(about = "Run commands on a remote host over SSH")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Path to a sshbatch.yml file (default: ./sshbatch.yml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Normal, global = true)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct ConnectionArgs {
    /// Remote host as [user@]host[:port]
    #[arg(short = 'H', long, global = true)]
    pub host: Option<String>,

    /// Username
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    /// SSH port
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Password (ignored when a key is given)
    #[arg(long, env = "SSHBATCH_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// Private key file
    #[arg(short = 'i', long, visible_alias = "keypath", global = true)]
    pub key_path: Option<PathBuf>,

    /// Passphrase for an encrypted key (prompted for if omitted)
    #[arg(long, env = "SSHBATCH_KEY_PASSPHRASE", hide_env_values = true, global = true)]
    pub key_passphrase: Option<String>,

    /// Connect timeout, e.g. "10s" ("0" disables it)
    #[arg(long, value_parser = parse_duration, global = true)]
    pub connect_timeout: Option<Duration>,

    /// Per-command timeout, e.g. "5m" ("0" disables it)
    #[arg(long, value_parser = parse_duration, global = true)]
    pub command_timeout: Option<Duration>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a single command and print its standard output
    Run {
        /// Command line to execute remotely
        command: String,
    },

    /// Run commands in order, printing each trimmed result followed by the delimiter
    Batch {
        /// Commands to execute (default: `commands` from the config file)
        commands: Vec<String>,

        /// Appended to every result (default: newline)
        #[arg(short, long)]
        delimiter: Option<String>,

        /// Stop at the first failing command
        #[arg(long)]
        fail_fast: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Normal,
    Quiet,
    Json,
}

impl From<OutputFormat> for OutputMode {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Normal => OutputMode::Normal,
            OutputFormat::Quiet => OutputMode::Quiet,
            OutputFormat::Json => OutputMode::Json,
        }
    }
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    if s.trim() == "0" {
        return Ok(Duration::ZERO);
    }
    humantime_serde::re::humantime::parse_duration(s).map_err(|e| e.to_string())
}
