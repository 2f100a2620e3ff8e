// ABOUTME: Entry point for the sshbatch CLI application.
// ABOUTME: Merges flags with the config file, connects, and prints command results.

mod cli;

use clap::Parser;
use cli::{Cli, Commands, ConnectionArgs};
use sshbatch::config::{Config, EnvValue, Target};
use sshbatch::error::{Error, Result};
use sshbatch::output::Output;
use sshbatch::ssh::{BatchRunner, Connection, ConnectionConfig, FailurePolicy};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mut output = Output::new(cli.output.into());
    output.start_timer();

    if let Err(e) = run(cli, &output).await {
        output.error(&e.to_string());
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli, output: &Output) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::discover(&env::current_dir()?)?.unwrap_or_default(),
    };
    apply_overrides(&mut config, cli.connection)?;

    let connection_config = config.connection_config()?;

    match cli.command {
        Commands::Run { command } => {
            let mut connection = connect(&connection_config, output).await?;
            let result = connection.run_command(&command).await;
            close(connection).await;

            output.command_output(&command, &result?);
            Ok(())
        }
        Commands::Batch {
            commands,
            delimiter,
            fail_fast,
        } => {
            let commands = if commands.is_empty() {
                config
                    .commands
                    .clone()
                    .map(Vec::from)
                    .ok_or(Error::NoCommands)?
            } else {
                commands
            };
            let delimiter = delimiter.unwrap_or_else(|| config.delimiter.clone());

            let runner = if fail_fast {
                BatchRunner::new().on_command_error(FailurePolicy::Abort)
            } else {
                BatchRunner::new()
            };

            let mut connection = connect(&connection_config, output).await?;
            let result = runner
                .run(&mut connection, commands.as_slice(), &delimiter)
                .await;
            close(connection).await;

            match result {
                Ok(outcome) => {
                    output.batch(&commands, &outcome);
                    Ok(())
                }
                Err(e) => {
                    if let Some(outcome) = e.batch_outcome() {
                        output.batch(&commands, outcome);
                    }
                    Err(e.into())
                }
            }
        }
    }
}

/// Layer command-line flags over values from the config file.
fn apply_overrides(config: &mut Config, args: ConnectionArgs) -> Result<()> {
    if let Some(host) = args.host {
        config.host = Some(Target::parse(&host).map_err(Error::InvalidConfig)?);
    }
    if args.user.is_some() {
        config.user = args.user;
    }
    if args.port.is_some() {
        config.port = args.port;
    }
    if let Some(password) = args.password {
        config.password = Some(EnvValue::Literal(password));
    }
    if args.key_path.is_some() {
        config.key_path = args.key_path;
    }
    if let Some(passphrase) = args.key_passphrase {
        config.key_passphrase = Some(EnvValue::Literal(passphrase));
    }
    if args.connect_timeout.is_some() {
        config.connect_timeout = args.connect_timeout;
    }
    if args.command_timeout.is_some() {
        config.command_timeout = args.command_timeout;
    }
    Ok(())
}

async fn connect(config: &ConnectionConfig, output: &Output) -> Result<Connection> {
    output.progress(&format!("Connecting to {}@{}...", config.user, config.address()));
    Ok(Connection::connect(config).await?)
}

/// Disconnect, logging rather than failing if the server is already gone.
async fn close(connection: Connection) {
    if let Err(e) = connection.close().await {
        tracing::warn!(error = %e, "disconnect failed");
    }
}
