//! Lintgate CLI - hook entry point and maintenance commands

mod commands;

use std::path::PathBuf;

use clap::Parser;
use lintgate_core::tracing_setup::{CliLogLevel, init_tracing};

/// Lints files written by a coding agent and reports findings back to it.
///
/// Without a subcommand, reads one hook event from stdin.
#[derive(Parser)]
#[command(name = "lintgate")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<commands::Commands>,

    /// Additional configuration file, applied last
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Hook processing timeout, e.g. "60s" or "2m"
    #[arg(long, global = true)]
    timeout: Option<String>,

    /// Console log level (logs go to stderr)
    #[arg(long, global = true, value_enum, default_value_t = CliLogLevel::Warn)]
    log_level: CliLogLevel,

    /// Write a full trace log to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.log_level.as_tracing_level(), cli.log_file.as_deref()) {
        eprintln!("lintgate: failed to initialize logging: {e}");
    }

    let options = commands::GlobalOptions {
        config: cli.config,
        timeout: cli.timeout,
    };
    let command = cli.command.unwrap_or(commands::Commands::Hook);

    let code = match commands::handle_command(command, &options).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("lintgate: {e:#}");
            1
        }
    };
    std::process::exit(code);
}
