use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod core;
mod daemon;
mod providers;

#[derive(Parser)]
#[command(name = "turbod")]
#[command(author, version, about = "Buys turbo high-speed data within a daily cap")]
struct Cli {
    /// Path to config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the polling daemon
    Daemon,

    /// Show today's usage and what the daemon would do now
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Skip the account portal and show local state only
        #[arg(long)]
        offline: bool,
    },

    /// Show turbo purchases per day
    History {
        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Number of days to include (default: 30)
        #[arg(long, default_value = "30")]
        days: u32,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // JOURNAL_STREAM is set by systemd for services attached to the journal.
    let wants_journald = std::env::var_os("JOURNAL_STREAM").is_some();
    let journald = wants_journald
        .then(|| tracing_journald::layer().ok())
        .flatten();
    let fmt = journald
        .is_none()
        .then(|| tracing_subscriber::fmt::layer().with_writer(io::stderr));
    let fell_back = wants_journald && journald.is_none();

    tracing_subscriber::registry()
        .with(filter)
        .with(journald)
        .with(fmt)
        .init();

    if fell_back {
        tracing::warn!("Could not connect to journald, logging to stderr");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Daemon => {
            init_logging();
            daemon::run(config).await
        }
        Commands::Status { json, offline } => {
            init_logging();
            cli::status::run(config, json, offline).await
        }
        Commands::History { json, days } => {
            init_logging();
            cli::history::run(config, json, days)
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
    };

    exit_code(result)
}

/// Logs a fatal error once. Returning it from `main` would print it again.
fn exit_code(result: anyhow::Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "Exiting on fatal error");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_error_exits_non_zero() {
        assert_eq!(exit_code(Ok(())), ExitCode::SUCCESS);
        assert_eq!(
            exit_code(Err(anyhow::anyhow!("ledger is corrupt"))),
            ExitCode::FAILURE
        );
    }
}
