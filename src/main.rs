use anyhow::Context;
use clap::Parser;
use portsweep::cli::{Cli, Commands};
use portsweep::config::AppSettings;
use portsweep::output;
use portsweep::ConfigError;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::print_error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Scan(cmd) => {
            let settings = load_settings(&cli)?;
            cmd.execute(&settings, cli.quiet).await
        }
        Commands::Services(cmd) => cmd.execute(),
    }
}

fn load_settings(cli: &Cli) -> anyhow::Result<AppSettings> {
    match &cli.config {
        Some(path) => AppSettings::load_from(path)
            .with_context(|| format!("failed to load settings from {}", path.display())),
        None => match AppSettings::load() {
            Err(ConfigError::DirectoryNotFound) => {
                tracing::warn!("no configuration directory on this platform, using defaults");
                Ok(AppSettings::default())
            }
            other => other.context("failed to load settings"),
        },
    }
}

/// Logs go to stderr so JSON and CSV on stdout stay machine-readable.
fn init_tracing(verbose: bool) {
    let default = if verbose { "portsweep=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
