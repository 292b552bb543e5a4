//! CLI subcommand definitions and handlers.
//!
//! Implements a git-like subcommand architecture:
//! - `portsweep scan` - Sweep an address range for open TCP ports
//! - `portsweep services [PORT]` - Show the well-known service catalog

mod scan;
mod services;

pub use scan::ScanCommand;
pub use services::ServicesCommand;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// portsweep - a concurrent TCP port and service scanner.
///
/// Sweeps an IPv4 range across a set of ports with bounded concurrency,
/// names what answers, and streams results as they are found.
#[derive(Parser, Debug)]
#[command(name = "portsweep")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A concurrent TCP port and service scanner", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to custom configuration file
    #[arg(long, global = true, value_name = "PATH", env = "PORTSWEEP_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan an address range for open ports
    #[command(alias = "s")]
    Scan(ScanCommand),

    /// List well-known services, or look one up by port
    Services(ServicesCommand),
}

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable plain text
    #[default]
    Plain,
    /// JSON lines, one event per line
    Json,
    /// CSV rows of open ports
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as clap::ValueEnum>::from_str(s, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_scan_flags() {
        let cli = Cli::try_parse_from([
            "portsweep", "-v", "scan", "--start", "10.0.0.1", "--end", "10.0.0.9", "-p", "22,80",
            "-c", "50", "-o", "json",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Scan(scan) => {
                assert_eq!(scan.start.as_deref(), Some("10.0.0.1"));
                assert_eq!(scan.ports.as_deref(), Some("22,80"));
                assert_eq!(scan.concurrency, Some(50));
                assert_eq!(scan.output, Some(OutputFormat::Json));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cidr_conflicts_with_start() {
        let result = Cli::try_parse_from([
            "portsweep", "scan", "--cidr", "10.0.0.0/24", "--start", "10.0.0.1",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
