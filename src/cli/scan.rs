//! Scan subcommand implementation.
//!
//! Handles `portsweep scan`: merges flags over the settings file, starts a
//! session, and renders its events until it finishes or Ctrl-C stops it.

use crate::cli::OutputFormat;
use crate::config::AppSettings;
use crate::error::{ScanError, ScanResult};
use crate::output;
use crate::scanner::{ScanEngine, ScanParams, ScanRequest, SessionState};
use crate::services::ServiceCatalog;
use crate::types::Ipv4Range;
use anyhow::{bail, Context};
use clap::Parser;
use std::sync::Arc;

/// Scan an address range for open ports.
///
/// Flags that are not given fall back to the settings file, then to the
/// built-in defaults.
#[derive(Parser, Debug, Default)]
pub struct ScanCommand {
    /// First address of the range
    #[arg(long, value_name = "IP", conflicts_with = "cidr")]
    pub start: Option<String>,

    /// Last address of the range (inclusive)
    #[arg(long, value_name = "IP", conflicts_with = "cidr")]
    pub end: Option<String>,

    /// Scan a whole network instead, e.g. 192.168.1.0/24
    #[arg(long, value_name = "NET")]
    pub cidr: Option<String>,

    /// Ports to scan (e.g., "80", "80,443", "1-1000", "22,80,8000-9000")
    #[arg(short, long)]
    pub ports: Option<String>,

    /// Also scan every port in the well-known service catalog
    #[arg(long)]
    pub common: bool,

    /// Connect timeout in milliseconds (100-9999)
    #[arg(short = 't', long)]
    pub timeout: Option<u64>,

    /// Maximum number of probes in flight (1-9999)
    #[arg(short = 'c', long)]
    pub concurrency: Option<usize>,

    /// Rate limit in probes per second (0 = unlimited)
    #[arg(short = 'r', long = "rate")]
    pub rate_limit: Option<u32>,

    /// Output format for results
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Store the effective parameters as the new defaults
    #[arg(long)]
    pub save_defaults: bool,
}

impl ScanCommand {
    /// Merge these flags over `settings`.
    pub fn params(&self, settings: &AppSettings) -> anyhow::Result<ScanParams> {
        let mut params = settings.scan.clone();

        if let Some(cidr) = &self.cidr {
            let range = Ipv4Range::from_cidr(cidr)?;
            params.start_ip = range.start().to_string();
            params.end_ip = range.end().to_string();
        }
        if let Some(start) = &self.start {
            params.start_ip.clone_from(start);
        }
        if let Some(end) = &self.end {
            params.end_ip.clone_from(end);
        }
        if let Some(ports) = &self.ports {
            params.ports.clone_from(ports);
        }
        params.include_common_ports |= self.common;
        if let Some(timeout) = self.timeout {
            params.timeout_ms = timeout;
        }
        if let Some(concurrency) = self.concurrency {
            params.max_concurrency = concurrency;
        }
        if let Some(rate) = self.rate_limit {
            params.rate_limit = rate;
        }
        Ok(params)
    }

    fn format(&self, settings: &AppSettings) -> OutputFormat {
        self.output.unwrap_or_else(|| {
            settings
                .default_output_format
                .parse()
                .unwrap_or_else(|_| {
                    output::print_warning(&format!(
                        "unknown output format '{}' in settings, using plain",
                        settings.default_output_format
                    ));
                    OutputFormat::Plain
                })
        })
    }

    /// Settings to persist for `--save-defaults`, if `params` would be accepted.
    fn defaults_to_store(
        &self,
        params: &ScanParams,
        format: OutputFormat,
        settings: &AppSettings,
        catalog: &ServiceCatalog,
    ) -> ScanResult<AppSettings> {
        ScanRequest::from_params(params, catalog)?;
        Ok(AppSettings {
            scan: params.clone(),
            default_output_format: format.to_string(),
            ..settings.clone()
        })
    }

    /// Execute the scan command.
    pub async fn execute(&self, settings: &AppSettings, quiet: bool) -> anyhow::Result<()> {
        let params = self.params(settings)?;
        let format = self.format(settings);

        let engine = ScanEngine::new(Arc::new(ServiceCatalog::builtin()))
            .with_lookup_timeout(settings.lookup_timeout());

        if self.save_defaults {
            // Rejected parameters are reported by the scan below.
            match self.defaults_to_store(&params, format, settings, engine.catalog()) {
                Ok(stored) => {
                    let path = stored.save().context("failed to save settings")?;
                    if !quiet {
                        output::print_info(&format!("Defaults saved to {}", path.display()));
                    }
                }
                Err(e) => output::print_warning(&format!("defaults not saved: {e}")),
            }
        }

        let plain = format == OutputFormat::Plain;
        if plain && !quiet {
            output::print_scan_header(&params);
        }

        let (handle, mut events) = engine.start(&params);
        let mut renderer = output::renderer(format, plain && !quiet);

        let cancel = handle.cancel_token();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                output::print_warning("interrupted, waiting for in-flight probes...");
                cancel.cancel();
            }
        });

        while let Some(event) = events.recv().await {
            renderer
                .render(&event)
                .context("failed to write scan output")?;
        }
        interrupt.abort();

        match handle.wait().await {
            Ok(summary) => {
                if summary.state == SessionState::Cancelled && !quiet {
                    output::print_info(&format!(
                        "Scan cancelled after {} of {} units",
                        summary.dispatched, summary.total_units
                    ));
                }
                Ok(())
            }
            Err(ScanError::InvalidRequest(_)) => bail!("scan was not started"),
            Err(e) => Err(e.into()),
        }
    }
}
