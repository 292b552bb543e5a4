//! Plain text output formatting.
//!
//! Produces human-readable output with colors and a live progress bar.
//! Open ports are announced as they arrive; the sorted table is printed once
//! the session completes.

use super::Renderer;
use crate::scanner::{OpenPort, ScanEvent, ScanParams, ScanSummary, SessionState};
use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, Write};

const RULE: &str = "═══════════════════════════════════════════════════════════════";
const THIN_RULE: &str = "───────────────────────────────────────────────────────────────";

/// Renders events as a progress bar followed by a results table.
pub struct PlainRenderer<W: Write> {
    out: W,
    progress: ProgressBar,
    results: Vec<OpenPort>,
}

impl<W: Write> PlainRenderer<W> {
    /// `show_progress` draws the bar on stderr; otherwise it stays hidden.
    pub fn new(out: W, show_progress: bool) -> Self {
        let progress = if show_progress {
            let pb = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr());
            pb.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
            );
            pb
        } else {
            ProgressBar::hidden()
        };
        Self {
            out,
            progress,
            results: Vec::new(),
        }
    }

    fn print_summary(&mut self, summary: &ScanSummary) -> io::Result<()> {
        self.results.sort_by_key(|r| (r.ip, r.port));
        let out = &mut self.out;

        writeln!(out)?;
        writeln!(out, "{}", style(RULE).cyan())?;
        writeln!(
            out,
            "                   {} Scan Results",
            style("portsweep").cyan().bold()
        )?;
        writeln!(out, "{}", style(RULE).cyan())?;
        writeln!(out)?;

        writeln!(
            out,
            "  {} {}",
            style("Session:").bold(),
            style(summary.session_id.short()).dim()
        )?;
        let state = match summary.state {
            SessionState::Completed => style(summary.state.to_string()).green(),
            SessionState::Cancelled => style(summary.state.to_string()).yellow(),
        };
        writeln!(out, "  {} {}", style("State:").bold(), state)?;
        writeln!(
            out,
            "  {} {}/{} units probed in {:.2}s, {} open",
            style("Statistics:").bold(),
            summary.dispatched,
            summary.total_units,
            summary.duration_ms as f64 / 1000.0,
            style(summary.total_open).green().bold()
        )?;
        writeln!(out)?;

        if self.results.is_empty() {
            writeln!(out, "  {}", style("No open ports found.").dim())?;
        } else {
            writeln!(out, "  {}", style(THIN_RULE).dim())?;
            writeln!(
                out,
                "  {:<15}  {:>5}  {:<24}  {}",
                style("ADDRESS").bold(),
                style("PORT").bold(),
                style("HOSTNAME").bold(),
                style("SERVICE").bold()
            )?;
            writeln!(out, "  {}", style(THIN_RULE).dim())?;
            for result in &self.results {
                writeln!(
                    out,
                    "  {:<15}  {:>5}  {:<24}  {}",
                    result.ip.to_string(),
                    style(result.port).green().bold(),
                    truncate_string(&result.hostname, 24),
                    result.service
                )?;
            }
            writeln!(out, "  {}", style(THIN_RULE).dim())?;
        }

        writeln!(out)?;
        writeln!(out, "{}", style(RULE).cyan())?;
        writeln!(out)?;
        out.flush()
    }
}

impl<W: Write> Renderer for PlainRenderer<W> {
    fn render(&mut self, event: &ScanEvent) -> io::Result<()> {
        match event {
            ScanEvent::Progress(p) => {
                self.progress.set_length(p.total);
                self.progress.set_position(p.dispatched);
            }
            ScanEvent::OpenPort(open) => {
                self.progress
                    .set_message(format!("open: {}:{}", open.ip, open.port));
                self.results.push(open.clone());
            }
            ScanEvent::Completed(summary) => {
                self.progress.finish_and_clear();
                self.print_summary(summary)?;
            }
            ScanEvent::ValidationError { message } => {
                self.progress.finish_and_clear();
                writeln!(
                    self.out,
                    "{} {}",
                    style("Invalid scan request:").red().bold(),
                    message
                )?;
            }
        }
        Ok(())
    }
}

/// Print a scan header before scanning begins.
pub fn print_scan_header(params: &ScanParams) {
    println!();
    println!(
        "{} {} v{}",
        style("Starting").cyan(),
        style("portsweep").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!(
        "{} Range: {} - {}",
        style("•").dim(),
        style(&params.start_ip).white().bold(),
        style(&params.end_ip).white().bold()
    );
    let common = if params.include_common_ports {
        " + well-known"
    } else {
        ""
    };
    println!(
        "{} Ports: {}{}",
        style("•").dim(),
        truncate_string(&params.ports, 48),
        common
    );
    println!(
        "{} Up to {} probes in flight, {}ms timeout",
        style("•").dim(),
        style(params.max_concurrency).white().bold(),
        params.timeout_ms
    );
    println!();
}

/// Print catalog entries as a two-column table.
pub fn print_services<'a>(
    out: &mut impl Write,
    entries: impl IntoIterator<Item = (u16, &'a str)>,
) -> io::Result<()> {
    writeln!(out, "  {:>5}  {}", style("PORT").bold(), style("SERVICE").bold())?;
    for (port, name) in entries {
        writeln!(out, "  {:>5}  {}", port, name)?;
    }
    out.flush()
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}

/// Print an info message.
pub fn print_info(msg: &str) {
    eprintln!("{} {}", style("ℹ").blue().bold(), msg);
}

/// Truncate a string to at most `max_len` characters, adding an ellipsis if cut.
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
