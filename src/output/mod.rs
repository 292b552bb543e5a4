//! Output formatting module.
//!
//! Renders the scan event stream as plain text, JSON lines, or CSV. Results
//! go to stdout; the progress bar and diagnostics go to stderr.

mod csv_format;
mod json_format;
mod plain;

pub use csv_format::CsvRenderer;
pub use json_format::JsonRenderer;
pub use plain::{
    print_error, print_info, print_scan_header, print_services, print_warning, PlainRenderer,
};

use crate::cli::OutputFormat;
use crate::scanner::ScanEvent;
use std::io;

/// Consumes scan events as they arrive.
pub trait Renderer {
    fn render(&mut self, event: &ScanEvent) -> io::Result<()>;
}

/// Build the stdout renderer for `format`.
pub fn renderer(format: OutputFormat, show_progress: bool) -> Box<dyn Renderer> {
    match format {
        OutputFormat::Plain => Box::new(PlainRenderer::new(io::stdout(), show_progress)),
        OutputFormat::Json => Box::new(JsonRenderer::new(io::stdout())),
        OutputFormat::Csv => Box::new(CsvRenderer::new(io::stdout())),
    }
}
