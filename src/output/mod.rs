//! Output formatting module.
//!
//! Provides formatters for plain text, JSON, and CSV rendering of scan reports.

mod csv_format;
mod json_format;
mod plain;

pub use csv_format::write_csv;
pub use json_format::write_json;
pub use plain::{print_error, print_info, print_scan_header, print_success, print_warning, write_plain};

use crate::error::CliResult;
use crate::report::ScanReport;
use std::fmt;
use std::io::{self, Write};

/// Output format for rendered reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable plain text
    #[default]
    Plain,
    /// The JSON report document
    Json,
    /// One CSV row per finding
    Csv,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

/// Render a report to `out` in the given format.
pub fn render<W: Write>(report: &ScanReport, format: OutputFormat, out: &mut W) -> CliResult<()> {
    match format {
        OutputFormat::Plain => write_plain(report, out)?,
        OutputFormat::Json => write_json(report, out)?,
        OutputFormat::Csv => write_csv(report, out)?,
    }
    Ok(())
}

/// Render a report to stdout.
pub fn print_report(report: &ScanReport, format: OutputFormat) -> CliResult<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    render(report, format, &mut out)
}
