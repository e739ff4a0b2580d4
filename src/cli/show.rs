//! Show subcommand implementation.

use crate::error::CliResult;
use crate::output::{self, OutputFormat};
use crate::report::ReportBuilder;
use clap::Parser;
use std::path::PathBuf;

/// Render a previously written report.
#[derive(Parser, Debug)]
pub struct ShowCommand {
    /// Report file written by `vulnscan scan`
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

impl ShowCommand {
    pub fn execute(&self) -> CliResult<()> {
        let report = ReportBuilder::read(&self.file)?;
        output::print_report(&report, self.format)
    }
}
