//! CLI subcommand definitions and handlers.
//!
//! Implements a git-like subcommand architecture:
//! - `vulnscan scan --target <target>` - Assess a target
//! - `vulnscan validate <target>` - Resolve a target and look up its addresses
//! - `vulnscan show <report>` - Render a saved report

mod scan;
mod show;
mod validate;

pub use scan::ScanCommand;
pub use show::ShowCommand;
pub use validate::ValidateCommand;

use crate::config::{AppSettings, Paths};
use crate::error::CliResult;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// vulnscan - A network vulnerability assessment tool.
///
/// Checks a web target's security headers, TLS configuration, open ports
/// (through nmap), and exposed paths, then writes a JSON report.
#[derive(Parser, Debug)]
#[command(name = "vulnscan")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A vulnerability assessment scanner", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to custom settings file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a target
    #[command(alias = "s")]
    Scan(ScanCommand),

    /// Check that a target resolves
    #[command(alias = "v")]
    Validate(ValidateCommand),

    /// Render a saved report
    Show(ShowCommand),
}

/// Load settings from `--config` if given, else from the XDG location.
pub fn load_settings(config: Option<&Path>) -> CliResult<AppSettings> {
    let settings = match config {
        Some(path) => AppSettings::load_from(path)?,
        None => AppSettings::load(&Paths::discover()?)?,
    };
    Ok(settings)
}
