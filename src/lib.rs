//! # vulnscan - A Network Vulnerability Assessment Engine
//!
//! vulnscan inspects a single target and aggregates what it finds into one
//! report.
//!
//! ## Features
//!
//! - **Security Headers**: A data-driven policy of expected response headers
//! - **TLS Analysis**: Protocol support per version, certificate validity, weak ciphers
//! - **Port Enumeration**: Delegated to nmap, parsed from its XML output
//! - **Path Probing**: A bounded worker pool over a wordlist, in wordlist order
//! - **Failure Isolation**: A failing module is recorded, never fatal to the scan
//! - **Multiple Output Formats**: JSON report file, plain text, and CSV
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use vulnscan::report::ReportBuilder;
//! use vulnscan::scanner::{CancelToken, ModuleSet, Orchestrator, PortScanMode, ScanConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let orchestrator = Orchestrator::new(ScanConfig::default())?;
//!     let modules = ModuleSet::default().with_headers().with_tls();
//!
//!     let report = orchestrator
//!         .scan("https://example.com", &modules, &CancelToken::new())
//!         .await?;
//!
//!     println!("{}", ReportBuilder::to_json(&report)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Targets, ports, severities, and finding types
//! - [`scanner`] - The scan modules and the orchestrator that runs them
//! - [`report`] - The aggregated report and its JSON wire format
//! - [`config`] - Persisted settings
//! - [`error`] - Error types
//! - [`output`] - Report rendering

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod report;
pub mod scanner;
pub mod services;
pub mod types;

// Re-export commonly used types
pub use error::{CliError, ModuleError, ScanError, TargetError};
pub use report::{ModuleName, ReportBuilder, ScanReport, ScanStatus};
pub use scanner::{CancelToken, ModuleSet, Orchestrator, PortScanMode, ScanConfig};
pub use types::{Finding, Port, PortSpec, ScanId, Severity, Target};
