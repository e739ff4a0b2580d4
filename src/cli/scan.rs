//! Scan subcommand implementation.
//!
//! Handles `vulnscan scan --target <target>`: runs the selected modules and
//! writes the JSON report.

use crate::config::AppSettings;
use crate::error::CliResult;
use crate::output::{self, OutputFormat};
use crate::report::{ReportBuilder, ScanReport};
use crate::scanner::{CancelToken, ModuleSet, Orchestrator, PortScanMode, WordlistSource};
use crate::types::Target;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

/// Scan a target for vulnerabilities.
#[derive(Parser, Debug)]
pub struct ScanCommand {
    /// Target to scan
    ///
    /// Examples:
    ///   example.com                Hostname (HTTPS on port 443)
    ///   example.com:80             Host on port 80 (plain HTTP)
    ///   http://example.com:8080    URL
    ///   tcp://10.0.0.5:22          Raw TCP service (ports only)
    #[arg(short, long, value_name = "TARGET")]
    pub target: String,

    /// Run every module
    #[arg(short, long)]
    pub full_scan: bool,

    /// Check security headers
    #[arg(long)]
    pub headers: bool,

    /// Check the TLS configuration
    #[arg(long)]
    pub ssl: bool,

    /// Enumerate ports: "fast", "full", or a port list such as "22,80,8000-8100"
    #[arg(long, value_name = "MODE")]
    pub ports: Option<PortScanMode>,

    /// Probe common paths
    #[arg(long)]
    pub dirs: bool,

    /// Custom wordlist for path probing, one entry per line
    #[arg(short, long, value_name = "FILE")]
    pub wordlist: Option<PathBuf>,

    /// Report file (defaults to the configured output file)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Format for the report printed to stdout
    #[arg(long, value_enum, default_value = "plain")]
    pub format: OutputFormat,

    /// Concurrent path probes
    #[arg(short = 'c', long)]
    pub concurrency: Option<usize>,

    /// Path requests per second (0 = unlimited)
    #[arg(short = 'r', long = "rate")]
    pub rate_limit: Option<u32>,

    /// Also flag Server and X-Powered-By disclosure
    #[arg(long)]
    pub disclosure: bool,

    /// nmap executable to use
    #[arg(long, value_name = "PATH")]
    pub nmap: Option<PathBuf>,
}

impl ScanCommand {
    /// The modules selected by the flags. No selection means every module.
    pub fn module_set(&self) -> ModuleSet {
        let wordlist = self
            .wordlist
            .clone()
            .map(WordlistSource::File)
            .unwrap_or_default();

        if self.full_scan || !self.any_module_selected() {
            let mut all = ModuleSet::all(self.ports.clone().unwrap_or(PortScanMode::Fast));
            all.paths = Some(wordlist);
            return all;
        }

        let mut set = ModuleSet::default();
        if self.headers {
            set = set.with_headers();
        }
        if self.ssl {
            set = set.with_tls();
        }
        if let Some(mode) = &self.ports {
            set = set.with_ports(mode.clone());
        }
        if self.dirs {
            set = set.with_paths(wordlist);
        }
        set
    }

    fn any_module_selected(&self) -> bool {
        self.headers || self.ssl || self.dirs || self.ports.is_some()
    }

    /// Execute the scan command.
    pub async fn execute(
        &self,
        settings: &AppSettings,
        verbose: bool,
        quiet: bool,
    ) -> CliResult<ScanReport> {
        let target = Target::resolve(&self.target)?;

        if !self.full_scan && !self.any_module_selected() && !quiet {
            output::print_warning("No specific scan selected. Running full scan.");
        }
        let modules = self.module_set();

        let mut config = settings.scan_config().with_verbose(verbose && !quiet);
        if let Some(workers) = self.concurrency {
            config = config.with_path_concurrency(workers);
        }
        if let Some(rate) = self.rate_limit {
            config = config.with_rate_limit(rate);
        }
        if self.disclosure {
            config = config.with_disclosure_headers(true);
        }
        if let Some(nmap) = &self.nmap {
            config = config.with_nmap_binary(nmap.clone());
        }
        let orchestrator = Orchestrator::new(config)?;

        if !quiet && self.format == OutputFormat::Plain {
            let names: Vec<String> = modules.names().iter().map(|m| m.to_string()).collect();
            output::print_scan_header(&target.to_string(), &names);
        }

        let cancel = CancelToken::new();
        let interrupt = cancel.clone();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling scan");
                interrupt.cancel();
            }
        });

        let report = orchestrator.run(&target, &modules, &cancel).await;
        watcher.abort();

        let path = self.output.clone().unwrap_or_else(|| settings.output_file.clone());
        ReportBuilder::write(&report, &path)?;
        info!(path = %path.display(), status = %report.status(), "report written");

        if !quiet {
            output::print_report(&report, self.format)?;
            output::print_info(&format!("Report saved to {}", path.display()));
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ModuleName;

    fn parse(args: &[&str]) -> ScanCommand {
        let mut argv = vec!["scan"];
        argv.extend_from_slice(args);
        ScanCommand::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_no_selection_runs_everything() {
        let cmd = parse(&["--target", "example.com"]);
        let set = cmd.module_set();
        assert!(set.headers && set.tls);
        assert_eq!(set.ports, Some(PortScanMode::Fast));
        assert_eq!(set.paths, Some(WordlistSource::Default));
    }

    #[test]
    fn test_individual_modules() {
        let cmd = parse(&["-t", "example.com", "--ports", "full", "--dirs", "-w", "words.txt"]);
        let set = cmd.module_set();
        assert!(!set.headers);
        assert_eq!(
            set.names(),
            vec![ModuleName::Ports, ModuleName::Directories]
        );
        assert_eq!(set.ports, Some(PortScanMode::Full));
        assert_eq!(
            set.paths,
            Some(WordlistSource::File(PathBuf::from("words.txt")))
        );
    }

    #[test]
    fn test_full_scan_keeps_port_mode() {
        let cmd = parse(&["-t", "example.com", "-f", "--ports", "22,80"]);
        let set = cmd.module_set();
        assert!(set.headers && set.tls);
        assert!(matches!(set.ports, Some(PortScanMode::Custom(_))));
    }

    #[test]
    fn test_bare_host_target_is_https() {
        let cmd = parse(&["-t", "example.com"]);
        let target = Target::resolve(&cmd.target).unwrap();
        assert!(target.is_tls());
        assert_eq!(target.port(), crate::types::Port::HTTPS);
        assert_eq!(target.to_string(), "https://example.com:443");

        let cmd = parse(&["-t", "example.com:80"]);
        assert!(!Target::resolve(&cmd.target).unwrap().is_tls());
    }

    #[test]
    fn test_bad_port_mode_rejected() {
        assert!(ScanCommand::try_parse_from(["scan", "-t", "x", "--ports", "fastest"]).is_err());
    }
}
