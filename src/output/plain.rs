//! Plain text output formatting.
//!
//! Produces human-readable output with colors and formatting.

use crate::report::ScanReport;
use crate::types::{PortState, Severity, TlsFinding};
use console::{style, Style};
use std::io::{self, Write};

const RULE: &str = "═══════════════════════════════════════════════════════════════";
const THIN_RULE: &str = "───────────────────────────────────────────────────────────────";

fn severity_style(severity: Severity) -> Style {
    match severity {
        Severity::Critical => Style::new().red().bold(),
        Severity::High => Style::new().red(),
        Severity::Medium => Style::new().yellow(),
        Severity::Low => Style::new().cyan(),
        Severity::Info => Style::new().dim(),
    }
}

/// Write a report in human-readable plain text format.
pub fn write_plain<W: Write>(report: &ScanReport, out: &mut W) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out, "                 {} Assessment Report", style("vulnscan").cyan().bold())?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)?;

    writeln!(out, "  {} {}", style("Target:").bold(), report.target())?;
    writeln!(out, "  {} {}", style("Scan ID:").bold(), style(report.scan_id().short()).dim())?;
    writeln!(
        out,
        "  {} {}",
        style("Started:").bold(),
        report.started_at().format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(
        out,
        "  {} {} in {:.2}s",
        style("Status:").bold(),
        report.status(),
        report.duration().num_milliseconds() as f64 / 1000.0
    )?;
    writeln!(out)?;

    if !report.headers().is_empty() {
        section(out, "Security Headers")?;
        for header in report.headers() {
            let mark = if header.is_violation() {
                severity_style(header.severity).apply_to("✗")
            } else {
                Style::new().green().apply_to("✓")
            };
            writeln!(
                out,
                "  {} {:<28} {}",
                mark,
                header.name,
                style(truncate_string(&header.value, 30)).dim()
            )?;
        }
        writeln!(out)?;
    }

    if !report.tls().is_empty() {
        section(out, "TLS")?;
        for finding in report.tls() {
            match finding {
                TlsFinding::Certificate(cert) => {
                    writeln!(out, "  {} {}", style("Subject:").bold(), cert.subject)?;
                    writeln!(out, "  {} {}", style("Issuer:").bold(), cert.issuer)?;
                    writeln!(
                        out,
                        "  {} {} ({} days left)",
                        style("Expires:").bold(),
                        cert.not_after.format("%Y-%m-%d"),
                        cert.days_until_expiry
                    )?;
                }
                TlsFinding::Protocol { version, supported, weak, .. } => {
                    let state = match (supported, weak) {
                        (true, true) => Style::new().red().apply_to("supported (weak)"),
                        (true, false) => Style::new().green().apply_to("supported"),
                        (false, _) => Style::new().dim().apply_to("not supported"),
                    };
                    writeln!(out, "  {:<10} {}", version, state)?;
                }
                TlsFinding::Vulnerability { severity, description, .. } => {
                    writeln!(
                        out,
                        "  {} {}",
                        severity_style(*severity).apply_to(format!("[{}]", severity)),
                        description
                    )?;
                }
            }
        }
        writeln!(out)?;
    }

    if !report.ports().is_empty() {
        section(out, "Ports")?;
        writeln!(
            out,
            "  {:>9}  {:<10}  {:<15}  {}",
            style("PORT").bold(),
            style("STATE").bold(),
            style("SERVICE").bold(),
            style("VERSION").bold()
        )?;
        for port in report.ports() {
            let state_style = match port.state {
                PortState::Open => Style::new().green().bold(),
                PortState::Closed => Style::new().red(),
                PortState::Filtered => Style::new().yellow(),
            };
            writeln!(
                out,
                "  {:>9}  {:<10}  {:<15}  {}",
                format!("{}/{}", port.port, port.protocol),
                state_style.apply_to(port.state.to_string()),
                port.service,
                style(truncate_string(port.version.as_deref().unwrap_or(""), 30)).dim()
            )?;
        }
        writeln!(out)?;
    }

    if !report.paths().is_empty() {
        section(out, "Directories")?;
        let hits: Vec<_> = report.paths().iter().filter(|p| p.is_hit()).collect();
        if hits.is_empty() {
            writeln!(out, "  {}", style("No interesting paths found.").dim())?;
        }
        for path in hits {
            writeln!(
                out,
                "  {} /{:<30} {:>8} bytes",
                severity_style(path.severity).apply_to(path.status_code),
                path.path,
                path.content_length
            )?;
        }
        writeln!(
            out,
            "  {}",
            style(format!("{} paths probed", report.paths().len())).dim()
        )?;
        writeln!(out)?;
    }

    if !report.module_errors().is_empty() {
        section(out, "Module Errors")?;
        for (module, failure) in report.module_errors() {
            writeln!(
                out,
                "  {} {}: {}",
                style(format!("{:<12}", module.as_str())).red().bold(),
                failure.kind,
                failure.message
            )?;
        }
        writeln!(out)?;
    }

    let counts = report.severity_counts();
    let summary: Vec<String> = counts
        .iter()
        .rev()
        .map(|(severity, count)| {
            severity_style(*severity)
                .apply_to(format!("{} {}", count, severity))
                .to_string()
        })
        .collect();
    writeln!(out, "  {} {}", style("Findings:").bold(), summary.join(", "))?;
    writeln!(out)?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)?;

    Ok(())
}

fn section<W: Write>(out: &mut W, title: &str) -> io::Result<()> {
    writeln!(out, "  {}", style(title).bold().underlined())?;
    writeln!(out, "  {}", style(THIN_RULE).dim())
}

/// Print a scan header before scanning begins.
pub fn print_scan_header(target: &str, modules: &[String]) {
    eprintln!();
    eprintln!(
        "{} {} v{}",
        style("Starting").cyan(),
        style("vulnscan").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    eprintln!("{} Target: {}", style("•").dim(), style(target).white().bold());
    eprintln!("{} Modules: {}", style("•").dim(), style(modules.join(", ")).yellow());
    eprintln!();
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}

/// Print a success message.
pub fn print_success(msg: &str) {
    eprintln!("{} {}", style("✓").green().bold(), msg);
}

/// Print an info message.
pub fn print_info(msg: &str) {
    eprintln!("{} {}", style("ℹ").blue().bold(), msg);
}

/// Truncate a string to at most `max_len` characters, adding ellipsis if truncated.
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModuleError;
    use crate::report::{ModuleFailure, ModuleName, ModuleResults};
    use crate::types::{HeaderFinding, PathFinding, ScanId, Target};
    use chrono::Utc;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(truncate_string("ééééééé", 5), "éé...");
    }

    #[test]
    fn test_plain_sections() {
        let mut results = ModuleResults {
            headers: vec![HeaderFinding {
                name: "Strict-Transport-Security".into(),
                present: false,
                expected_present: true,
                value: HeaderFinding::MISSING.into(),
                severity: Severity::High,
                description: "HSTS".into(),
            }],
            paths: vec![
                PathFinding::new("login", 200, 512, 3),
                PathFinding::new("nothing", 404, 0, 3),
            ],
            ..ModuleResults::default()
        };
        results.module_errors.insert(
            ModuleName::Ports,
            ModuleFailure::from(&ModuleError::ScannerUnavailable("nmap".into())),
        );
        let now = Utc::now();
        let report = ScanReport::assemble(
            ScanId::new(),
            Target::resolve("http://example.com").unwrap(),
            now,
            now,
            vec![ModuleName::Headers, ModuleName::Directories, ModuleName::Ports],
            results,
        );

        let mut buf = Vec::new();
        write_plain(&report, &mut buf).unwrap();
        let text = console::strip_ansi_codes(&String::from_utf8(buf).unwrap()).to_string();

        assert!(text.contains("Strict-Transport-Security"));
        assert!(text.contains("/login"));
        assert!(!text.contains("/nothing"));
        assert!(text.contains("2 paths probed"));
        assert!(text.contains("ScannerUnavailableError"));
        assert!(!text.contains("TLS"));
    }
}
