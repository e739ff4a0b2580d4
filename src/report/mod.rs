//! The aggregated scan report.
//!
//! A `ScanReport` is assembled once by the orchestrator from the values the
//! modules return and is read-only afterwards.

mod wire;

pub use wire::{
    ReportBuilder, WireHeader, WirePath, WirePort, WireReport, WireSsl, WireTlsVersions,
    WireVulnerability,
};

use crate::error::{ErrorKind, ModuleError};
use crate::types::{
    Finding, HeaderFinding, PathFinding, PortFinding, ScanId, Severity, Target, TlsFinding,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The four scan modules, by their report names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleName {
    Headers,
    Ssl,
    Ports,
    Directories,
}

impl ModuleName {
    pub const ALL: [ModuleName; 4] = [Self::Headers, Self::Ssl, Self::Ports, Self::Directories];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Headers => "headers",
            Self::Ssl => "ssl",
            Self::Ports => "ports",
            Self::Directories => "directories",
        }
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a module produced no (or incomplete) findings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&ModuleError> for ModuleFailure {
    fn from(err: &ModuleError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Lifecycle of one scan invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Pending,
    Running,
    /// Every selected module ran without error.
    Completed,
    /// At least one selected module failed.
    PartiallyFailed,
}

impl ScanStatus {
    /// Terminal status for a finished scan.
    pub fn from_errors(module_errors: &BTreeMap<ModuleName, ModuleFailure>) -> Self {
        if module_errors.is_empty() {
            Self::Completed
        } else {
            Self::PartiallyFailed
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::PartiallyFailed)
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::PartiallyFailed => "partially failed",
        };
        f.write_str(name)
    }
}

/// Per-module results handed to [`ScanReport::assemble`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleResults {
    pub headers: Vec<HeaderFinding>,
    pub tls: Vec<TlsFinding>,
    pub ports: Vec<PortFinding>,
    pub paths: Vec<PathFinding>,
    pub module_errors: BTreeMap<ModuleName, ModuleFailure>,
}

/// Aggregated findings of one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    scan_id: ScanId,
    target: Target,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    status: ScanStatus,
    modules: Vec<ModuleName>,
    headers: Vec<HeaderFinding>,
    tls: Vec<TlsFinding>,
    ports: Vec<PortFinding>,
    paths: Vec<PathFinding>,
    module_errors: BTreeMap<ModuleName, ModuleFailure>,
}

impl ScanReport {
    /// Freeze module results into a report. The status follows from the errors.
    pub fn assemble(
        scan_id: ScanId,
        target: Target,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        mut modules: Vec<ModuleName>,
        results: ModuleResults,
    ) -> Self {
        modules.sort();
        modules.dedup();
        Self {
            scan_id,
            target,
            started_at,
            finished_at,
            status: ScanStatus::from_errors(&results.module_errors),
            modules,
            headers: results.headers,
            tls: results.tls,
            ports: results.ports,
            paths: results.paths,
            module_errors: results.module_errors,
        }
    }

    pub fn scan_id(&self) -> ScanId {
        self.scan_id
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn status(&self) -> ScanStatus {
        self.status
    }

    /// Modules that were run, in canonical order.
    pub fn modules(&self) -> &[ModuleName] {
        &self.modules
    }

    pub fn headers(&self) -> &[HeaderFinding] {
        &self.headers
    }

    pub fn tls(&self) -> &[TlsFinding] {
        &self.tls
    }

    pub fn ports(&self) -> &[PortFinding] {
        &self.ports
    }

    /// Path findings in wordlist order.
    pub fn paths(&self) -> &[PathFinding] {
        &self.paths
    }

    pub fn module_errors(&self) -> &BTreeMap<ModuleName, ModuleFailure> {
        &self.module_errors
    }

    /// Every selected module failed.
    pub fn is_total_failure(&self) -> bool {
        !self.modules.is_empty()
            && self
                .modules
                .iter()
                .all(|m| self.module_errors.contains_key(m))
    }

    /// All findings, module by module.
    pub fn findings(&self) -> impl Iterator<Item = Finding> + '_ {
        self.headers
            .iter()
            .cloned()
            .map(Finding::Header)
            .chain(self.tls.iter().cloned().map(Finding::Tls))
            .chain(self.ports.iter().cloned().map(Finding::Port))
            .chain(self.paths.iter().cloned().map(Finding::Path))
    }

    /// Number of findings at each severity, `Info` first.
    pub fn severity_counts(&self) -> BTreeMap<Severity, usize> {
        let mut counts: BTreeMap<Severity, usize> =
            Severity::ALL.iter().map(|&s| (s, 0)).collect();
        for finding in self.findings() {
            *counts.entry(finding.severity()).or_default() += 1;
        }
        counts
    }

    /// Highest severity among all findings.
    pub fn max_severity(&self) -> Option<Severity> {
        self.findings().map(|f| f.severity()).max()
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
