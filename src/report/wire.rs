//! Persisted JSON form of a scan report.

use super::{ModuleFailure, ModuleName, ModuleResults, ScanReport, ScanStatus};
use crate::error::{ReportError, ReportResult};
use crate::types::{
    CertificateInfo, HeaderFinding, PathFinding, Port, PortFinding, PortState, Protocol, ScanId,
    Severity, Target, TlsFinding, TlsVersion, VulnerabilityKind,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// Top-level report document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireReport {
    pub target: String,
    pub scan_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_id: Option<ScanId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ScanStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modules: Option<Vec<ModuleName>>,
    #[serde(default)]
    pub port_scan: Vec<WirePort>,
    #[serde(default)]
    pub header_scan: Vec<WireHeader>,
    #[serde(default)]
    pub ssl_scan: Option<WireSsl>,
    #[serde(default)]
    pub directory_scan: Vec<WirePath>,
    #[serde(default)]
    pub module_errors: BTreeMap<ModuleName, ModuleFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirePort {
    pub port: Port,
    pub protocol: Protocol,
    pub state: PortState,
    pub service: String,
    /// Empty when the scanner did not identify a version.
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireHeader {
    pub header: String,
    pub present: bool,
    pub value: String,
    pub severity: Severity,
    #[serde(default)]
    pub description: String,
    #[serde(default = "expected_present_default")]
    pub expected_present: bool,
}

fn expected_present_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireSsl {
    pub certificate: Option<CertificateInfo>,
    pub tls_versions: WireTlsVersions,
    #[serde(default)]
    pub vulnerabilities: Vec<WireVulnerability>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireTlsVersions {
    pub supported: Vec<TlsVersion>,
    pub weak_versions: Vec<TlsVersion>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ciphers: BTreeMap<TlsVersion, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireVulnerability {
    pub kind: VulnerabilityKind,
    pub severity: Severity,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirePath {
    pub path: String,
    pub status_code: u16,
    pub content_length: u64,
    #[serde(default)]
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

impl From<&PortFinding> for WirePort {
    fn from(f: &PortFinding) -> Self {
        Self {
            port: f.port,
            protocol: f.protocol,
            state: f.state,
            service: f.service.clone(),
            version: f.version.clone().unwrap_or_default(),
        }
    }
}

impl From<WirePort> for PortFinding {
    fn from(w: WirePort) -> Self {
        Self {
            port: w.port,
            protocol: w.protocol,
            state: w.state,
            service: w.service,
            version: Some(w.version).filter(|v| !v.is_empty()),
        }
    }
}

impl From<&HeaderFinding> for WireHeader {
    fn from(f: &HeaderFinding) -> Self {
        Self {
            header: f.name.clone(),
            present: f.present,
            value: f.value.clone(),
            severity: f.severity,
            description: f.description.clone(),
            expected_present: f.expected_present,
        }
    }
}

impl From<WireHeader> for HeaderFinding {
    fn from(w: WireHeader) -> Self {
        Self {
            name: w.header,
            present: w.present,
            expected_present: w.expected_present,
            value: w.value,
            severity: w.severity,
            description: w.description,
        }
    }
}

impl From<&PathFinding> for WirePath {
    fn from(f: &PathFinding) -> Self {
        Self {
            path: f.path.clone(),
            status_code: f.status_code,
            content_length: f.content_length,
            elapsed_ms: f.elapsed_ms,
            severity: Some(f.severity),
        }
    }
}

impl From<WirePath> for PathFinding {
    fn from(w: WirePath) -> Self {
        let mut finding = PathFinding::new(w.path, w.status_code, w.content_length, w.elapsed_ms);
        if let Some(severity) = w.severity {
            finding.severity = severity;
        }
        finding
    }
}

impl WireSsl {
    /// Group TLS findings by kind. `None` when there are none.
    pub fn from_findings(findings: &[TlsFinding]) -> Option<Self> {
        if findings.is_empty() {
            return None;
        }

        let mut ssl = Self {
            certificate: None,
            tls_versions: WireTlsVersions::default(),
            vulnerabilities: Vec::new(),
        };

        for finding in findings {
            match finding {
                TlsFinding::Certificate(cert) => ssl.certificate = Some(cert.clone()),
                TlsFinding::Protocol {
                    version,
                    supported: true,
                    weak,
                    cipher,
                } => {
                    ssl.tls_versions.supported.push(*version);
                    if *weak {
                        ssl.tls_versions.weak_versions.push(*version);
                    }
                    if let Some(cipher) = cipher {
                        ssl.tls_versions.ciphers.insert(*version, cipher.clone());
                    }
                }
                TlsFinding::Protocol { .. } => {}
                TlsFinding::Vulnerability {
                    kind,
                    severity,
                    description,
                } => ssl.vulnerabilities.push(WireVulnerability {
                    kind: *kind,
                    severity: *severity,
                    description: description.clone(),
                }),
            }
        }

        Some(ssl)
    }

    /// Rebuild TLS findings: certificate, one protocol fact per version,
    /// then vulnerabilities.
    pub fn into_findings(self) -> Vec<TlsFinding> {
        let mut findings = Vec::new();
        findings.extend(self.certificate.map(TlsFinding::Certificate));

        let versions = self.tls_versions;
        for version in TlsVersion::ALL {
            let supported = versions.supported.contains(&version);
            findings.push(TlsFinding::Protocol {
                version,
                supported,
                weak: version.is_weak(),
                cipher: versions.ciphers.get(&version).cloned(),
            });
        }

        findings.extend(self.vulnerabilities.into_iter().map(|v| {
            TlsFinding::Vulnerability {
                kind: v.kind,
                severity: v.severity,
                description: v.description,
            }
        }));
        findings
    }
}

/// Converts reports to and from their persisted JSON form.
pub struct ReportBuilder;

impl ReportBuilder {
    pub fn to_wire(report: &ScanReport) -> WireReport {
        WireReport {
            target: report.target().to_string(),
            scan_date: report.started_at(),
            finished_at: Some(report.finished_at()),
            scan_id: Some(report.scan_id()),
            status: Some(report.status()),
            modules: Some(report.modules().to_vec()),
            port_scan: report.ports().iter().map(WirePort::from).collect(),
            header_scan: report.headers().iter().map(WireHeader::from).collect(),
            ssl_scan: WireSsl::from_findings(report.tls()),
            directory_scan: report.paths().iter().map(WirePath::from).collect(),
            module_errors: report.module_errors().clone(),
        }
    }

    pub fn from_wire(wire: WireReport) -> ReportResult<ScanReport> {
        let target = Target::resolve(&wire.target)?;

        let modules = wire.modules.unwrap_or_else(|| {
            ModuleName::ALL
                .into_iter()
                .filter(|m| {
                    wire.module_errors.contains_key(m)
                        || match m {
                            ModuleName::Headers => !wire.header_scan.is_empty(),
                            ModuleName::Ssl => wire.ssl_scan.is_some(),
                            ModuleName::Ports => !wire.port_scan.is_empty(),
                            ModuleName::Directories => !wire.directory_scan.is_empty(),
                        }
                })
                .collect()
        });

        let results = ModuleResults {
            headers: wire.header_scan.into_iter().map(HeaderFinding::from).collect(),
            tls: wire
                .ssl_scan
                .map(WireSsl::into_findings)
                .unwrap_or_default(),
            ports: wire.port_scan.into_iter().map(PortFinding::from).collect(),
            paths: wire.directory_scan.into_iter().map(PathFinding::from).collect(),
            module_errors: wire.module_errors,
        };

        let report = ScanReport::assemble(
            wire.scan_id.unwrap_or_default(),
            target,
            wire.scan_date,
            wire.finished_at.unwrap_or(wire.scan_date),
            modules,
            results,
        );

        if let Some(status) = wire.status {
            if !status.is_terminal() {
                return Err(ReportError::Malformed(format!(
                    "report of an unfinished scan (status '{}')",
                    status
                )));
            }
            if status != report.status() {
                return Err(ReportError::Malformed(format!(
                    "status '{}' contradicts module errors",
                    status
                )));
            }
        }

        Ok(report)
    }

    /// Pretty-printed JSON document.
    pub fn to_json(report: &ScanReport) -> ReportResult<String> {
        Ok(serde_json::to_string_pretty(&Self::to_wire(report))?)
    }

    pub fn parse(json: &str) -> ReportResult<ScanReport> {
        let wire: WireReport = serde_json::from_str(json)?;
        Self::from_wire(wire)
    }

    pub fn write(report: &ScanReport, path: &Path) -> ReportResult<()> {
        let json = Self::to_json(report)?;
        fs::write(path, json).map_err(|e| ReportError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        info!(path = %path.display(), "report written");
        Ok(())
    }

    pub fn read(path: &Path) -> ReportResult<ScanReport> {
        let json = fs::read_to_string(path).map_err(|e| ReportError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModuleError;
    use chrono::Duration;
    use tempfile::TempDir;

    fn sample_report() -> ScanReport {
        let started = Utc::now();
        let not_after = started + Duration::days(12);
        let results = ModuleResults {
            headers: vec![
                HeaderFinding {
                    name: "Content-Security-Policy".into(),
                    present: false,
                    expected_present: true,
                    value: HeaderFinding::MISSING.into(),
                    severity: Severity::High,
                    description: "Prevents XSS attacks".into(),
                },
                HeaderFinding {
                    name: "X-Frame-Options".into(),
                    present: true,
                    expected_present: true,
                    value: "DENY".into(),
                    severity: Severity::Medium,
                    description: "Prevents clickjacking attacks".into(),
                },
            ],
            tls: vec![
                TlsFinding::Certificate(CertificateInfo {
                    valid: true,
                    subject: "CN=example.com".into(),
                    issuer: "CN=R3, O=Let's Encrypt".into(),
                    not_before: started - Duration::days(78),
                    not_after,
                    days_until_expiry: 12,
                }),
                TlsFinding::Protocol {
                    version: TlsVersion::Tls10,
                    supported: false,
                    weak: true,
                    cipher: None,
                },
                TlsFinding::Protocol {
                    version: TlsVersion::Tls11,
                    supported: true,
                    weak: true,
                    cipher: None,
                },
                TlsFinding::Protocol {
                    version: TlsVersion::Tls12,
                    supported: true,
                    weak: false,
                    cipher: Some("TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256".into()),
                },
                TlsFinding::Protocol {
                    version: TlsVersion::Tls13,
                    supported: false,
                    weak: false,
                    cipher: None,
                },
                TlsFinding::Vulnerability {
                    kind: VulnerabilityKind::WeakProtocol,
                    severity: Severity::High,
                    description: "Weak TLS versions supported: TLSv1.1".into(),
                },
                TlsFinding::Vulnerability {
                    kind: VulnerabilityKind::CertificateExpiringSoon,
                    severity: Severity::Medium,
                    description: "Certificate expires in 12 days".into(),
                },
            ],
            ports: vec![],
            paths: vec![
                PathFinding::new("admin", 302, 0, 14),
                PathFinding::new("login", 200, 512, 9),
                PathFinding::no_response("backup", 5000),
            ],
            module_errors: BTreeMap::from([(
                ModuleName::Ports,
                ModuleFailure::from(&ModuleError::ScannerUnavailable("nmap: not installed".into())),
            )]),
        };

        ScanReport::assemble(
            ScanId::new(),
            Target::resolve("example.com").unwrap(),
            started,
            started + Duration::seconds(42),
            vec![
                ModuleName::Headers,
                ModuleName::Ssl,
                ModuleName::Ports,
                ModuleName::Directories,
            ],
            results,
        )
    }

    #[test]
    fn test_wire_shape() {
        let report = sample_report();
        let value: serde_json::Value =
            serde_json::from_str(&ReportBuilder::to_json(&report).unwrap()).unwrap();

        assert_eq!(value["target"], "https://example.com:443");
        assert!(value["scan_date"].is_string());
        assert_eq!(value["status"], "partially_failed");
        assert_eq!(value["port_scan"], serde_json::json!([]));
        assert_eq!(value["header_scan"][0]["header"], "Content-Security-Policy");
        assert_eq!(value["header_scan"][0]["value"], "MISSING");
        assert_eq!(value["header_scan"][0]["severity"], "high");
        assert_eq!(
            value["ssl_scan"]["tls_versions"]["supported"],
            serde_json::json!(["TLSv1.1", "TLSv1.2"])
        );
        assert_eq!(
            value["ssl_scan"]["tls_versions"]["weak_versions"],
            serde_json::json!(["TLSv1.1"])
        );
        assert_eq!(value["ssl_scan"]["certificate"]["days_until_expiry"], 12);
        assert_eq!(
            value["ssl_scan"]["vulnerabilities"][0]["kind"],
            "weak-protocol"
        );
        assert_eq!(value["directory_scan"][2]["status_code"], 0);
        assert_eq!(value["module_errors"]["ports"]["kind"], "ScannerUnavailableError");
    }

    #[test]
    fn test_parse_restores_report() {
        let report = sample_report();
        let parsed = ReportBuilder::parse(&ReportBuilder::to_json(&report).unwrap()).unwrap();
        assert_eq!(parsed, report);
    }

    #[test]
    fn test_empty_tls_is_null() {
        let now = Utc::now();
        let report = ScanReport::assemble(
            ScanId::new(),
            Target::resolve("http://example.com").unwrap(),
            now,
            now,
            vec![ModuleName::Headers],
            ModuleResults::default(),
        );
        let value = serde_json::to_value(ReportBuilder::to_wire(&report)).unwrap();
        assert!(value["ssl_scan"].is_null());
    }

    #[test]
    fn test_parse_minimal_document() {
        let json = r#"{
            "target": "example.com",
            "scan_date": "2024-05-01T10:00:00Z",
            "port_scan": [
                {"port": 22, "protocol": "tcp", "state": "open", "service": "ssh", "version": ""}
            ],
            "header_scan": [],
            "ssl_scan": null,
            "directory_scan": [{"path": ".git", "status_code": 200, "content_length": 23}]
        }"#;

        let report = ReportBuilder::parse(json).unwrap();
        assert_eq!(report.status(), ScanStatus::Completed);
        assert_eq!(report.modules(), &[ModuleName::Ports, ModuleName::Directories]);
        assert_eq!(report.ports()[0].version, None);
        assert_eq!(report.paths()[0].severity, Severity::High);
    }

    #[test]
    fn test_parse_rejects_bad_documents() {
        assert!(matches!(
            ReportBuilder::parse("{\"target\": \"\", \"scan_date\": \"2024-05-01T10:00:00Z\"}"),
            Err(ReportError::Target(_))
        ));
        assert!(matches!(
            ReportBuilder::parse("[]"),
            Err(ReportError::Serialization(_))
        ));

        let mut wire = ReportBuilder::to_wire(&sample_report());
        wire.status = Some(ScanStatus::Completed);
        assert!(matches!(
            ReportBuilder::from_wire(wire),
            Err(ReportError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_rejects_unfinished_scan() {
        let mut wire = ReportBuilder::to_wire(&sample_report());
        wire.status = Some(ScanStatus::Running);
        match ReportBuilder::from_wire(wire) {
            Err(ReportError::Malformed(message)) => assert!(message.contains("unfinished")),
            other => panic!("expected malformed report, got {:?}", other),
        }
    }

    #[test]
    fn test_write_and_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        let report = sample_report();

        ReportBuilder::write(&report, &path).unwrap();
        assert_eq!(ReportBuilder::read(&path).unwrap(), report);

        assert!(matches!(
            ReportBuilder::read(&dir.path().join("missing.json")),
            Err(ReportError::ReadFailed { .. })
        ));
    }
}
