//! Findings emitted by the scan modules.
//!
//! Each module produces its own finding type; [`Finding`] unifies them for
//! rendering and severity summaries.

use crate::types::{Port, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of checking one header policy entry against a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderFinding {
    /// Canonical header name, e.g. "Strict-Transport-Security".
    pub name: String,
    pub present: bool,
    /// What the policy wanted. Disclosure headers expect absence.
    pub expected_present: bool,
    /// Header value, or `"MISSING"` when absent.
    pub value: String,
    /// The policy severity for this header.
    pub severity: Severity,
    pub description: String,
}

impl HeaderFinding {
    /// Value recorded for headers absent from the response.
    pub const MISSING: &'static str = "MISSING";

    /// Whether the response breaks the policy for this header.
    pub fn is_violation(&self) -> bool {
        self.present != self.expected_present
    }
}

/// TLS protocol versions probed by the analyzer, oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TlsVersion {
    #[serde(rename = "TLSv1.0")]
    Tls10,
    #[serde(rename = "TLSv1.1")]
    Tls11,
    #[serde(rename = "TLSv1.2")]
    Tls12,
    #[serde(rename = "TLSv1.3")]
    Tls13,
}

impl TlsVersion {
    pub const ALL: [TlsVersion; 4] = [Self::Tls10, Self::Tls11, Self::Tls12, Self::Tls13];

    /// Oldest version considered acceptable.
    pub const MIN_ACCEPTABLE: TlsVersion = Self::Tls12;

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tls10 => "TLSv1.0",
            Self::Tls11 => "TLSv1.1",
            Self::Tls12 => "TLSv1.2",
            Self::Tls13 => "TLSv1.3",
        }
    }

    pub fn is_weak(self) -> bool {
        self < Self::MIN_ACCEPTABLE
    }
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Leaf certificate facts from the most recent successful handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateInfo {
    /// Inside the validity window and chain verifies.
    pub valid: bool,
    pub subject: String,
    pub issuer: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// Whole days until `not_after`, negative once expired.
    pub days_until_expiry: i64,
}

impl CertificateInfo {
    /// Whole days from `now` until `not_after`, rounded towards negative infinity.
    pub fn days_between(now: DateTime<Utc>, not_after: DateTime<Utc>) -> i64 {
        (not_after - now).num_seconds().div_euclid(86_400)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.not_after
    }
}

/// Classes of TLS weakness the rule set can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VulnerabilityKind {
    WeakProtocol,
    CertificateExpired,
    CertificateExpiringSoon,
    CertificateUntrusted,
    WeakCipher,
}

impl VulnerabilityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WeakProtocol => "weak-protocol",
            Self::CertificateExpired => "certificate-expired",
            Self::CertificateExpiringSoon => "certificate-expiring-soon",
            Self::CertificateUntrusted => "certificate-untrusted",
            Self::WeakCipher => "weak-cipher",
        }
    }
}

impl fmt::Display for VulnerabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single TLS observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsFinding {
    Certificate(CertificateInfo),
    Protocol {
        version: TlsVersion,
        supported: bool,
        weak: bool,
        /// Negotiated cipher suite, when the handshake exposed it.
        cipher: Option<String>,
    },
    Vulnerability {
        kind: VulnerabilityKind,
        severity: Severity,
        description: String,
    },
}

impl TlsFinding {
    pub fn severity(&self) -> Severity {
        match self {
            Self::Certificate(cert) if !cert.valid => Severity::High,
            Self::Certificate(_) => Severity::Info,
            Self::Protocol {
                supported: true,
                weak: true,
                ..
            } => Severity::High,
            Self::Protocol { .. } => Severity::Info,
            Self::Vulnerability { severity, .. } => *severity,
        }
    }

    pub fn description(&self) -> String {
        match self {
            Self::Certificate(cert) => format!(
                "certificate for {} issued by {}, expires in {} days",
                cert.subject, cert.issuer, cert.days_until_expiry
            ),
            Self::Protocol {
                version,
                supported,
                cipher,
                ..
            } => match (supported, cipher) {
                (true, Some(cipher)) => format!("{} supported ({})", version, cipher),
                (true, None) => format!("{} supported", version),
                (false, _) => format!("{} not supported", version),
            },
            Self::Vulnerability { description, .. } => description.clone(),
        }
    }
}

/// Transport protocol of a port finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

/// Status of a scanned port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    /// Port is open and accepting connections.
    Open,
    /// Port is closed (actively refused).
    Closed,
    /// Port is filtered (no response, likely firewalled).
    Filtered,
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Filtered => write!(f, "filtered"),
        }
    }
}

/// One port reported by the external scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortFinding {
    pub port: Port,
    pub protocol: Protocol,
    pub state: PortState,
    pub service: String,
    /// Product and version banner, when the scanner identified one.
    pub version: Option<String>,
}

impl PortFinding {
    pub fn severity(&self) -> Severity {
        match self.state {
            PortState::Open => Severity::Low,
            PortState::Closed | PortState::Filtered => Severity::Info,
        }
    }

    pub fn description(&self) -> String {
        let mut text = format!("{}/{} {} {}", self.port, self.protocol, self.state, self.service);
        if let Some(version) = &self.version {
            text.push(' ');
            text.push_str(version);
        }
        text
    }
}

/// Status codes that indicate the probed path exists.
pub const FOUND_STATUS_CODES: [u16; 9] = [200, 201, 202, 204, 301, 302, 307, 401, 403];

/// Fragments of paths that should never be publicly served.
const SENSITIVE_MARKERS: &[&str] = &[
    ".git",
    ".env",
    ".htaccess",
    ".htpasswd",
    ".svn",
    ".ds_store",
    "backup",
    "phpinfo",
    "config",
    "database",
    "db",
    "sql",
    "dump",
    "logs",
    "private",
    "secret",
    "server-status",
];

/// Outcome of probing one wordlist entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathFinding {
    pub path: String,
    /// HTTP status, or [`PathFinding::NO_RESPONSE`].
    pub status_code: u16,
    pub content_length: u64,
    pub elapsed_ms: u64,
    pub severity: Severity,
}

impl PathFinding {
    /// Status recorded when the request timed out or could not connect.
    pub const NO_RESPONSE: u16 = 0;

    /// Build a finding, classifying its severity from path and status.
    pub fn new(path: impl Into<String>, status_code: u16, content_length: u64, elapsed_ms: u64) -> Self {
        let path = path.into();
        let severity = Self::classify(&path, status_code);
        Self {
            path,
            status_code,
            content_length,
            elapsed_ms,
            severity,
        }
    }

    /// Finding for a request that produced no HTTP response.
    pub fn no_response(path: impl Into<String>, elapsed_ms: u64) -> Self {
        Self::new(path, Self::NO_RESPONSE, 0, elapsed_ms)
    }

    pub fn classify(path: &str, status_code: u16) -> Severity {
        if !(200..300).contains(&status_code) {
            return Severity::Info;
        }
        let lowered = path.to_ascii_lowercase();
        if SENSITIVE_MARKERS.iter().any(|m| lowered.contains(m)) {
            Severity::High
        } else {
            Severity::Low
        }
    }

    /// Whether the status suggests the path exists.
    pub fn is_hit(&self) -> bool {
        FOUND_STATUS_CODES.contains(&self.status_code)
    }

    pub fn responded(&self) -> bool {
        self.status_code != Self::NO_RESPONSE
    }

    pub fn description(&self) -> String {
        if self.responded() {
            format!("/{} returned {} ({} bytes)", self.path, self.status_code, self.content_length)
        } else {
            format!("/{} produced no response", self.path)
        }
    }
}

/// Any finding, tagged by the module that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    Header(HeaderFinding),
    Tls(TlsFinding),
    Port(PortFinding),
    Path(PathFinding),
}

impl Finding {
    pub fn severity(&self) -> Severity {
        match self {
            Self::Header(h) if h.is_violation() => h.severity,
            Self::Header(_) => Severity::Info,
            Self::Tls(t) => t.severity(),
            Self::Port(p) => p.severity(),
            Self::Path(p) => p.severity,
        }
    }

    pub fn description(&self) -> String {
        match self {
            Self::Header(h) => h.description.clone(),
            Self::Tls(t) => t.description(),
            Self::Port(p) => p.description(),
            Self::Path(p) => p.description(),
        }
    }

    /// Short label of what the finding is about.
    pub fn subject(&self) -> String {
        match self {
            Self::Header(h) => h.name.clone(),
            Self::Tls(TlsFinding::Certificate(_)) => "certificate".to_string(),
            Self::Tls(TlsFinding::Protocol { version, .. }) => version.to_string(),
            Self::Tls(TlsFinding::Vulnerability { kind, .. }) => kind.to_string(),
            Self::Port(p) => format!("{}/{}", p.port, p.protocol),
            Self::Path(p) => format!("/{}", p.path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_header_violation() {
        let mut finding = HeaderFinding {
            name: "Server".into(),
            present: true,
            expected_present: false,
            value: "nginx".into(),
            severity: Severity::Info,
            description: "server banner disclosed".into(),
        };
        assert!(finding.is_violation());
        finding.present = false;
        assert!(!finding.is_violation());
        assert_eq!(Finding::Header(finding).severity(), Severity::Info);
    }

    #[test]
    fn test_tls_version_weakness() {
        assert!(TlsVersion::Tls10.is_weak());
        assert!(TlsVersion::Tls11.is_weak());
        assert!(!TlsVersion::Tls12.is_weak());
        assert!(!TlsVersion::Tls13.is_weak());
        assert_eq!(
            serde_json::to_string(&TlsVersion::Tls13).unwrap(),
            "\"TLSv1.3\""
        );
    }

    #[test]
    fn test_days_until_expiry() {
        let now = Utc::now();
        assert_eq!(CertificateInfo::days_between(now, now + Duration::days(30)), 30);
        assert_eq!(
            CertificateInfo::days_between(now, now + Duration::days(30) - Duration::hours(1)),
            29
        );
        assert_eq!(CertificateInfo::days_between(now, now - Duration::hours(1)), -1);
        assert_eq!(CertificateInfo::days_between(now, now - Duration::days(3)), -3);
    }

    #[test]
    fn test_path_classification() {
        assert_eq!(PathFinding::classify(".git", 200), Severity::High);
        assert_eq!(PathFinding::classify("backup.zip", 200), Severity::High);
        assert_eq!(PathFinding::classify("login", 200), Severity::Low);
        assert_eq!(PathFinding::classify("admin", 302), Severity::Info);
        assert_eq!(PathFinding::classify(".env", 404), Severity::Info);

        let miss = PathFinding::no_response("backup", 5000);
        assert_eq!(miss.status_code, PathFinding::NO_RESPONSE);
        assert!(!miss.responded());
        assert!(!miss.is_hit());
        assert!(PathFinding::new("admin", 403, 0, 1).is_hit());
    }

    #[test]
    fn test_port_description() {
        let finding = PortFinding {
            port: Port::new(22).unwrap(),
            protocol: Protocol::Tcp,
            state: PortState::Open,
            service: "ssh".into(),
            version: Some("OpenSSH 8.9p1".into()),
        };
        assert_eq!(finding.description(), "22/tcp open ssh OpenSSH 8.9p1");
        assert_eq!(Finding::Port(finding).subject(), "22/tcp");
    }
}
