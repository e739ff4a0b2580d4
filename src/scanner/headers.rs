//! HTTP security header analysis.
//!
//! One GET against the target, checked against a fixed policy table.

use crate::error::{ModuleError, ModuleResult, ScanError};
use crate::scanner::{CancelToken, ScanConfig};
use crate::types::{HeaderFinding, Severity, Target};
use reqwest::header::HeaderMap;
use reqwest::{redirect, Client};
use tracing::{debug, info};

/// One row of the header policy table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderPolicyEntry {
    pub name: &'static str,
    pub expected_present: bool,
    /// Severity attached to every finding for this header.
    pub severity: Severity,
    pub description: &'static str,
}

const SECURITY_HEADERS: &[HeaderPolicyEntry] = &[
    HeaderPolicyEntry {
        name: "Content-Security-Policy",
        expected_present: true,
        severity: Severity::High,
        description: "Prevents XSS attacks by controlling resource loading",
    },
    HeaderPolicyEntry {
        name: "X-Frame-Options",
        expected_present: true,
        severity: Severity::Medium,
        description: "Prevents clickjacking attacks",
    },
    HeaderPolicyEntry {
        name: "X-XSS-Protection",
        expected_present: true,
        severity: Severity::Low,
        description: "Enables the browser XSS filter (deprecated but still used)",
    },
    HeaderPolicyEntry {
        name: "Strict-Transport-Security",
        expected_present: true,
        severity: Severity::High,
        description: "Forces HTTPS connections (HSTS)",
    },
    HeaderPolicyEntry {
        name: "X-Content-Type-Options",
        expected_present: true,
        severity: Severity::Medium,
        description: "Prevents MIME type sniffing",
    },
    HeaderPolicyEntry {
        name: "Referrer-Policy",
        expected_present: true,
        severity: Severity::Low,
        description: "Controls referrer information sent with requests",
    },
];

const DISCLOSURE_HEADERS: &[HeaderPolicyEntry] = &[
    HeaderPolicyEntry {
        name: "Server",
        expected_present: false,
        severity: Severity::Info,
        description: "Server software disclosure",
    },
    HeaderPolicyEntry {
        name: "X-Powered-By",
        expected_present: false,
        severity: Severity::Low,
        description: "Technology stack disclosure",
    },
];

/// The set of headers checked on every response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderPolicy {
    entries: Vec<HeaderPolicyEntry>,
}

impl Default for HeaderPolicy {
    fn default() -> Self {
        Self {
            entries: SECURITY_HEADERS.to_vec(),
        }
    }
}

impl HeaderPolicy {
    /// Default policy plus information disclosure headers.
    pub fn with_disclosure() -> Self {
        let mut policy = Self::default();
        policy.entries.extend_from_slice(DISCLOSURE_HEADERS);
        policy
    }

    pub fn entries(&self) -> &[HeaderPolicyEntry] {
        &self.entries
    }

    /// One finding per policy entry, in table order.
    pub fn evaluate(&self, headers: &HeaderMap) -> Vec<HeaderFinding> {
        self.entries
            .iter()
            .map(|entry| {
                let values: Vec<String> = headers
                    .get_all(entry.name)
                    .iter()
                    .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                    .collect();
                let present = !values.is_empty();
                HeaderFinding {
                    name: entry.name.to_string(),
                    present,
                    expected_present: entry.expected_present,
                    value: if present {
                        values.join(", ")
                    } else {
                        HeaderFinding::MISSING.to_string()
                    },
                    severity: entry.severity,
                    description: entry.description.to_string(),
                }
            })
            .collect()
    }
}

/// Fetches the target once and grades its response headers.
#[derive(Debug, Clone)]
pub struct HeaderAnalyzer {
    client: Client,
    policy: HeaderPolicy,
}

impl HeaderAnalyzer {
    pub fn new(config: &ScanConfig) -> Result<Self, ScanError> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .redirect(redirect::Policy::limited(config.max_redirects))
            .danger_accept_invalid_certs(true)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| ScanError::HttpClient(e.to_string()))?;

        let policy = if config.disclosure_headers {
            HeaderPolicy::with_disclosure()
        } else {
            HeaderPolicy::default()
        };

        Ok(Self { client, policy })
    }

    pub async fn analyze(
        &self,
        target: &Target,
        cancel: &CancelToken,
    ) -> ModuleResult<Vec<HeaderFinding>> {
        if cancel.is_cancelled() {
            return Err(ModuleError::Cancelled);
        }

        let url = target
            .base_url()
            .map_err(|e| ModuleError::Unreachable(format!("{}: {}", target, e)))?;

        debug!(%url, "requesting headers");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ModuleError::Unreachable(format!("{}: {}", url, e)))?;

        let status = response.status();
        let findings = self.policy.evaluate(response.headers());
        let violations = findings.iter().filter(|f| f.is_violation()).count();
        info!(
            %url,
            status = status.as_u16(),
            checked = findings.len(),
            violations,
            "header analysis complete"
        );

        Ok(findings)
    }
}
