//! Engine configuration and the port scanning seam.
//!
//! `PortScanBackend` abstracts the external port scanner so the orchestrator
//! can be driven by a fake in tests.

use crate::error::{ModuleResult, ScanError};
use crate::types::{PortError, PortFinding, PortSpec};
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Port range selection for the port enumerator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortScanMode {
    /// The fixed list of commonly exposed ports.
    Fast,
    /// Every port, 1-65535.
    Full,
    /// An explicit port specification.
    Custom(PortSpec),
}

impl PortScanMode {
    /// Largest custom specification still run under the fast budget.
    const FAST_BUDGET_MAX_PORTS: usize = 1024;

    pub fn spec(&self) -> PortSpec {
        match self {
            Self::Fast => PortSpec::fast(),
            Self::Full => PortSpec::full(),
            Self::Custom(spec) => spec.clone(),
        }
    }

    /// Wall-clock budget for this mode, picked from the fast and full budgets.
    pub fn budget(&self, fast: Duration, full: Duration) -> Duration {
        match self {
            Self::Fast => fast,
            Self::Full => full,
            Self::Custom(spec) if spec.count() <= Self::FAST_BUDGET_MAX_PORTS => fast,
            Self::Custom(_) => full,
        }
    }
}

impl fmt::Display for PortScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Full => write!(f, "full"),
            Self::Custom(spec) => write!(f, "{}", spec),
        }
    }
}

impl FromStr for PortScanMode {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "full" | "all" => Ok(Self::Full),
            other => other.parse().map(Self::Custom),
        }
    }
}

/// Runtime configuration for a scan engine.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Timeout for the header request.
    pub http_timeout: Duration,
    /// Redirect hop limit for the header request.
    pub max_redirects: usize,
    pub user_agent: String,
    /// Timeout for each TLS handshake.
    pub tls_timeout: Duration,
    /// Certificates expiring within this many days are flagged.
    pub expiry_warning_days: i64,
    /// Timeout for each path probe.
    pub path_timeout: Duration,
    /// Number of path workers.
    pub path_concurrency: usize,
    /// Path requests per second, 0 for unlimited.
    pub path_rate_limit: u32,
    /// Also flag `Server` and `X-Powered-By` disclosure.
    pub disclosure_headers: bool,
    /// External port scanner executable.
    pub nmap_binary: PathBuf,
    pub fast_scan_budget: Duration,
    pub full_scan_budget: Duration,
    /// Show progress bars.
    pub verbose: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(10),
            max_redirects: 5,
            user_agent: concat!("vulnscan/", env!("CARGO_PKG_VERSION")).to_string(),
            tls_timeout: Duration::from_secs(10),
            expiry_warning_days: 30,
            path_timeout: Duration::from_secs(5),
            path_concurrency: 10,
            path_rate_limit: 0,
            disclosure_headers: false,
            nmap_binary: PathBuf::from("nmap"),
            fast_scan_budget: Duration::from_secs(300),
            full_scan_budget: Duration::from_secs(3600),
            verbose: false,
        }
    }
}

impl ScanConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_max_redirects(mut self, hops: usize) -> Self {
        self.max_redirects = hops;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_tls_timeout(mut self, timeout: Duration) -> Self {
        self.tls_timeout = timeout;
        self
    }

    pub fn with_expiry_warning_days(mut self, days: i64) -> Self {
        self.expiry_warning_days = days;
        self
    }

    pub fn with_path_timeout(mut self, timeout: Duration) -> Self {
        self.path_timeout = timeout;
        self
    }

    pub fn with_path_concurrency(mut self, workers: usize) -> Self {
        self.path_concurrency = workers;
        self
    }

    pub fn with_rate_limit(mut self, per_second: u32) -> Self {
        self.path_rate_limit = per_second;
        self
    }

    pub fn with_disclosure_headers(mut self, enabled: bool) -> Self {
        self.disclosure_headers = enabled;
        self
    }

    pub fn with_nmap_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.nmap_binary = binary.into();
        self
    }

    pub fn with_scan_budgets(mut self, fast: Duration, full: Duration) -> Self {
        self.fast_scan_budget = fast;
        self.full_scan_budget = full;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.path_concurrency == 0 {
            return Err(ScanError::InvalidConfig(
                "path concurrency must be at least 1".into(),
            ));
        }
        let timeouts = [
            ("http timeout", self.http_timeout),
            ("tls timeout", self.tls_timeout),
            ("path timeout", self.path_timeout),
            ("fast scan budget", self.fast_scan_budget),
            ("full scan budget", self.full_scan_budget),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, d)| d.is_zero()) {
            return Err(ScanError::InvalidConfig(format!("{} must be non-zero", name)));
        }
        if self.expiry_warning_days < 0 {
            return Err(ScanError::InvalidConfig(
                "expiry warning days cannot be negative".into(),
            ));
        }
        Ok(())
    }
}

/// Something that can enumerate ports on a host.
#[async_trait]
pub trait PortScanBackend: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Scan `ports` on `host` and report every port the backend saw.
    async fn scan(&self, host: &str, ports: &PortSpec) -> ModuleResult<Vec<PortFinding>>;
}
