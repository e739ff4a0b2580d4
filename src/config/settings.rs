//! Application settings and paths.
//!
//! Settings live in a JSON file under the XDG config directory and are turned
//! into a [`ScanConfig`] for the engine.

use crate::error::{ConfigError, ConfigResult};
use crate::scanner::ScanConfig;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application directory paths following the XDG Base Directory Specification.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/vulnscan)
    pub config_dir: PathBuf,
}

impl Paths {
    /// Locate the platform directories.
    pub fn discover() -> ConfigResult<Self> {
        let project =
            ProjectDirs::from("com", "vulnscan", "vulnscan").ok_or(ConfigError::DirectoryNotFound)?;
        Ok(Self {
            config_dir: project.config_dir().to_path_buf(),
        })
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }
}

/// Persisted user settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub http_timeout_ms: u64,
    pub max_redirects: usize,
    pub user_agent: String,
    pub tls_timeout_ms: u64,
    /// Flag certificates expiring within this many days.
    pub expiry_warning_days: i64,
    pub path_timeout_ms: u64,
    /// Concurrent path workers.
    pub path_concurrency: usize,
    /// Path requests per second, 0 for unlimited.
    pub path_rate_limit: u32,
    pub disclosure_headers: bool,
    pub nmap_binary: PathBuf,
    pub fast_scan_budget_secs: u64,
    pub full_scan_budget_secs: u64,
    /// Report file written by `scan` unless overridden.
    pub output_file: PathBuf,
}

impl Default for AppSettings {
    fn default() -> Self {
        let engine = ScanConfig::default();
        Self {
            http_timeout_ms: millis(engine.http_timeout),
            max_redirects: engine.max_redirects,
            user_agent: engine.user_agent,
            tls_timeout_ms: millis(engine.tls_timeout),
            expiry_warning_days: engine.expiry_warning_days,
            path_timeout_ms: millis(engine.path_timeout),
            path_concurrency: engine.path_concurrency,
            path_rate_limit: engine.path_rate_limit,
            disclosure_headers: engine.disclosure_headers,
            nmap_binary: engine.nmap_binary,
            fast_scan_budget_secs: engine.fast_scan_budget.as_secs(),
            full_scan_budget_secs: engine.full_scan_budget.as_secs(),
            output_file: PathBuf::from("report.json"),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl AppSettings {
    /// Load settings from the default location, falling back to defaults.
    pub fn load(paths: &Paths) -> ConfigResult<Self> {
        let file = paths.settings_file();
        if !file.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&file)
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let settings: Self =
            serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to the default location.
    pub fn save(&self, paths: &Paths) -> ConfigResult<()> {
        fs::create_dir_all(&paths.config_dir)?;
        self.save_to(&paths.settings_file())
    }

    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.path_concurrency == 0 {
            return Err(ConfigError::Invalid("path_concurrency must be at least 1".into()));
        }
        let zero = [
            ("http_timeout_ms", self.http_timeout_ms),
            ("tls_timeout_ms", self.tls_timeout_ms),
            ("path_timeout_ms", self.path_timeout_ms),
            ("fast_scan_budget_secs", self.fast_scan_budget_secs),
            ("full_scan_budget_secs", self.full_scan_budget_secs),
        ]
        .into_iter()
        .find(|(_, value)| *value == 0);
        if let Some((name, _)) = zero {
            return Err(ConfigError::Invalid(format!("{} must be greater than 0", name)));
        }
        if self.expiry_warning_days < 0 {
            return Err(ConfigError::Invalid(
                "expiry_warning_days cannot be negative".into(),
            ));
        }
        Ok(())
    }

    /// Engine configuration described by these settings.
    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig::new()
            .with_http_timeout(Duration::from_millis(self.http_timeout_ms))
            .with_max_redirects(self.max_redirects)
            .with_user_agent(self.user_agent.clone())
            .with_tls_timeout(Duration::from_millis(self.tls_timeout_ms))
            .with_expiry_warning_days(self.expiry_warning_days)
            .with_path_timeout(Duration::from_millis(self.path_timeout_ms))
            .with_path_concurrency(self.path_concurrency)
            .with_rate_limit(self.path_rate_limit)
            .with_disclosure_headers(self.disclosure_headers)
            .with_nmap_binary(self.nmap_binary.clone())
            .with_scan_budgets(
                Duration::from_secs(self.fast_scan_budget_secs),
                Duration::from_secs(self.full_scan_budget_secs),
            )
    }
}
