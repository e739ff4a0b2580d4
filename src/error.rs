//! Error types for vulnscan.
//!
//! Uses `thiserror` for ergonomic error definitions. Module-scoped failures
//! (`ModuleError`) are recorded in the report; only `TargetError` aborts a
//! scan before it starts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Raised when raw target input cannot be turned into a `Target`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    #[error("target is empty")]
    Empty,

    #[error("invalid target format: {0}")]
    InvalidFormat(String),

    #[error("invalid port in target: {0}")]
    InvalidPort(String),

    #[error("malformed IP literal: {0}")]
    InvalidIpLiteral(String),

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("raw targets require an explicit port: {0}")]
    MissingPort(String),

    #[error("failed to resolve hostname '{0}': {1}")]
    DnsResolutionFailed(String, String),

    #[error("no IP addresses found for hostname '{0}'")]
    NoAddressesFound(String),
}

/// Failure of a single scan module. Never fatal to the overall scan.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModuleError {
    #[error("target unreachable: {0}")]
    Unreachable(String),

    #[error("TLS unavailable: {0}")]
    TlsUnavailable(String),

    #[error("port scanner unavailable: {0}")]
    ScannerUnavailable(String),

    #[error("scan exceeded its budget of {0}s")]
    ScanTimeout(u64),

    #[error("failed to load wordlist {path}: {reason}")]
    WordlistLoad { path: PathBuf, reason: String },

    #[error("port scanner produced unusable output: {0}")]
    MalformedOutput(String),

    #[error("scan cancelled")]
    Cancelled,
}

impl ModuleError {
    /// The serialisable classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unreachable(_) => ErrorKind::UnreachableTarget,
            Self::TlsUnavailable(_) => ErrorKind::TlsUnavailable,
            Self::ScannerUnavailable(_) => ErrorKind::ScannerUnavailable,
            Self::ScanTimeout(_) => ErrorKind::ScanTimeout,
            Self::WordlistLoad { .. } => ErrorKind::WordlistLoad,
            Self::MalformedOutput(_) => ErrorKind::MalformedOutput,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// Error classification as it appears in `module_errors`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "UnreachableTargetError")]
    UnreachableTarget,
    #[serde(rename = "TLSUnavailableError")]
    TlsUnavailable,
    #[serde(rename = "ScannerUnavailableError")]
    ScannerUnavailable,
    #[serde(rename = "ScanTimeoutError")]
    ScanTimeout,
    #[serde(rename = "WordlistLoadError")]
    WordlistLoad,
    #[serde(rename = "MalformedOutputError")]
    MalformedOutput,
    #[serde(rename = "CancelledError")]
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::UnreachableTarget => "UnreachableTargetError",
            Self::TlsUnavailable => "TLSUnavailableError",
            Self::ScannerUnavailable => "ScannerUnavailableError",
            Self::ScanTimeout => "ScanTimeoutError",
            Self::WordlistLoad => "WordlistLoadError",
            Self::MalformedOutput => "MalformedOutputError",
            Self::Cancelled => "CancelledError",
        };
        f.write_str(name)
    }
}

/// Fatal errors raised while building the scan engine.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Configuration loading and saving errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine configuration directory")]
    DirectoryNotFound,

    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("failed to write {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("invalid settings format: {0}")]
    InvalidFormat(String),

    #[error("invalid setting: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Report persistence and parsing errors.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to write report to {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("failed to read report from {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("malformed report: {0}")]
    Malformed(String),

    #[error("report references an invalid target: {0}")]
    Target(#[from] TargetError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors surfaced by the command-line front end.
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Target(#[from] TargetError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl From<csv::Error> for CliError {
    fn from(err: csv::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Result type alias for module operations.
pub type ModuleResult<T> = Result<T, ModuleError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type alias for report operations.
pub type ReportResult<T> = Result<T, ReportError>;

/// Result type alias for CLI operations.
pub type CliResult<T> = Result<T, CliError>;
