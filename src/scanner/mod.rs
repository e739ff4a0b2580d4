//! Scan modules and the orchestrator that runs them.
//!
//! The orchestrator launches the selected modules concurrently. Each one
//! returns its own findings; a module error is recorded in the report and
//! never stops its siblings.

pub mod cancel;
pub mod headers;
pub mod paths;
pub mod ports;
pub mod rate_limiter;
pub mod tls;
pub mod traits;
pub mod wordlist;

pub use cancel::CancelToken;
pub use headers::{HeaderAnalyzer, HeaderPolicy, HeaderPolicyEntry};
pub use paths::{PathProber, ProbeOutcome};
pub use ports::{parse_nmap_xml, within_budget, NmapBackend, PortEnumerator};
pub use rate_limiter::RateLimiter;
pub use tls::TlsAnalyzer;
pub use traits::{PortScanBackend, PortScanMode, ScanConfig};
pub use wordlist::{default_wordlist, WordlistSource};

use crate::error::{ModuleError, ScanError, TargetError};
use crate::report::{ModuleFailure, ModuleName, ModuleResults, ScanReport, ScanStatus};
use crate::types::{ScanId, Target};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};

/// Which modules a scan runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleSet {
    pub headers: bool,
    pub tls: bool,
    pub ports: Option<PortScanMode>,
    pub paths: Option<WordlistSource>,
}

impl ModuleSet {
    /// Every module, with the default wordlist.
    pub fn all(mode: PortScanMode) -> Self {
        Self {
            headers: true,
            tls: true,
            ports: Some(mode),
            paths: Some(WordlistSource::Default),
        }
    }

    pub fn with_headers(mut self) -> Self {
        self.headers = true;
        self
    }

    pub fn with_tls(mut self) -> Self {
        self.tls = true;
        self
    }

    pub fn with_ports(mut self, mode: PortScanMode) -> Self {
        self.ports = Some(mode);
        self
    }

    pub fn with_paths(mut self, source: WordlistSource) -> Self {
        self.paths = Some(source);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.names().is_empty()
    }

    pub fn names(&self) -> Vec<ModuleName> {
        let mut names = Vec::with_capacity(4);
        if self.headers {
            names.push(ModuleName::Headers);
        }
        if self.tls {
            names.push(ModuleName::Ssl);
        }
        if self.ports.is_some() {
            names.push(ModuleName::Ports);
        }
        if self.paths.is_some() {
            names.push(ModuleName::Directories);
        }
        names
    }

    /// Drop modules that cannot apply to `target`.
    fn applicable_to(&self, target: &Target) -> Self {
        let mut effective = self.clone();
        if effective.tls && !target.is_tls() {
            info!(%target, "target does not speak TLS, skipping ssl module");
            effective.tls = false;
        }
        if !target.speaks_http() && !target.is_tls() {
            if effective.headers || effective.paths.is_some() {
                info!(%target, "raw TCP target, skipping HTTP modules");
            }
            effective.headers = false;
            effective.paths = None;
        }
        effective
    }
}

/// Runs scans against one target at a time.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: ScanConfig,
    headers: HeaderAnalyzer,
    tls: TlsAnalyzer,
    paths: PathProber,
    ports: PortEnumerator,
}

impl Orchestrator {
    pub fn new(config: ScanConfig) -> Result<Self, ScanError> {
        config.validate()?;
        Ok(Self {
            headers: HeaderAnalyzer::new(&config)?,
            tls: TlsAnalyzer::new(&config),
            paths: PathProber::new(&config)?,
            ports: PortEnumerator::nmap(&config),
            config,
        })
    }

    /// Replace the nmap backend, e.g. with a fake in tests.
    pub fn with_port_backend(mut self, backend: Arc<dyn PortScanBackend>) -> Self {
        self.ports = PortEnumerator::new(&self.config, backend);
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Resolve `raw` and scan it. Only target resolution can fail.
    pub async fn scan(
        &self,
        raw: &str,
        modules: &ModuleSet,
        cancel: &CancelToken,
    ) -> Result<ScanReport, TargetError> {
        let target = Target::resolve(raw)?;
        Ok(self.run(&target, modules, cancel).await)
    }

    /// Scan a resolved target. Always produces a report.
    pub async fn run(
        &self,
        target: &Target,
        modules: &ModuleSet,
        cancel: &CancelToken,
    ) -> ScanReport {
        let scan_id = ScanId::new();
        let span = info_span!("scan", scan_id = %scan_id.short(), target = %target);
        self.run_modules(scan_id, target, modules, cancel)
            .instrument(span)
            .await
    }

    async fn run_modules(
        &self,
        scan_id: ScanId,
        target: &Target,
        modules: &ModuleSet,
        cancel: &CancelToken,
    ) -> ScanReport {
        info!(status = %ScanStatus::Pending, requested = ?modules.names(), "scan created");
        let effective = modules.applicable_to(target);
        let started_at = Utc::now();
        info!(status = %ScanStatus::Running, modules = ?effective.names(), "scan started");

        let headers = async {
            if effective.headers {
                Some(self.headers.analyze(target, cancel).await)
            } else {
                None
            }
        };
        let tls = async {
            if effective.tls {
                Some(self.tls.analyze(target, cancel).await)
            } else {
                None
            }
        };
        let ports = async {
            match &effective.ports {
                Some(mode) => Some(self.ports.enumerate(target, mode, cancel).await),
                None => None,
            }
        };
        let paths = async {
            match &effective.paths {
                Some(source) => Some(match source.load().await {
                    Ok(wordlist) => self.paths.probe(target, wordlist, cancel).await,
                    Err(e) => Err(e),
                }),
                None => None,
            }
        };

        let (headers, tls, ports, paths) = tokio::join!(headers, tls, ports, paths);

        let mut results = ModuleResults::default();
        let errors = &mut results.module_errors;

        match headers {
            Some(Ok(findings)) => results.headers = findings,
            Some(Err(e)) => record_failure(errors, ModuleName::Headers, &e),
            None => {}
        }
        match tls {
            Some(Ok(findings)) => results.tls = findings,
            Some(Err(e)) => record_failure(errors, ModuleName::Ssl, &e),
            None => {}
        }
        match ports {
            Some(Ok(findings)) => results.ports = findings,
            Some(Err(e)) => record_failure(errors, ModuleName::Ports, &e),
            None => {}
        }
        match paths {
            Some(Ok(outcome)) => {
                if !outcome.complete {
                    record_failure(errors, ModuleName::Directories, &ModuleError::Cancelled);
                }
                results.paths = outcome.findings;
            }
            Some(Err(e)) => record_failure(errors, ModuleName::Directories, &e),
            None => {}
        }

        let report = ScanReport::assemble(
            scan_id,
            target.clone(),
            started_at,
            Utc::now(),
            effective.names(),
            results,
        );

        info!(
            status = %report.status(),
            failed = report.module_errors().len(),
            elapsed_ms = report.duration().num_milliseconds(),
            "scan finished"
        );
        report
    }
}

fn record_failure(
    errors: &mut BTreeMap<ModuleName, ModuleFailure>,
    module: ModuleName,
    error: &ModuleError,
) {
    warn!(%module, kind = %error.kind(), %error, "module failed");
    errors.insert(module, ModuleFailure::from(error));
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Loopback HTTP server with canned responses.

    use std::net::SocketAddr;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    pub(crate) fn http_response(status: u16, headers: &[(&str, &str)], body: &str) -> String {
        let reason = match status {
            200 => "OK",
            301 => "Moved Permanently",
            302 => "Found",
            403 => "Forbidden",
            404 => "Not Found",
            _ => "Unknown",
        };
        let mut response = format!("HTTP/1.1 {} {}\r\n", status, reason);
        for (name, value) in headers {
            response.push_str(&format!("{}: {}\r\n", name, value));
        }
        response.push_str(&format!(
            "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        ));
        response
    }

    /// Serve `handler(path)` on a random port. `None` drops the connection.
    pub(crate) async fn serve<F>(handler: F) -> SocketAddr
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handler = Arc::new(handler);

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut chunk = [0u8; 1024];
                    loop {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => {
                                request.extend_from_slice(&chunk[..n]);
                                if request.windows(4).any(|w| w == b"\r\n\r\n") {
                                    break;
                                }
                            }
                        }
                    }
                    let request = String::from_utf8_lossy(&request);
                    let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                    if let Some(response) = handler(&path) {
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    }
                });
            }
        });

        addr
    }
}
