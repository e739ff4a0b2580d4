//! Port enumeration through the external nmap binary.
//!
//! nmap runs with XML output on stdout; the XML is parsed into port
//! findings. The whole invocation is bounded by a wall-clock budget that
//! depends on the scan mode.

use crate::error::{ModuleError, ModuleResult};
use crate::scanner::{CancelToken, PortScanBackend, PortScanMode, ScanConfig};
use crate::services;
use crate::types::{Port, PortFinding, PortSpec, PortState, Protocol, Target};
use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::future::Future;
use std::io::ErrorKind as IoErrorKind;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Runs `nmap -sV` as a child process.
#[derive(Debug, Clone)]
pub struct NmapBackend {
    binary: PathBuf,
}

impl NmapBackend {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Command line arguments for one invocation.
    pub fn args(host: &str, ports: &PortSpec) -> Vec<String> {
        let mut args = vec![
            "-sV".to_string(),
            "--version-intensity".to_string(),
            "5".to_string(),
            "-p".to_string(),
            ports.to_string(),
            "-oX".to_string(),
            "-".to_string(),
        ];
        if matches!(host.parse::<IpAddr>(), Ok(IpAddr::V6(_))) {
            args.push("-6".to_string());
        }
        args.push(host.to_string());
        args
    }
}

#[async_trait]
impl PortScanBackend for NmapBackend {
    fn name(&self) -> &str {
        "nmap"
    }

    async fn scan(&self, host: &str, ports: &PortSpec) -> ModuleResult<Vec<PortFinding>> {
        debug!(binary = %self.binary.display(), host, ports = %ports, "spawning port scanner");

        let output = Command::new(&self.binary)
            .args(Self::args(host, ports))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                let reason = match e.kind() {
                    IoErrorKind::NotFound => "not installed".to_string(),
                    IoErrorKind::PermissionDenied => "not executable".to_string(),
                    _ => e.to_string(),
                };
                ModuleError::ScannerUnavailable(format!("{}: {}", self.binary.display(), reason))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ModuleError::MalformedOutput(format!(
                "{} exited with {}: {}",
                self.binary.display(),
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_nmap_xml(&stdout)
    }
}

#[derive(Debug, Default)]
struct PortEntry {
    port: Option<Port>,
    protocol: Option<Protocol>,
    state: Option<PortState>,
    service: Option<String>,
    product: Option<String>,
    version: Option<String>,
}

impl PortEntry {
    fn finish(self) -> ModuleResult<Option<PortFinding>> {
        let port = self
            .port
            .ok_or_else(|| ModuleError::MalformedOutput("port element without portid".into()))?;
        let Some(protocol) = self.protocol else {
            debug!(%port, "skipping port with unsupported protocol");
            return Ok(None);
        };
        let state = self
            .state
            .ok_or_else(|| ModuleError::MalformedOutput(format!("port {} has no state", port)))?;

        let service = self
            .service
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| services::service_or_unknown(port).to_string());

        let banner: Vec<String> = [self.product, self.version]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect();
        let version = (!banner.is_empty()).then(|| banner.join(" "));

        Ok(Some(PortFinding {
            port,
            protocol,
            state,
            service,
            version,
        }))
    }
}

fn map_state(state: &str) -> PortState {
    match state {
        "open" => PortState::Open,
        "closed" => PortState::Closed,
        // open|filtered, closed|filtered, unfiltered and anything newer.
        _ => PortState::Filtered,
    }
}

fn attributes(element: &BytesStart<'_>) -> ModuleResult<Vec<(Vec<u8>, String)>> {
    element
        .attributes()
        .map(|attr| {
            let attr = attr.map_err(|e| ModuleError::MalformedOutput(e.to_string()))?;
            let value = attr
                .unescape_value()
                .map_err(|e| ModuleError::MalformedOutput(e.to_string()))?;
            Ok((attr.key.as_ref().to_vec(), value.into_owned()))
        })
        .collect()
}

/// Parse nmap's `-oX` document into port findings, sorted by port.
pub fn parse_nmap_xml(xml: &str) -> ModuleResult<Vec<PortFinding>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut findings = Vec::new();
    let mut saw_root = false;
    let mut current: Option<PortEntry> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"nmaprun" => saw_root = true,
                b"port" => {
                    let mut entry = PortEntry::default();
                    for (key, value) in attributes(&e)? {
                        match key.as_slice() {
                            b"portid" => {
                                entry.port = Some(value.parse().map_err(|_| {
                                    ModuleError::MalformedOutput(format!("bad portid: {}", value))
                                })?)
                            }
                            b"protocol" => {
                                entry.protocol = match value.as_str() {
                                    "tcp" => Some(Protocol::Tcp),
                                    "udp" => Some(Protocol::Udp),
                                    _ => None,
                                }
                            }
                            _ => {}
                        }
                    }
                    current = Some(entry);
                }
                b"state" => {
                    if let Some(entry) = current.as_mut() {
                        for (key, value) in attributes(&e)? {
                            if key == b"state" {
                                entry.state = Some(map_state(&value));
                            }
                        }
                    }
                }
                b"service" => {
                    if let Some(entry) = current.as_mut() {
                        for (key, value) in attributes(&e)? {
                            match key.as_slice() {
                                b"name" => entry.service = Some(value),
                                b"product" => entry.product = Some(value),
                                b"version" => entry.version = Some(value),
                                _ => {}
                            }
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"port" {
                    if let Some(entry) = current.take() {
                        findings.extend(entry.finish()?);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ModuleError::MalformedOutput(format!(
                    "invalid XML at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(ModuleError::MalformedOutput(
            "output is not an nmap XML report".into(),
        ));
    }

    findings.sort_by_key(|f: &PortFinding| (f.port, f.protocol == Protocol::Udp));
    Ok(findings)
}

/// Run `fut`, turning an overrun of `budget` into a scan timeout.
pub async fn within_budget<T, F>(budget: Duration, fut: F) -> ModuleResult<T>
where
    F: Future<Output = ModuleResult<T>>,
{
    tokio::time::timeout(budget, fut)
        .await
        .unwrap_or(Err(ModuleError::ScanTimeout(budget.as_secs())))
}

/// Port enumeration module.
#[derive(Clone)]
pub struct PortEnumerator {
    backend: Arc<dyn PortScanBackend>,
    fast_budget: Duration,
    full_budget: Duration,
}

impl PortEnumerator {
    pub fn new(config: &ScanConfig, backend: Arc<dyn PortScanBackend>) -> Self {
        Self {
            backend,
            fast_budget: config.fast_scan_budget,
            full_budget: config.full_scan_budget,
        }
    }

    /// Enumerator backed by the configured nmap binary.
    pub fn nmap(config: &ScanConfig) -> Self {
        Self::new(config, Arc::new(NmapBackend::new(&config.nmap_binary)))
    }

    pub async fn enumerate(
        &self,
        target: &Target,
        mode: &PortScanMode,
        cancel: &CancelToken,
    ) -> ModuleResult<Vec<PortFinding>> {
        if cancel.is_cancelled() {
            return Err(ModuleError::Cancelled);
        }

        let spec = mode.spec();
        let budget = mode.budget(self.fast_budget, self.full_budget);
        info!(
            backend = self.backend.name(),
            host = target.host(),
            %mode,
            ports = spec.count(),
            budget_secs = budget.as_secs(),
            "enumerating ports"
        );

        let scan = within_budget(budget, self.backend.scan(target.host(), &spec));
        let findings = tokio::select! {
            result = scan => result?,
            _ = cancel.cancelled() => return Err(ModuleError::Cancelled),
        };

        let open = findings
            .iter()
            .filter(|f| f.state == PortState::Open)
            .count();
        if open == 0 {
            warn!(host = target.host(), "no open ports reported");
        }
        info!(reported = findings.len(), open, "port enumeration complete");
        Ok(findings)
    }
}

impl std::fmt::Debug for PortEnumerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortEnumerator")
            .field("backend", &self.backend.name())
            .field("fast_budget", &self.fast_budget)
            .field("full_budget", &self.full_budget)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE nmaprun>
<nmaprun scanner="nmap" args="nmap -sV -p 22,80,443 -oX - 10.0.0.5" version="7.94">
  <host>
    <status state="up" reason="syn-ack"/>
    <address addr="10.0.0.5" addrtype="ipv4"/>
    <ports>
      <port protocol="tcp" portid="443">
        <state state="filtered" reason="no-response"/>
        <service name="https" method="table" conf="3"/>
      </port>
      <port protocol="tcp" portid="22">
        <state state="open" reason="syn-ack"/>
        <service name="ssh" product="OpenSSH" version="8.9p1 Ubuntu 3" method="probed" conf="10">
          <cpe>cpe:/a:openbsd:openssh:8.9p1</cpe>
        </service>
      </port>
      <port protocol="tcp" portid="8081">
        <state state="open|filtered" reason="no-response"/>
      </port>
      <port protocol="tcp" portid="80">
        <state state="open" reason="syn-ack"/>
        <service name="http" product="nginx" method="probed" conf="10"/>
      </port>
    </ports>
  </host>
</nmaprun>"#;

    struct FixedBackend(ModuleResult<Vec<PortFinding>>);

    #[async_trait]
    impl PortScanBackend for FixedBackend {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn scan(&self, _host: &str, _ports: &PortSpec) -> ModuleResult<Vec<PortFinding>> {
            self.0.clone()
        }
    }

    struct StalledBackend;

    #[async_trait]
    impl PortScanBackend for StalledBackend {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn scan(&self, _host: &str, _ports: &PortSpec) -> ModuleResult<Vec<PortFinding>> {
            std::future::pending().await
        }
    }

    #[test]
    fn test_parse_nmap_xml() {
        let findings = parse_nmap_xml(SAMPLE).unwrap();
        let ports: Vec<u16> = findings.iter().map(|f| f.port.as_u16()).collect();
        assert_eq!(ports, vec![22, 80, 443, 8081]);

        assert_eq!(findings[0].state, PortState::Open);
        assert_eq!(findings[0].service, "ssh");
        assert_eq!(findings[0].version.as_deref(), Some("OpenSSH 8.9p1 Ubuntu 3"));
        assert_eq!(findings[1].version.as_deref(), Some("nginx"));
        assert_eq!(findings[2].state, PortState::Filtered);
        assert_eq!(findings[2].version, None);

        // No service element: falls back to the well-known table.
        assert_eq!(findings[3].state, PortState::Filtered);
        assert_eq!(findings[3].service, "unknown");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_nmap_xml("Starting Nmap 7.94"),
            Err(ModuleError::MalformedOutput(_))
        ));
        assert!(matches!(
            parse_nmap_xml(r#"<nmaprun><host><ports><port protocol="tcp" portid="x">"#),
            Err(ModuleError::MalformedOutput(_))
        ));
        assert_eq!(parse_nmap_xml("<nmaprun></nmaprun>").unwrap(), vec![]);
    }

    #[test]
    fn test_nmap_args() {
        let args = NmapBackend::args("10.0.0.5", &PortSpec::fast());
        assert_eq!(&args[..4], &["-sV", "--version-intensity", "5", "-p"]);
        assert_eq!(args.last().map(String::as_str), Some("10.0.0.5"));

        let args = NmapBackend::args("::1", &PortSpec::full());
        assert!(args.contains(&"-6".to_string()));
        assert!(args.contains(&"1-65535".to_string()));
    }

    #[tokio::test]
    async fn test_missing_binary_is_scanner_unavailable() {
        let backend = NmapBackend::new("/nonexistent/bin/nmap-vulnscan-test");
        let result = backend.scan("127.0.0.1", &PortSpec::fast()).await;
        assert!(matches!(result, Err(ModuleError::ScannerUnavailable(_))));
    }

    #[tokio::test]
    async fn test_budget_overrun_is_scan_timeout() {
        let result: ModuleResult<()> =
            within_budget(Duration::from_millis(20), std::future::pending()).await;
        assert_eq!(result, Err(ModuleError::ScanTimeout(0)));

        let config = ScanConfig::default()
            .with_scan_budgets(Duration::from_millis(20), Duration::from_millis(40));
        let enumerator = PortEnumerator::new(&config, Arc::new(StalledBackend));
        let target = Target::resolve("10.0.0.5").unwrap();
        let result = enumerator
            .enumerate(&target, &PortScanMode::Fast, &CancelToken::new())
            .await;
        assert!(matches!(result, Err(ModuleError::ScanTimeout(_))));
    }

    #[tokio::test]
    async fn test_enumerate_passes_backend_findings() {
        let findings = parse_nmap_xml(SAMPLE).unwrap();
        let enumerator = PortEnumerator::new(
            &ScanConfig::default(),
            Arc::new(FixedBackend(Ok(findings.clone()))),
        );
        let target = Target::resolve("10.0.0.5").unwrap();
        let result = enumerator
            .enumerate(&target, &PortScanMode::Full, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(result, findings);
    }

    #[tokio::test]
    async fn test_cancel_aborts_running_scan() {
        let enumerator = PortEnumerator::new(&ScanConfig::default(), Arc::new(StalledBackend));
        let target = Target::resolve("10.0.0.5").unwrap();
        let cancel = CancelToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = enumerator
            .enumerate(&target, &PortScanMode::Fast, &cancel)
            .await;
        assert_eq!(result, Err(ModuleError::Cancelled));
    }
}
