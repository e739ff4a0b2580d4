//! TLS protocol and certificate analysis.
//!
//! Each protocol version gets its own OpenSSL handshake pinned to that
//! version, at security level 0 and offering every cipher the library
//! knows, so servers that only speak obsolete versions or suites still
//! complete the handshake. Handshakes run on blocking threads with
//! socket-level timeouts.

use crate::error::{ModuleError, ModuleResult};
use crate::scanner::{CancelToken, ScanConfig};
use crate::types::{CertificateInfo, Severity, Target, TlsFinding, TlsVersion, VulnerabilityKind};
use chrono::{DateTime, Utc};
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode, SslVersion};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, info};
use x509_parser::prelude::*;

/// Cipher list offered by pinned handshakes: everything, including NULL suites.
const OFFERED_CIPHERS: &str = "ALL:COMPLEMENTOFALL:@SECLEVEL=0";

/// Cipher name fragments that mark a suite as weak.
const WEAK_CIPHER_MARKERS: &[&str] = &[
    "RC4", "DES", "3DES", "NULL", "EXPORT", "ANON", "ADH", "MD5",
];

/// What a successful handshake revealed.
#[derive(Debug, Clone)]
struct HandshakeOutcome {
    cipher: Option<String>,
    leaf_der: Option<Vec<u8>>,
}

/// Inputs to the vulnerability rule table.
#[derive(Debug, Clone)]
pub(crate) struct RuleContext<'a> {
    pub supported: &'a [TlsVersion],
    pub ciphers: &'a [(TlsVersion, String)],
    pub certificate: Option<&'a CertificateInfo>,
    pub chain_verified: bool,
    pub now: DateTime<Utc>,
    pub expiry_warning_days: i64,
}

struct TlsRule {
    kind: VulnerabilityKind,
    severity: Severity,
    check: fn(&RuleContext<'_>) -> Option<String>,
}

const RULES: &[TlsRule] = &[
    TlsRule {
        kind: VulnerabilityKind::WeakProtocol,
        severity: Severity::High,
        check: weak_protocol,
    },
    TlsRule {
        kind: VulnerabilityKind::CertificateExpired,
        severity: Severity::Critical,
        check: certificate_expired,
    },
    TlsRule {
        kind: VulnerabilityKind::CertificateExpiringSoon,
        severity: Severity::Medium,
        check: certificate_expiring_soon,
    },
    TlsRule {
        kind: VulnerabilityKind::CertificateUntrusted,
        severity: Severity::High,
        check: certificate_untrusted,
    },
    TlsRule {
        kind: VulnerabilityKind::WeakCipher,
        severity: Severity::Medium,
        check: weak_cipher,
    },
];

fn weak_protocol(ctx: &RuleContext<'_>) -> Option<String> {
    let weak: Vec<&str> = ctx
        .supported
        .iter()
        .filter(|v| v.is_weak())
        .map(|v| v.as_str())
        .collect();
    (!weak.is_empty()).then(|| format!("Weak TLS versions supported: {}", weak.join(", ")))
}

fn certificate_expired(ctx: &RuleContext<'_>) -> Option<String> {
    let cert = ctx.certificate?;
    cert.is_expired_at(ctx.now).then(|| {
        format!(
            "Certificate expired on {} ({} days ago)",
            cert.not_after.format("%Y-%m-%d"),
            -cert.days_until_expiry
        )
    })
}

fn certificate_expiring_soon(ctx: &RuleContext<'_>) -> Option<String> {
    let cert = ctx.certificate?;
    let days = cert.days_until_expiry;
    (!cert.is_expired_at(ctx.now) && (0..=ctx.expiry_warning_days).contains(&days))
        .then(|| format!("Certificate expires in {} days", days))
}

fn certificate_untrusted(ctx: &RuleContext<'_>) -> Option<String> {
    let cert = ctx.certificate?;
    // Expired certificates are reported by their own rule.
    (!ctx.chain_verified && !cert.is_expired_at(ctx.now))
        .then(|| format!("Certificate chain for {} could not be verified", cert.subject))
}

fn weak_cipher(ctx: &RuleContext<'_>) -> Option<String> {
    let weak: Vec<String> = ctx
        .ciphers
        .iter()
        .filter(|(_, cipher)| is_weak_cipher(cipher))
        .map(|(version, cipher)| format!("{} ({})", cipher, version))
        .collect();
    (!weak.is_empty()).then(|| format!("Weak cipher suites negotiated: {}", weak.join(", ")))
}

fn is_weak_cipher(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    WEAK_CIPHER_MARKERS.iter().any(|marker| upper.contains(marker))
}

/// Run every rule against the collected facts.
pub(crate) fn evaluate_rules(ctx: &RuleContext<'_>) -> Vec<TlsFinding> {
    RULES
        .iter()
        .filter_map(|rule| {
            (rule.check)(ctx).map(|description| TlsFinding::Vulnerability {
                kind: rule.kind,
                severity: rule.severity,
                description,
            })
        })
        .collect()
}

/// Probes protocol support and inspects the served certificate.
#[derive(Debug, Clone)]
pub struct TlsAnalyzer {
    timeout: Duration,
    expiry_warning_days: i64,
}

impl TlsAnalyzer {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            timeout: config.tls_timeout,
            expiry_warning_days: config.expiry_warning_days,
        }
    }

    pub async fn analyze(
        &self,
        target: &Target,
        cancel: &CancelToken,
    ) -> ModuleResult<Vec<TlsFinding>> {
        let host = target.host();
        let port = target.port().as_u16();

        let mut protocols = Vec::with_capacity(TlsVersion::ALL.len());
        let mut supported = Vec::new();
        let mut ciphers = Vec::new();
        let mut latest: Option<HandshakeOutcome> = None;

        for version in TlsVersion::ALL {
            if cancel.is_cancelled() {
                return Err(ModuleError::Cancelled);
            }

            match self.handshake(host, port, version).await {
                Ok(outcome) => {
                    debug!(%version, cipher = ?outcome.cipher, "handshake succeeded");
                    supported.push(version);
                    if let Some(cipher) = &outcome.cipher {
                        ciphers.push((version, cipher.clone()));
                    }
                    protocols.push(TlsFinding::Protocol {
                        version,
                        supported: true,
                        weak: version.is_weak(),
                        cipher: outcome.cipher.clone(),
                    });
                    latest = Some(outcome);
                }
                Err(reason) => {
                    debug!(%version, %reason, "handshake failed");
                    protocols.push(TlsFinding::Protocol {
                        version,
                        supported: false,
                        weak: version.is_weak(),
                        cipher: None,
                    });
                }
            }
        }

        let Some(latest) = latest else {
            return Err(ModuleError::TlsUnavailable(format!(
                "no TLS version could be negotiated with {}",
                target.authority()
            )));
        };

        let chain_verified = self.verify_chain(host, port).await;
        let now = Utc::now();
        let certificate = latest
            .leaf_der
            .as_deref()
            .and_then(|der| parse_certificate(der, chain_verified, now));
        if certificate.is_none() {
            debug!("no parseable leaf certificate");
        }

        let vulnerabilities = evaluate_rules(&RuleContext {
            supported: &supported,
            ciphers: &ciphers,
            certificate: certificate.as_ref(),
            chain_verified,
            now,
            expiry_warning_days: self.expiry_warning_days,
        });

        info!(
            supported = supported.len(),
            chain_verified,
            vulnerabilities = vulnerabilities.len(),
            "tls analysis complete"
        );

        let mut findings = Vec::with_capacity(1 + protocols.len() + vulnerabilities.len());
        findings.extend(certificate.map(TlsFinding::Certificate));
        findings.extend(protocols);
        findings.extend(vulnerabilities);
        Ok(findings)
    }

    async fn handshake(
        &self,
        host: &str,
        port: u16,
        version: TlsVersion,
    ) -> Result<HandshakeOutcome, String> {
        let host = host.to_string();
        let timeout = self.timeout;
        let task =
            tokio::task::spawn_blocking(move || pinned_handshake(&host, port, version, timeout));

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err("handshake timed out".to_string()),
        }
    }

    /// Handshake with full certificate and hostname verification.
    async fn verify_chain(&self, host: &str, port: u16) -> bool {
        let host = host.to_string();
        let timeout = self.timeout;
        let task = tokio::task::spawn_blocking(move || -> Result<(), String> {
            let connector = native_tls::TlsConnector::new().map_err(|e| e.to_string())?;
            let stream = connect_tcp(&host, port, timeout)?;
            connector
                .connect(&host, stream)
                .map(drop)
                .map_err(|e| e.to_string())
        });

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(Ok(()))) => true,
            Ok(Ok(Err(reason))) => {
                debug!(%reason, "certificate chain verification failed");
                false
            }
            _ => false,
        }
    }
}

fn connect_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream, String> {
    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|e| e.to_string())?
        .next()
        .ok_or_else(|| format!("no address for {}", host))?;
    let stream = TcpStream::connect_timeout(&addr, timeout).map_err(|e| e.to_string())?;
    stream
        .set_read_timeout(Some(timeout))
        .and_then(|_| stream.set_write_timeout(Some(timeout)))
        .map_err(|e| e.to_string())?;
    Ok(stream)
}

fn ssl_version(version: TlsVersion) -> SslVersion {
    match version {
        TlsVersion::Tls10 => SslVersion::TLS1,
        TlsVersion::Tls11 => SslVersion::TLS1_1,
        TlsVersion::Tls12 => SslVersion::TLS1_2,
        TlsVersion::Tls13 => SslVersion::TLS1_3,
    }
}

/// Handshake restricted to exactly `version`, without certificate checks.
fn pinned_handshake(
    host: &str,
    port: u16,
    version: TlsVersion,
    timeout: Duration,
) -> Result<HandshakeOutcome, String> {
    let protocol = ssl_version(version);

    let mut builder =
        SslConnector::builder(SslMethod::tls_client()).map_err(|e| e.to_string())?;
    builder.set_verify(SslVerifyMode::NONE);
    builder.set_security_level(0);
    builder
        .set_min_proto_version(Some(protocol))
        .map_err(|e| e.to_string())?;
    builder
        .set_max_proto_version(Some(protocol))
        .map_err(|e| e.to_string())?;
    builder
        .set_cipher_list(OFFERED_CIPHERS)
        .map_err(|e| e.to_string())?;
    let connector = builder.build();

    let config = connector
        .configure()
        .map_err(|e| e.to_string())?
        .verify_hostname(false);
    let stream = connect_tcp(host, port, timeout)?;
    let tls = config.connect(host, stream).map_err(|e| e.to_string())?;

    let ssl = tls.ssl();
    let cipher = ssl.current_cipher().map(|c| c.name().to_string());
    let leaf_der = ssl.peer_certificate().and_then(|cert| cert.to_der().ok());

    Ok(HandshakeOutcome { cipher, leaf_der })
}


fn parse_certificate(
    der: &[u8],
    chain_verified: bool,
    now: DateTime<Utc>,
) -> Option<CertificateInfo> {
    let (_, cert) = parse_x509_certificate(der).ok()?;
    let validity = cert.validity();
    let not_before = asn1_time_to_utc(&validity.not_before)?;
    let not_after = asn1_time_to_utc(&validity.not_after)?;
    let in_window = now >= not_before && now <= not_after;

    Some(CertificateInfo {
        valid: in_window && chain_verified,
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        not_before,
        not_after,
        days_until_expiry: CertificateInfo::days_between(now, not_after),
    })
}

fn asn1_time_to_utc(time: &ASN1Time) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(time.timestamp(), 0)
}
