//! Scan target parsing and normalization.
//!
//! Accepts the forms a user is likely to type:
//! - Bare hosts: "example.com", "10.0.0.5", "::1"
//! - Host and port: "example.com:8443", "[2001:db8::1]:443"
//! - URLs: "https://example.com/app", "http://10.0.0.5:8080"
//! - Raw TCP endpoints: "tcp://10.0.0.5:22"
//!
//! Resolution into a `Target` is pure string work. DNS lookups only happen
//! in [`Target::lookup`].

use crate::error::TargetError;
use crate::types::Port;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;
use url::Url;

/// How the target is spoken to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
    /// Plain TCP endpoint, no HTTP semantics.
    Raw,
}

impl Scheme {
    fn prefix(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Raw => "tcp",
        }
    }

    fn from_prefix(prefix: &str) -> Result<Self, TargetError> {
        match prefix.to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            "tcp" => Ok(Self::Raw),
            _ => Err(TargetError::UnsupportedScheme(prefix.to_string())),
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A normalized, immutable scan target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    scheme: Scheme,
    host: String,
    port: Port,
}

impl Target {
    /// Parse raw user input into a target.
    ///
    /// When no scheme is given, `https` is assumed unless the port is
    /// explicitly 80.
    pub fn resolve(input: &str) -> Result<Self, TargetError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(TargetError::Empty);
        }

        let (scheme, rest) = match trimmed.split_once("://") {
            Some((prefix, rest)) => (Some(Scheme::from_prefix(prefix)?), rest),
            None => (None, trimmed),
        };

        // Drop path, query and fragment; only the authority matters.
        let authority = rest
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default();
        let authority = match authority.rsplit_once('@') {
            Some((_, host_part)) => host_part,
            None => authority,
        };
        if authority.is_empty() {
            return Err(TargetError::Empty);
        }

        let (host, port) = split_host_port(authority)?;

        let scheme = scheme.unwrap_or(if port == Some(Port::HTTP) {
            Scheme::Http
        } else {
            Scheme::Https
        });

        let port = match (port, scheme) {
            (Some(port), _) => port,
            (None, Scheme::Http) => Port::HTTP,
            (None, Scheme::Https) => Port::HTTPS,
            (None, Scheme::Raw) => return Err(TargetError::MissingPort(trimmed.to_string())),
        };

        Ok(Self { scheme, host, port })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Port {
        self.port
    }

    /// The host as an IP address, when it is a literal.
    pub fn ip(&self) -> Option<IpAddr> {
        self.host.parse().ok()
    }

    /// Whether HTTP-based modules make sense for this target.
    pub fn speaks_http(&self) -> bool {
        self.scheme != Scheme::Raw
    }

    /// Whether the target is expected to speak TLS.
    pub fn is_tls(&self) -> bool {
        self.scheme == Scheme::Https || self.port.is_tls_port()
    }

    /// Base URL used by the HTTP modules, always ending in `/`.
    pub fn base_url(&self) -> Result<Url, url::ParseError> {
        let scheme = match self.scheme {
            Scheme::Http => "http",
            // Raw TCP targets on a TLS port are addressed over https.
            Scheme::Https | Scheme::Raw => {
                if self.scheme == Scheme::Https || self.port.is_tls_port() {
                    "https"
                } else {
                    "http"
                }
            }
        };
        Url::parse(&format!("{}://{}/", scheme, self.authority()))
    }

    /// `host:port`, with IPv6 literals bracketed.
    pub fn authority(&self) -> String {
        match self.ip() {
            Some(IpAddr::V6(_)) => format!("[{}]:{}", self.host, self.port),
            _ => format!("{}:{}", self.host, self.port),
        }
    }

    /// Resolve the host to its IP addresses.
    pub async fn lookup(&self) -> Result<Vec<IpAddr>, TargetError> {
        if let Some(ip) = self.ip() {
            return Ok(vec![ip]);
        }

        let resolver =
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());

        let response = resolver
            .lookup_ip(self.host.as_str())
            .await
            .map_err(|e| TargetError::DnsResolutionFailed(self.host.clone(), e.to_string()))?;

        let ips: Vec<IpAddr> = response.iter().collect();
        if ips.is_empty() {
            return Err(TargetError::NoAddressesFound(self.host.clone()));
        }
        Ok(ips)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority())
    }
}

impl FromStr for Target {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::resolve(s)
    }
}

/// Split an authority into a normalized host and an optional port.
fn split_host_port(authority: &str) -> Result<(String, Option<Port>), TargetError> {
    if let Some(bracketed) = authority.strip_prefix('[') {
        let (literal, after) = bracketed
            .split_once(']')
            .ok_or_else(|| TargetError::InvalidIpLiteral(authority.to_string()))?;
        let ip: Ipv6Addr = literal
            .parse()
            .map_err(|_| TargetError::InvalidIpLiteral(authority.to_string()))?;
        let port = match after {
            "" => None,
            _ => {
                let digits = after
                    .strip_prefix(':')
                    .ok_or_else(|| TargetError::InvalidFormat(authority.to_string()))?;
                Some(parse_port(digits)?)
            }
        };
        return Ok((ip.to_string(), port));
    }

    // More than one colon without brackets can only be a bare IPv6 literal.
    if authority.matches(':').count() > 1 {
        let ip: Ipv6Addr = authority
            .parse()
            .map_err(|_| TargetError::InvalidIpLiteral(authority.to_string()))?;
        return Ok((ip.to_string(), None));
    }

    let (host, port) = match authority.split_once(':') {
        Some((host, digits)) => (host, Some(parse_port(digits)?)),
        None => (authority, None),
    };

    Ok((normalize_host(host)?, port))
}

fn parse_port(digits: &str) -> Result<Port, TargetError> {
    digits
        .parse::<Port>()
        .map_err(|_| TargetError::InvalidPort(digits.to_string()))
}

fn normalize_host(host: &str) -> Result<String, TargetError> {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    if host.is_empty() {
        return Err(TargetError::Empty);
    }

    if host.chars().all(|c| c.is_ascii_digit() || c == '.') {
        let ip: Ipv4Addr = host
            .parse()
            .map_err(|_| TargetError::InvalidIpLiteral(host.clone()))?;
        return Ok(ip.to_string());
    }

    if is_valid_hostname(&host) {
        Ok(host)
    } else {
        Err(TargetError::InvalidFormat(host))
    }
}

/// Check if a string is a valid hostname.
fn is_valid_hostname(s: &str) -> bool {
    if s.is_empty() || s.len() > 253 {
        return false;
    }

    // Each label must be 1-63 characters, alphanumeric at both ends
    s.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && label.starts_with(|c: char| c.is_ascii_alphanumeric())
            && label.ends_with(|c: char| c.is_ascii_alphanumeric())
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_host_defaults_to_https() {
        let target = Target::resolve("example.com").unwrap();
        assert_eq!(target.scheme(), Scheme::Https);
        assert_eq!(target.host(), "example.com");
        assert_eq!(target.port(), Port::HTTPS);
        assert_eq!(target.to_string(), "https://example.com:443");
    }

    #[test]
    fn test_explicit_port_80_means_http() {
        let target = Target::resolve("Example.COM:80").unwrap();
        assert_eq!(target.scheme(), Scheme::Http);
        assert_eq!(target.host(), "example.com");

        let target = Target::resolve("example.com:8080").unwrap();
        assert_eq!(target.scheme(), Scheme::Https);
        assert_eq!(target.port().as_u16(), 8080);
    }

    #[test]
    fn test_url_input() {
        let target = Target::resolve("  http://user@10.0.0.5:8080/admin?x=1 ").unwrap();
        assert_eq!(target.scheme(), Scheme::Http);
        assert_eq!(target.host(), "10.0.0.5");
        assert_eq!(target.port().as_u16(), 8080);
        assert!(!target.is_tls());

        let target = Target::resolve("HTTPS://example.com/").unwrap();
        assert_eq!(target.port(), Port::HTTPS);
        assert!(target.is_tls());
    }

    #[test]
    fn test_ipv6_literals() {
        let target = Target::resolve("[2001:db8::1]:8443").unwrap();
        assert_eq!(target.host(), "2001:db8::1");
        assert_eq!(target.port().as_u16(), 8443);
        assert_eq!(target.authority(), "[2001:db8::1]:8443");

        let target = Target::resolve("::1").unwrap();
        assert_eq!(target.ip(), Some("::1".parse().unwrap()));
        assert_eq!(target.port(), Port::HTTPS);
    }

    #[test]
    fn test_raw_targets() {
        let target = Target::resolve("tcp://10.0.0.5:22").unwrap();
        assert_eq!(target.scheme(), Scheme::Raw);
        assert!(!target.speaks_http());
        assert!(matches!(
            Target::resolve("tcp://10.0.0.5"),
            Err(TargetError::MissingPort(_))
        ));
    }

    #[test]
    fn test_invalid_targets() {
        assert_eq!(Target::resolve("   "), Err(TargetError::Empty));
        assert_eq!(Target::resolve("https://"), Err(TargetError::Empty));
        assert!(matches!(
            Target::resolve("[::1"),
            Err(TargetError::InvalidIpLiteral(_))
        ));
        assert!(matches!(
            Target::resolve("999.1.1.1"),
            Err(TargetError::InvalidIpLiteral(_))
        ));
        assert!(matches!(
            Target::resolve("1.2.3"),
            Err(TargetError::InvalidIpLiteral(_))
        ));
        assert!(matches!(
            Target::resolve("example.com:0"),
            Err(TargetError::InvalidPort(_))
        ));
        assert!(matches!(
            Target::resolve("ftp://example.com"),
            Err(TargetError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            Target::resolve("-bad-.com"),
            Err(TargetError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_display_resolves_to_same_target() {
        for input in ["example.com", "http://a.example:8080", "[::1]:443", "tcp://h:22"] {
            let target = Target::resolve(input).unwrap();
            assert_eq!(Target::resolve(&target.to_string()).unwrap(), target);
        }
    }

    #[test]
    fn test_base_url() {
        let target = Target::resolve("http://example.com:8080/app").unwrap();
        assert_eq!(
            target.base_url().unwrap().as_str(),
            "http://example.com:8080/"
        );

        let target = Target::resolve("[::1]").unwrap();
        assert_eq!(target.base_url().unwrap().as_str(), "https://[::1]/");
    }

    #[tokio::test]
    async fn test_lookup_ip_literal_skips_dns() {
        let target = Target::resolve("127.0.0.1:80").unwrap();
        assert_eq!(
            target.lookup().await.unwrap(),
            vec!["127.0.0.1".parse::<IpAddr>().unwrap()]
        );
    }
}
