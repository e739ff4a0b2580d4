//! Port types with validation and parsing.
//!
//! The `Port` newtype ensures values are always valid port numbers (1-65535).
//! `PortSpec` is what gets handed to the external port scanner.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A validated network port number (1-65535).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Port(u16);

impl Port {
    /// Minimum valid port number.
    pub const MIN: u16 = 1;
    /// Maximum valid port number.
    pub const MAX: u16 = 65535;

    /// Default HTTP port.
    pub const HTTP: Port = Port(80);
    /// Default HTTPS port.
    pub const HTTPS: Port = Port(443);

    /// Create a new Port from a u16, returning None if invalid.
    #[inline]
    pub const fn new(port: u16) -> Option<Self> {
        if port >= Self::MIN {
            Some(Self(port))
        } else {
            None
        }
    }

    /// Get the raw port number.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Ports conventionally serving TLS-wrapped protocols.
    pub const fn is_tls_port(self) -> bool {
        matches!(self.0, 443 | 465 | 636 | 853 | 993 | 995 | 8443 | 9443)
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for Port {
    type Error = PortError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(PortError::OutOfRange(value))
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

impl FromStr for Port {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u16 = s
            .trim()
            .parse()
            .map_err(|_| PortError::InvalidFormat(s.to_string()))?;
        Self::try_from(value)
    }
}

/// Error type for port parsing and validation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PortError {
    #[error("port {0} is out of valid range (1-65535)")]
    OutOfRange(u16),
    #[error("invalid port number: {0}")]
    InvalidFormat(String),
    #[error("invalid port range: start ({0}) > end ({1})")]
    InvalidRange(u16, u16),
    #[error("empty port specification")]
    Empty,
}

/// A range of ports (inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    start: Port,
    end: Port,
}

impl PortRange {
    /// Create a new port range.
    pub fn new(start: Port, end: Port) -> Result<Self, PortError> {
        if start.0 > end.0 {
            Err(PortError::InvalidRange(start.0, end.0))
        } else {
            Ok(Self { start, end })
        }
    }

    /// Create a range containing a single port.
    pub const fn single(port: Port) -> Self {
        Self {
            start: port,
            end: port,
        }
    }

    /// Get the number of ports in this range.
    pub const fn len(&self) -> usize {
        (self.end.0 - self.start.0) as usize + 1
    }

    /// A valid range always holds at least one port.
    pub const fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Ports probed by a fast scan.
const FAST_PORTS: [u16; 22] = [
    21, 22, 23, 25, 53, 80, 110, 111, 135, 139, 143, 443, 445, 993, 995, 1723, 3306, 3389, 5432,
    5900, 8080, 8443,
];

/// A port specification made of one or more ranges.
///
/// Its `Display` form ("22,80,443,8000-9000") is the argument format the
/// external scanner expects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSpec {
    ranges: Vec<PortRange>,
}

impl PortSpec {
    /// Create an empty port specification.
    pub const fn new() -> Self {
        Self { ranges: Vec::new() }
    }

    /// Add a port range to the specification.
    pub fn add_range(&mut self, range: PortRange) {
        self.ranges.push(range);
    }

    /// Add a single port to the specification.
    pub fn add_port(&mut self, port: Port) {
        self.ranges.push(PortRange::single(port));
    }

    /// Total number of ports, counting overlaps once per range.
    pub fn count(&self) -> usize {
        self.ranges.iter().map(PortRange::len).sum()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// The fixed common-port list used by fast scans.
    pub fn fast() -> Self {
        let mut spec = Self::new();
        for port in FAST_PORTS.iter().filter_map(|&p| Port::new(p)) {
            spec.add_port(port);
        }
        spec
    }

    /// Full port range (1-65535).
    pub fn full() -> Self {
        let mut spec = Self::new();
        spec.add_range(PortRange {
            start: Port(Port::MIN),
            end: Port(Port::MAX),
        });
        spec
    }
}

impl FromStr for PortSpec {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PortError::Empty);
        }

        let mut spec = Self::new();

        for part in s.split(',') {
            let part = part.trim();
            match part.split_once('-') {
                Some((start, end)) => {
                    let range = PortRange::new(start.parse()?, end.parse()?)?;
                    spec.add_range(range);
                }
                None => spec.add_port(part.parse()?),
            }
        }

        Ok(spec)
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.ranges.iter().map(|r| r.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_validation() {
        assert!(Port::new(0).is_none());
        assert!(Port::new(1).is_some());
        assert!(Port::new(65535).is_some());
        assert!("0".parse::<Port>().is_err());
        assert!("70000".parse::<Port>().is_err());
        assert_eq!("8443".parse::<Port>().unwrap().as_u16(), 8443);
    }

    #[test]
    fn test_port_rejects_zero_on_deserialize() {
        assert!(serde_json::from_str::<Port>("0").is_err());
        assert_eq!(serde_json::from_str::<Port>("22").unwrap(), Port::new(22).unwrap());
    }

    #[test]
    fn test_tls_ports() {
        assert!(Port::HTTPS.is_tls_port());
        assert!(Port::new(8443).unwrap().is_tls_port());
        assert!(!Port::HTTP.is_tls_port());
    }

    #[test]
    fn test_fast_and_full_specs() {
        let fast = PortSpec::fast();
        assert_eq!(fast.count(), 22);
        assert!(fast.to_string().starts_with("21,22,23,25,53,80"));

        let full = PortSpec::full();
        assert_eq!(full.count(), 65535);
        assert_eq!(full.to_string(), "1-65535");
    }

    #[test]
    fn test_port_spec_parsing() {
        let spec: PortSpec = "22,80,443,8000-8010".parse().unwrap();
        assert_eq!(spec.count(), 14);
        assert_eq!(spec.to_string(), "22,80,443,8000-8010");
        assert!("100-50".parse::<PortSpec>().is_err());
        assert!("".parse::<PortSpec>().is_err());
    }
}
