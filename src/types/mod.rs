//! Core type definitions using newtype patterns for type safety.
//!
//! These types prevent common logic errors by making invalid states unrepresentable
//! at compile time.

mod finding;
mod port;
mod scan_id;
mod severity;
mod target;

pub use finding::{
    CertificateInfo, Finding, HeaderFinding, PathFinding, PortFinding, PortState, Protocol,
    TlsFinding, TlsVersion, VulnerabilityKind, FOUND_STATUS_CODES,
};
pub use port::{Port, PortError, PortRange, PortSpec};
pub use scan_id::{ScanId, ScanIdError};
pub use severity::Severity;
pub use target::{Scheme, Target};
