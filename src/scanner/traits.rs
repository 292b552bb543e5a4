//! Prober trait abstraction.
//!
//! The session engine only knows how to hand a [`ScanUnit`] to a
//! [`Prober`] and read back a [`ProbeOutcome`]; the TCP implementation and
//! the mocks used in tests plug in here.

use crate::types::{Port, ScanUnit};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Result of probing one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Connection accepted; `service` is the fingerprinted label.
    Open { service: String },
    /// Refused, timed out, unreachable, or any other connect failure.
    Closed,
}

/// An open port, ready to report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpenPort {
    pub ip: Ipv4Addr,
    pub port: Port,
    /// Reverse-DNS name, or `"Unknown"`.
    pub hostname: String,
    /// Service label; never empty.
    pub service: String,
    pub open: bool,
}

impl OpenPort {
    pub fn new(unit: ScanUnit, hostname: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            ip: unit.ip,
            port: unit.port,
            hostname: hostname.into(),
            service: service.into(),
            open: true,
        }
    }
}

impl fmt::Display for OpenPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} {} [{}]", self.ip, self.port, self.service, self.hostname)
    }
}

/// Trait for single-unit probe implementations.
///
/// Implementations must never panic on network errors: a unit that cannot
/// be reached is simply [`ProbeOutcome::Closed`].
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probe one (ip, port) pair, spending at most about `timeout` on the
    /// connect and again on fingerprinting.
    async fn probe(&self, unit: ScanUnit, timeout: Duration) -> ProbeOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_port_display() {
        let unit = ScanUnit::new(Ipv4Addr::new(10, 0, 0, 2), Port::new(22).unwrap());
        let open = OpenPort::new(unit, "Unknown", "SSH ON");
        assert!(open.open);
        assert_eq!(open.to_string(), "10.0.0.2:22 SSH ON [Unknown]");
    }

    #[test]
    fn test_open_port_json() {
        let unit = ScanUnit::new(Ipv4Addr::new(10, 0, 0, 2), Port::new(80).unwrap());
        let json = serde_json::to_value(OpenPort::new(unit, "web.lan", "HTTP (nginx)")).unwrap();
        assert_eq!(json["ip"], "10.0.0.2");
        assert_eq!(json["port"], 80);
        assert_eq!(json["open"], true);
    }
}
