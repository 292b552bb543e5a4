//! Port types with validation and lenient parsing.
//!
//! The `Port` newtype ensures values are always valid port numbers (1-65535).
//! `PortSet` is built from user text where garbage tokens are skipped rather
//! than rejected, so "22,abc,80" still scans 22 and 80.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A validated network port number (1-65535).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Port(u16);

impl Port {
    /// Minimum valid port number.
    pub const MIN: u16 = 1;
    /// Maximum valid port number.
    pub const MAX: u16 = 65535;

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

    /// Parse one decimal port, accepting surrounding whitespace.
    fn parse_token(s: &str) -> Option<Self> {
        let value: u32 = s.trim().parse().ok()?;
        u16::try_from(value).ok().and_then(Self::new)
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
        Self::new(value).ok_or(PortError::OutOfRange(value as u32))
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

/// Reasons a single port token is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("port {0} is out of valid range (1-65535)")]
    OutOfRange(u32),
    #[error("invalid port number: {0}")]
    InvalidFormat(String),
    #[error("invalid port range: start ({0}) > end ({1})")]
    InvalidRange(u16, u16),
}

/// A range of ports (inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
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

    /// Iterate over all ports in this range.
    pub fn iter(&self) -> impl Iterator<Item = Port> {
        (self.start.0..=self.end.0).map(Port)
    }

    /// Parse a single `N` or `A-B` token.
    pub fn parse_token(token: &str) -> Result<Self, PortError> {
        let token = token.trim();
        match token.split_once('-') {
            Some((a, b)) => {
                let start = Port::parse_token(a)
                    .ok_or_else(|| PortError::InvalidFormat(a.trim().to_string()))?;
                let end = Port::parse_token(b)
                    .ok_or_else(|| PortError::InvalidFormat(b.trim().to_string()))?;
                Self::new(start, end)
            }
            None => Port::parse_token(token)
                .map(Self::single)
                .ok_or_else(|| PortError::InvalidFormat(token.to_string())),
        }
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

/// A deduplicated set of ports, iterated in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSet {
    ports: BTreeSet<Port>,
}

impl PortSet {
    /// Create an empty port set.
    pub const fn new() -> Self {
        Self {
            ports: BTreeSet::new(),
        }
    }

    /// Parse a comma-separated specification such as `"22,80,8000-8010"`.
    ///
    /// Tokens that are not numbers, are out of range or describe a reversed
    /// range are dropped. The result may be empty; deciding whether that is
    /// an error is up to the caller.
    pub fn parse_lenient(spec: &str) -> Self {
        let mut set = Self::new();
        for token in spec.split(',').filter(|t| !t.trim().is_empty()) {
            match PortRange::parse_token(token) {
                Ok(range) => set.extend(range.iter()),
                Err(e) => tracing::debug!(token = token.trim(), error = %e, "dropping port token"),
            }
        }
        set
    }

    /// Add a single port.
    pub fn insert(&mut self, port: Port) -> bool {
        self.ports.insert(port)
    }

    /// Union another collection of ports into this set.
    pub fn extend(&mut self, ports: impl IntoIterator<Item = Port>) {
        self.ports.extend(ports);
    }

    pub fn contains(&self, port: Port) -> bool {
        self.ports.contains(&port)
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Iterate in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = Port> + '_ {
        self.ports.iter().copied()
    }

    /// Ports as a plain vector, ascending.
    pub fn to_vec(&self) -> Vec<Port> {
        self.iter().collect()
    }
}

impl FromIterator<Port> for PortSet {
    fn from_iter<I: IntoIterator<Item = Port>>(iter: I) -> Self {
        Self {
            ports: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for PortSet {
    /// Collapses consecutive ports back into `A-B` ranges.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        let mut current: Option<PortRange> = None;
        for port in self.iter() {
            current = match current {
                Some(range) if range.end.0.checked_add(1) == Some(port.0) => Some(PortRange {
                    start: range.start,
                    end: port,
                }),
                Some(range) => {
                    parts.push(range.to_string());
                    Some(PortRange::single(port))
                }
                None => Some(PortRange::single(port)),
            };
        }
        if let Some(range) = current {
            parts.push(range.to_string());
        }
        write!(f, "{}", parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ports: &[u16]) -> PortSet {
        ports.iter().filter_map(|&p| Port::new(p)).collect()
    }

    #[test]
    fn test_port_validation() {
        assert!(Port::new(0).is_none());
        assert!(Port::new(1).is_some());
        assert!(Port::new(65535).is_some());
        assert!(Port::try_from(0u16).is_err());
    }

    #[test]
    fn test_port_range() {
        let start = Port::new(1).unwrap();
        let end = Port::new(100).unwrap();
        let range = PortRange::new(start, end).unwrap();
        assert_eq!(range.len(), 100);
        assert!(PortRange::new(end, start).is_err());
    }

    #[test]
    fn test_parse_mixed_spec() {
        let ports = PortSet::parse_lenient("80,22,1000-1002");
        assert_eq!(ports, set(&[80, 22, 1000, 1001, 1002]));
    }

    #[test]
    fn test_parse_drops_garbage() {
        assert!(PortSet::parse_lenient("99999,abc").is_empty());
        assert!(PortSet::parse_lenient("0").is_empty());
        assert!(PortSet::parse_lenient("").is_empty());

        let ports = PortSet::parse_lenient("22, abc ,10-5, 443 ,1-2-3,,65536-65537");
        assert_eq!(ports, set(&[22, 443]));
    }

    #[test]
    fn test_parse_dedup() {
        let ports = PortSet::parse_lenient("80,80,79-81,80");
        assert_eq!(ports.len(), 3);
        assert_eq!(ports.to_vec(), set(&[79, 80, 81]).to_vec());
    }

    #[test]
    fn test_range_whitespace() {
        let ports = PortSet::parse_lenient(" 440 - 445 ");
        assert_eq!(ports.len(), 6);
    }

    #[test]
    fn test_display_collapses_runs() {
        let ports = PortSet::parse_lenient("139,80,440-445,65535");
        assert_eq!(ports.to_string(), "80,139,440-445,65535");
    }
}
