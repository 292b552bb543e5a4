//! IPv4 target ranges and scan-unit enumeration.
//!
//! A range is an inclusive pair of addresses, walked in ascending numeric
//! order. `ScanUnits` lazily yields the cross product of a range and a
//! `PortSet`, so a /8 sweep never materializes in memory.

use super::port::{Port, PortSet};
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// Error type for target parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("invalid IPv4 address: '{0}'")]
    InvalidAddress(String),
    #[error("start address {0} is greater than end address {1}")]
    ReversedRange(Ipv4Addr, Ipv4Addr),
    #[error("invalid CIDR notation: {0}")]
    InvalidCidr(String),
}

/// An inclusive, ascending range of IPv4 addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv4Range {
    start: Ipv4Addr,
    end: Ipv4Addr,
}

impl Ipv4Range {
    /// Create a range; fails if `start > end`.
    pub fn new(start: Ipv4Addr, end: Ipv4Addr) -> Result<Self, TargetError> {
        if u32::from(start) > u32::from(end) {
            Err(TargetError::ReversedRange(start, end))
        } else {
            Ok(Self { start, end })
        }
    }

    /// A range holding exactly one address.
    pub const fn single(ip: Ipv4Addr) -> Self {
        Self { start: ip, end: ip }
    }

    /// Parse a dotted-quad start/end pair.
    pub fn parse(start: &str, end: &str) -> Result<Self, TargetError> {
        let start = parse_addr(start)?;
        let end = parse_addr(end)?;
        Self::new(start, end)
    }

    /// Expand an IPv4 CIDR block to its first..last address, inclusive.
    ///
    /// Network and broadcast addresses are kept: on a LAN sweep they are
    /// cheap to probe and some routers answer on them.
    pub fn from_cidr(cidr: &str) -> Result<Self, TargetError> {
        let network: Ipv4Network = cidr
            .trim()
            .parse()
            .map_err(|_| TargetError::InvalidCidr(cidr.trim().to_string()))?;
        Ok(Self {
            start: network.network(),
            end: network.broadcast(),
        })
    }

    pub fn start(&self) -> Ipv4Addr {
        self.start
    }

    pub fn end(&self) -> Ipv4Addr {
        self.end
    }

    /// Number of addresses in the range (at most 2^32).
    pub fn len(&self) -> u64 {
        u64::from(u32::from(self.end)) - u64::from(u32::from(self.start)) + 1
    }

    /// Iterate addresses in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = Ipv4Addr> {
        (u32::from(self.start)..=u32::from(self.end)).map(Ipv4Addr::from)
    }

    /// Enumerate every (ip, port) pair, ip-major.
    pub fn units(&self, ports: &PortSet) -> ScanUnits {
        ScanUnits::new(*self, ports)
    }
}

impl fmt::Display for Ipv4Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

fn parse_addr(s: &str) -> Result<Ipv4Addr, TargetError> {
    s.trim()
        .parse()
        .map_err(|_| TargetError::InvalidAddress(s.trim().to_string()))
}

/// One (address, port) pair to probe exactly once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanUnit {
    pub ip: Ipv4Addr,
    pub port: Port,
}

impl ScanUnit {
    pub const fn new(ip: Ipv4Addr, port: Port) -> Self {
        Self { ip, port }
    }
}

impl fmt::Display for ScanUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// Lazy cross product of an address range and a port set.
#[derive(Debug, Clone)]
pub struct ScanUnits {
    next_ip: Option<u32>,
    end_ip: u32,
    ports: Vec<Port>,
    port_idx: usize,
    total: u64,
}

impl ScanUnits {
    fn new(range: Ipv4Range, ports: &PortSet) -> Self {
        let ports = ports.to_vec();
        let next_ip = if ports.is_empty() {
            None
        } else {
            Some(u32::from(range.start))
        };
        Self {
            next_ip,
            end_ip: u32::from(range.end),
            port_idx: 0,
            total: range.len() * ports.len() as u64,
            ports,
        }
    }

    /// Total number of units this enumeration yields from the start.
    pub fn total(&self) -> u64 {
        self.total
    }
}

impl Iterator for ScanUnits {
    type Item = ScanUnit;

    fn next(&mut self) -> Option<ScanUnit> {
        let ip = self.next_ip?;
        let port = self.ports[self.port_idx];
        self.port_idx += 1;
        if self.port_idx == self.ports.len() {
            self.port_idx = 0;
            self.next_ip = if ip < self.end_ip { Some(ip + 1) } else { None };
        }
        Some(ScanUnit::new(Ipv4Addr::from(ip), port))
    }
}
