//! Scan parameters and their validated form.
//!
//! `ScanParams` is what a front end collects (strings and numbers, possibly
//! wrong). `ScanRequest` is what the engine runs: every bound checked, the
//! port text parsed, the range ordered.

use crate::error::{ScanError, ScanResult, ValidationError, ValidationErrors};
use crate::services::ServiceCatalog;
use crate::types::{Ipv4Range, PortSet, ScanUnits, TargetError};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::ops::RangeInclusive;
use std::time::Duration;

/// Raw scan inputs as entered by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanParams {
    /// First address of the range (dotted quad).
    pub start_ip: String,
    /// Last address of the range, inclusive.
    pub end_ip: String,
    /// Port specification, e.g. `"80,139,440-445"`.
    pub ports: String,
    /// Union the well-known port catalog into the port set.
    pub include_common_ports: bool,
    /// Connect and fingerprint timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum probes in flight.
    pub max_concurrency: usize,
    /// Probes per second, 0 for unlimited.
    pub rate_limit: u32,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            start_ip: "192.168.1.1".to_string(),
            end_ip: "192.168.1.255".to_string(),
            ports: "80,139,440-445".to_string(),
            include_common_ports: false,
            timeout_ms: 1000,
            max_concurrency: 10,
            rate_limit: 0,
        }
    }
}

/// A validated, immutable scan request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    range: Ipv4Range,
    ports: PortSet,
    timeout: Duration,
    max_concurrency: usize,
    rate_limit: u32,
}

impl ScanRequest {
    /// Accepted timeout bounds, milliseconds.
    pub const TIMEOUT_MS: RangeInclusive<u64> = 100..=9999;
    /// Accepted concurrency bounds.
    pub const CONCURRENCY: RangeInclusive<usize> = 1..=9999;

    /// Validate raw parameters, reporting every problem at once.
    pub fn from_params(params: &ScanParams, catalog: &ServiceCatalog) -> ScanResult<Self> {
        let mut issues = Vec::new();

        let start = parse_addr(&params.start_ip, &mut issues);
        let end = parse_addr(&params.end_ip, &mut issues);
        let range = match (start, end) {
            (Some(start), Some(end)) => match Ipv4Range::new(start, end) {
                Ok(range) => Some(range),
                Err(TargetError::ReversedRange(start, end)) => {
                    issues.push(ValidationError::InvalidRange {
                        start: start.to_string(),
                        end: end.to_string(),
                    });
                    None
                }
                Err(e) => {
                    issues.push(ValidationError::InvalidAddress(e.to_string()));
                    None
                }
            },
            _ => None,
        };

        let mut ports = PortSet::parse_lenient(&params.ports);
        if params.include_common_ports {
            ports.extend(catalog.well_known_ports().iter());
        }
        if ports.is_empty() {
            issues.push(ValidationError::InvalidPortSpec(params.ports.trim().to_string()));
        }

        if !Self::TIMEOUT_MS.contains(&params.timeout_ms) {
            issues.push(ValidationError::TimeoutOutOfBounds(params.timeout_ms));
        }
        if !Self::CONCURRENCY.contains(&params.max_concurrency) {
            issues.push(ValidationError::ConcurrencyOutOfBounds(params.max_concurrency));
        }

        match range {
            Some(range) if issues.is_empty() => Ok(Self {
                range,
                ports,
                timeout: Duration::from_millis(params.timeout_ms),
                max_concurrency: params.max_concurrency,
                rate_limit: params.rate_limit,
            }),
            _ => Err(ScanError::InvalidRequest(ValidationErrors(issues))),
        }
    }

    /// Build a request directly from typed parts.
    pub fn new(
        range: Ipv4Range,
        ports: PortSet,
        timeout: Duration,
        max_concurrency: usize,
    ) -> ScanResult<Self> {
        let mut issues = Vec::new();
        if ports.is_empty() {
            issues.push(ValidationError::InvalidPortSpec(String::new()));
        }
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        if !Self::TIMEOUT_MS.contains(&timeout_ms) {
            issues.push(ValidationError::TimeoutOutOfBounds(timeout_ms));
        }
        if !Self::CONCURRENCY.contains(&max_concurrency) {
            issues.push(ValidationError::ConcurrencyOutOfBounds(max_concurrency));
        }
        if !issues.is_empty() {
            return Err(ScanError::InvalidRequest(ValidationErrors(issues)));
        }
        Ok(Self {
            range,
            ports,
            timeout,
            max_concurrency,
            rate_limit: 0,
        })
    }

    /// Pace admissions to `rate` probes per second (0 disables pacing).
    pub fn with_rate_limit(mut self, rate: u32) -> Self {
        self.rate_limit = rate;
        self
    }

    pub fn range(&self) -> Ipv4Range {
        self.range
    }

    pub fn ports(&self) -> &PortSet {
        &self.ports
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn rate_limit(&self) -> u32 {
        self.rate_limit
    }

    /// Fresh enumeration of every unit in dispatch order.
    pub fn units(&self) -> ScanUnits {
        self.range.units(&self.ports)
    }
}

fn parse_addr(s: &str, issues: &mut Vec<ValidationError>) -> Option<Ipv4Addr> {
    match s.trim().parse() {
        Ok(ip) => Some(ip),
        Err(_) => {
            issues.push(ValidationError::InvalidAddress(s.trim().to_string()));
            None
        }
    }
}
