//! Core type definitions using newtype patterns for type safety.
//!
//! These types prevent common logic errors by making invalid states unrepresentable
//! at compile time.

mod port;
mod scan_id;
mod target;

pub use port::{Port, PortError, PortRange, PortSet};
pub use scan_id::{SessionId, SessionIdError};
pub use target::{Ipv4Range, ScanUnit, ScanUnits, TargetError};
