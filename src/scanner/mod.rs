//! Scanner module - runs bounded, cancellable TCP sweeps.
//!
//! A scan is validated into a [`ScanRequest`], expanded lazily into
//! `(ip, port)` units, and driven by a [`ScanEngine`] session that admits
//! units through a [`Throttle`] and streams [`ScanEvent`]s back to the
//! caller as results arrive.

pub mod events;
pub mod rate_limiter;
pub mod request;
pub mod session;
pub mod tcp;
pub mod throttle;
pub mod traits;

pub use events::{EventSink, EventStream, Progress, ScanEvent, ScanSummary, SessionState};
pub use rate_limiter::RateLimiter;
pub use request::{ScanParams, ScanRequest};
pub use session::{ScanEngine, ScanHandle};
pub use tcp::TcpProber;
pub use throttle::{CancelToken, Throttle};
pub use traits::{OpenPort, ProbeOutcome, Prober};
