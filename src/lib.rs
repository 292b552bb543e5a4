//! # portsweep - A Concurrent TCP Port and Service Scanner
//!
//! portsweep sweeps an inclusive IPv4 range across a set of ports, probes
//! every `(ip, port)` pair with a bounded-timeout TCP connect, names what
//! answers, and streams findings to the caller while the scan is running.
//!
//! ## Features
//!
//! - **Bounded Concurrency**: A semaphore caps probes in flight; an optional
//!   token bucket paces admissions
//! - **Cooperative Cancellation**: Stop admitting work at any time; in-flight
//!   probes finish and still report
//! - **Service Fingerprinting**: Light protocol probes for ~30 well-known ports
//!   (HTTP, SSH, Redis, SMTP, databases, ...)
//! - **Reverse DNS**: One cached lookup per responding host
//! - **Streaming Events**: Progress, open ports and a final summary over a
//!   channel
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use portsweep::scanner::{ScanEngine, ScanEvent, ScanParams};
//! use portsweep::services::ServiceCatalog;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = ScanEngine::new(Arc::new(ServiceCatalog::builtin()));
//!     let params = ScanParams {
//!         start_ip: "192.168.1.1".into(),
//!         end_ip: "192.168.1.20".into(),
//!         ports: "22,80,443".into(),
//!         ..ScanParams::default()
//!     };
//!
//!     let (handle, mut events) = engine.start(&params);
//!     while let Some(event) = events.recv().await {
//!         if let ScanEvent::OpenPort(open) = event {
//!             println!("{open}");
//!         }
//!     }
//!     let summary = handle.wait().await.unwrap();
//!     println!("{} open", summary.total_open);
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Ports, port sets, address ranges and scan units
//! - [`scanner`] - Request validation, the engine, throttling and events
//! - [`fingerprint`] - Per-protocol service detectors
//! - [`services`] - The static port to service-name catalog
//! - [`resolver`] - Reverse DNS with a per-session cache
//! - [`config`] - Settings file management
//! - [`error`] - Error types
//! - [`output`] - Event renderers

pub mod cli;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod output;
pub mod resolver;
pub mod scanner;
pub mod services;
pub mod types;

// Re-export commonly used types
pub use error::{ConfigError, ScanError, ValidationError};
pub use scanner::{
    CancelToken, OpenPort, ScanEngine, ScanEvent, ScanHandle, ScanParams, ScanRequest, ScanSummary,
};
pub use services::ServiceCatalog;
pub use types::{Ipv4Range, Port, PortSet, ScanUnit, SessionId};
