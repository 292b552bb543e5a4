//! Configuration management for portsweep.
//!
//! Provides XDG-compliant settings storage. Values here are defaults only;
//! command-line flags always win.

mod settings;

pub use settings::{AppSettings, Paths};
