//! Events streamed from a running scan to its caller.
//!
//! The engine never renders anything itself; it pushes [`ScanEvent`]s into
//! an unbounded channel and the front end decides what to do with them.

use super::traits::OpenPort;
use crate::types::SessionId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tokio::sync::mpsc;

/// Receiving half handed to the caller.
pub type EventStream = mpsc::UnboundedReceiver<ScanEvent>;

/// Progress after a unit has been dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub dispatched: u64,
    pub total: u64,
    /// `dispatched / total * 100`.
    pub percent: f64,
}

impl Progress {
    pub fn new(dispatched: u64, total: u64) -> Self {
        let percent = if total == 0 {
            100.0
        } else {
            dispatched as f64 / total as f64 * 100.0
        };
        Self {
            dispatched,
            total,
            percent,
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Every unit was dispatched and finished.
    Completed,
    /// A stop was requested; in-flight units were drained.
    Cancelled,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Final report of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanSummary {
    pub session_id: SessionId,
    pub state: SessionState,
    pub total_open: usize,
    pub dispatched: u64,
    pub total_units: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Everything a scan reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScanEvent {
    Progress(Progress),
    OpenPort(OpenPort),
    Completed(ScanSummary),
    ValidationError { message: String },
}

/// Sending half, cloned into every unit task.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<ScanEvent>,
}

impl EventSink {
    pub fn progress(&self, dispatched: u64, total: u64) {
        self.send(ScanEvent::Progress(Progress::new(dispatched, total)));
    }

    pub fn open_port(&self, open: OpenPort) {
        self.send(ScanEvent::OpenPort(open));
    }

    pub fn completed(&self, summary: ScanSummary) {
        self.send(ScanEvent::Completed(summary));
    }

    pub fn validation_error(&self, message: impl Into<String>) {
        self.send(ScanEvent::ValidationError {
            message: message.into(),
        });
    }

    /// A caller that dropped its receiver just stops hearing about the scan.
    fn send(&self, event: ScanEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("event receiver dropped");
        }
    }
}

/// Create a connected sink/stream pair.
pub fn channel() -> (EventSink, EventStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percent() {
        assert_eq!(Progress::new(0, 4).percent, 0.0);
        assert_eq!(Progress::new(1, 4).percent, 25.0);
        assert_eq!(Progress::new(4, 4).percent, 100.0);
        assert_eq!(Progress::new(0, 0).percent, 100.0);
    }

    #[test]
    fn test_event_json_tag() {
        let json = serde_json::to_value(ScanEvent::Progress(Progress::new(1, 2))).unwrap();
        assert_eq!(json["event"], "progress");
        assert_eq!(json["percent"], 50.0);

        let json = serde_json::to_value(ScanEvent::ValidationError {
            message: "bad".into(),
        })
        .unwrap();
        assert_eq!(json["event"], "validation_error");
        assert_eq!(json["message"], "bad");
    }

    #[tokio::test]
    async fn test_sink_survives_dropped_receiver() {
        let (sink, rx) = channel();
        drop(rx);
        sink.progress(1, 1);
    }

    #[tokio::test]
    async fn test_channel_delivers_in_order() {
        let (sink, mut rx) = channel();
        sink.progress(1, 2);
        sink.progress(2, 2);
        drop(sink);
        let mut seen = Vec::new();
        while let Some(event) = rx.recv().await {
            seen.push(event);
        }
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1], ScanEvent::Progress(Progress::new(2, 2)));
    }
}
