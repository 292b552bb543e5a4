//! JSON output formatting.
//!
//! One JSON object per line, tagged with `"event"`. Progress ticks are left
//! out so the stream stays proportional to what was found.

use super::Renderer;
use crate::scanner::ScanEvent;
use std::io::{self, Write};

/// Writes events as JSON lines.
pub struct JsonRenderer<W: Write> {
    out: W,
}

impl<W: Write> JsonRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> Renderer for JsonRenderer<W> {
    fn render(&mut self, event: &ScanEvent) -> io::Result<()> {
        if matches!(event, ScanEvent::Progress(_)) {
            return Ok(());
        }
        serde_json::to_writer(&mut self.out, event).map_err(io::Error::other)?;
        writeln!(self.out)?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{OpenPort, Progress};
    use crate::types::{Port, ScanUnit};
    use std::net::Ipv4Addr;

    #[test]
    fn test_one_line_per_result() {
        let mut renderer = JsonRenderer::new(Vec::new());
        let open = OpenPort::new(
            ScanUnit::new(Ipv4Addr::new(192, 168, 1, 5), Port::new(22).unwrap()),
            "nas.lan",
            "SSH (SSH-2.0-OpenSSH_9.6)",
        );
        renderer.render(&ScanEvent::Progress(Progress::new(1, 2))).unwrap();
        renderer.render(&ScanEvent::OpenPort(open)).unwrap();
        renderer
            .render(&ScanEvent::ValidationError {
                message: "bad".into(),
            })
            .unwrap();

        let text = String::from_utf8(renderer.out).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "open_port");
        assert_eq!(lines[0]["ip"], "192.168.1.5");
        assert_eq!(lines[0]["port"], 22);
        assert_eq!(lines[0]["hostname"], "nas.lan");
        assert_eq!(lines[0]["open"], true);
        assert_eq!(lines[1]["event"], "validation_error");
    }
}
