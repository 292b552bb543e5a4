//! CSV output formatting.

use super::Renderer;
use crate::scanner::ScanEvent;
use serde::Serialize;
use std::io::{self, Write};

#[derive(Serialize)]
struct Row<'a> {
    ip: String,
    port: u16,
    hostname: &'a str,
    service: &'a str,
}

/// Writes one row per open port; the header comes with the first row.
pub struct CsvRenderer<W: Write> {
    wtr: csv::Writer<W>,
}

impl<W: Write> CsvRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            wtr: csv::Writer::from_writer(out),
        }
    }
}

impl<W: Write> Renderer for CsvRenderer<W> {
    fn render(&mut self, event: &ScanEvent) -> io::Result<()> {
        match event {
            ScanEvent::OpenPort(open) => {
                self.wtr.serialize(Row {
                    ip: open.ip.to_string(),
                    port: open.port.as_u16(),
                    hostname: &open.hostname,
                    service: &open.service,
                })?;
                self.wtr.flush()
            }
            ScanEvent::Completed(_) => self.wtr.flush(),
            ScanEvent::Progress(_) | ScanEvent::ValidationError { .. } => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::OpenPort;
    use crate::types::{Port, ScanUnit};
    use std::net::Ipv4Addr;

    #[test]
    fn test_rows_with_header() {
        let mut renderer = CsvRenderer::new(Vec::new());
        for (port, service) in [(80, "HTTP (Apache, Debian)"), (6379, "Redis (PONG)")] {
            let open = OpenPort::new(
                ScanUnit::new(Ipv4Addr::new(10, 0, 0, 1), Port::new(port).unwrap()),
                "Unknown",
                service,
            );
            renderer.render(&ScanEvent::OpenPort(open)).unwrap();
        }

        let bytes = renderer.wtr.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "ip,port,hostname,service");
        assert_eq!(lines[1], "10.0.0.1,80,Unknown,\"HTTP (Apache, Debian)\"");
        assert_eq!(lines[2], "10.0.0.1,6379,Unknown,Redis (PONG)");
    }
}
