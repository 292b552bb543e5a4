//! TCP connect prober.
//!
//! Performs standard TCP connect probes using the operating system's
//! socket API, then hands the live connection to the fingerprinter. Does not
//! require elevated privileges.

use crate::fingerprint::Fingerprinter;
use crate::scanner::traits::{ProbeOutcome, Prober};
use crate::services::ServiceCatalog;
use crate::types::ScanUnit;
use async_trait::async_trait;
use socket2::SockRef;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// TCP connect prober.
///
/// Each probe owns its socket from connect to drop; the fingerprinter
/// consumes the stream, so the descriptor is released on every path.
pub struct TcpProber {
    catalog: Arc<ServiceCatalog>,
}

impl TcpProber {
    pub fn new(catalog: Arc<ServiceCatalog>) -> Self {
        Self { catalog }
    }

    /// Attempt to connect to the target address within `limit`.
    async fn attempt_connect(addr: SocketAddr, limit: Duration) -> io::Result<TcpStream> {
        match timeout(limit, TcpStream::connect(addr)).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out")),
        }
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, unit: ScanUnit, limit: Duration) -> ProbeOutcome {
        let port = unit.port.as_u16();
        let addr = SocketAddr::from((unit.ip, port));

        let stream = match Self::attempt_connect(addr, limit).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::trace!(%addr, reason = closed_reason(&e), "closed");
                return ProbeOutcome::Closed;
            }
        };

        // Reset instead of FIN on close, so wide sweeps don't leave
        // thousands of sockets in TIME_WAIT.
        if let Err(e) = SockRef::from(&stream).set_linger(Some(Duration::ZERO)) {
            tracing::trace!(%addr, error = %e, "could not set SO_LINGER");
        }

        let fingerprinter = Fingerprinter::new(Arc::clone(&self.catalog), limit);
        let service = fingerprinter.identify(port, stream, unit.ip).await;
        ProbeOutcome::Open { service }
    }
}

fn closed_reason(e: &io::Error) -> &'static str {
    match e.kind() {
        io::ErrorKind::ConnectionRefused => "refused",
        io::ErrorKind::TimedOut => "timeout",
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => "reset",
        io::ErrorKind::AddrNotAvailable => "address unavailable",
        _ => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Port;
    use std::net::Ipv4Addr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn prober() -> TcpProber {
        TcpProber::new(Arc::new(ServiceCatalog::builtin()))
    }

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_probe_closed_port() {
        let port = closed_port().await;
        let unit = ScanUnit::new(Ipv4Addr::LOCALHOST, Port::new(port).unwrap());
        let outcome = prober().probe(unit, Duration::from_millis(200)).await;
        assert_eq!(outcome, ProbeOutcome::Closed);
    }

    #[tokio::test]
    async fn test_probe_open_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                drop(socket);
            }
        });

        let unit = ScanUnit::new(Ipv4Addr::LOCALHOST, Port::new(port).unwrap());
        let outcome = prober().probe(unit, Duration::from_millis(200)).await;
        match outcome {
            ProbeOutcome::Open { service } => assert!(!service.is_empty()),
            ProbeOutcome::Closed => panic!("listener port reported closed"),
        }
    }

    #[tokio::test]
    async fn test_fingerprint_over_loopback_ssh() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let _ = socket.write_all(b"SSH-2.0-OpenSSH_8.9\r\n").await;
                let mut buf = [0u8; 16];
                let _ = socket.read(&mut buf).await;
            }
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let fp = Fingerprinter::new(Arc::new(ServiceCatalog::builtin()), Duration::from_millis(500));
        let label = fp.identify(22, stream, Ipv4Addr::LOCALHOST).await;
        assert!(label.contains("SSH"));
        assert!(label.contains("SSH-2.0-OpenSSH_8.9"));
    }

    #[tokio::test]
    async fn test_fingerprint_over_loopback_http() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\nServer: nginx\r\nContent-Length: 0\r\n\r\n")
                    .await;
            }
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let fp = Fingerprinter::new(Arc::new(ServiceCatalog::builtin()), Duration::from_millis(500));
        let label = fp.identify(80, stream, Ipv4Addr::LOCALHOST).await;
        assert!(label.contains("HTTP"));
        assert!(label.contains("nginx"));
    }

    #[test]
    fn test_closed_reason() {
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(closed_reason(&refused), "refused");
        let timed_out = io::Error::from(io::ErrorKind::TimedOut);
        assert_eq!(closed_reason(&timed_out), "timeout");
    }
}
