//! Service fingerprinting on open TCP connections.
//!
//! The base label comes from the [`ServiceCatalog`]. For a few dozen
//! well-known ports a detector then talks to the service (banner read,
//! small request, or a protocol-specific byte probe) to refine it. Any
//! failure along the way falls back to `"<name> ON"`; fingerprinting never
//! fails a scan.

use crate::services::ServiceCatalog;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout_at, Instant};

/// Maximum bytes collected from a service response.
const MAX_RESPONSE_SIZE: usize = 4096;

/// Maximum characters of banner text kept in a label.
const MAX_DETAIL_LEN: usize = 96;

/// RDP: X.224 Connection Request carrying an RDP Negotiation Request.
const RDP_PROBE: &[u8] = &[
    0x03, 0x00, 0x00, 0x13, 0x0e, 0xe0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x08, 0x00,
    0x03, 0x00, 0x00, 0x00,
];

/// PostgreSQL: SSLRequest; servers answer a single `S` or `N`.
const POSTGRES_PROBE: &[u8] = &[0x00, 0x00, 0x00, 0x08, 0x04, 0xd2, 0x16, 0x2f];

/// MSSQL: TDS PRELOGIN with VERSION and ENCRYPTION options.
const MSSQL_PROBE: &[u8] = &[
    0x12, 0x01, 0x00, 0x1a, 0x00, 0x00, 0x00, 0x00, // TDS header
    0x00, 0x00, 0x0b, 0x00, 0x06, // VERSION at 11, len 6
    0x01, 0x00, 0x11, 0x00, 0x01, // ENCRYPTION at 17, len 1
    0xff, // terminator
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // version
    0x02, // encryption not supported
];

/// MongoDB: OP_QUERY `{isMaster: 1}` against `admin.$cmd`.
const MONGODB_PROBE: &[u8] = &[
    0x3a, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xd4, 0x07, 0x00,
    0x00, // header, opCode 2004
    0x00, 0x00, 0x00, 0x00, // flags
    b'a', b'd', b'm', b'i', b'n', b'.', b'$', b'c', b'm', b'd', 0x00, // collection
    0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, // skip, return
    0x13, 0x00, 0x00, 0x00, 0x10, b'i', b's', b'M', b'a', b's', b't', b'e', b'r', 0x00, 0x01,
    0x00, 0x00, 0x00, 0x00, // BSON document
];

/// SMB: NetBIOS session frame with an SMB1 NEGOTIATE offering NT LM 0.12
/// and SMB 2.002, which SMB2-only servers also answer.
const SMB_PROBE: &[u8] = &[
    0x00, 0x00, 0x00, 0x3a, // NetBIOS session message
    0xff, b'S', b'M', b'B', 0x72, 0x00, 0x00, 0x00, 0x00, 0x18, 0x53, 0xc8, // command, flags
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // pid high, signature, tid
    0xff, 0xfe, 0x00, 0x00, 0x00, 0x00, // pid, uid, mid
    0x00, 0x17, 0x00, // word count, byte count
    0x02, b'N', b'T', b' ', b'L', b'M', b' ', b'0', b'.', b'1', b'2', 0x00, 0x02, b'S', b'M',
    b'B', b' ', b'2', b'.', b'0', b'0', b'2', 0x00,
];

const MEMCACHED_PROBE: &[u8] = b"version\r\n";

/// How a port's service is confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detector {
    /// Send `GET /` and look for an HTTP status line and `Server:` header.
    Http,
    /// Read the banner line and look for `SSH`.
    Ssh,
    /// Read a greeting line that must start with the given token.
    Greeting(&'static str),
    /// Send `PING`, expect `PONG`.
    Redis,
    /// Send the bytes (possibly none) and accept any non-empty reply.
    Probe(&'static [u8]),
    /// Known but not probed: label is `"<name> ON"`.
    Shallow,
}

impl Detector {
    /// The detector for a port, if the port is one of the probed groups.
    pub fn for_port(port: u16) -> Option<Self> {
        let detector = match port {
            80 | 81 | 3000 | 5000 | 5984 | 8000 | 8008 | 8080 | 8081 | 8888 | 9090 | 9200
            | 10000 => Self::Http,
            22 | 2222 => Self::Ssh,
            21 | 25 | 587 => Self::Greeting("220"),
            110 => Self::Greeting("+OK"),
            143 => Self::Greeting("* OK"),
            6379 => Self::Redis,
            3389 => Self::Probe(RDP_PROBE),
            3306 | 5900 => Self::Probe(&[]),
            5432 => Self::Probe(POSTGRES_PROBE),
            1433 => Self::Probe(MSSQL_PROBE),
            27017 => Self::Probe(MONGODB_PROBE),
            445 => Self::Probe(SMB_PROBE),
            11211 => Self::Probe(MEMCACHED_PROBE),
            23 | 53 | 123 | 139 | 161 | 389 | 443 | 636 | 993 | 995 | 1883 | 5672 | 8443
            | 9092 => Self::Shallow,
            _ => return None,
        };
        Some(detector)
    }
}

/// Why a detector could not confirm its service.
#[derive(Debug, thiserror::Error)]
pub enum FingerprintError {
    #[error("timed out waiting for the service")]
    Timeout,
    #[error("connection closed before any response")]
    Closed,
    #[error("unrecognized response: {0}")]
    Unrecognized(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What a successful detector learned.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Confirmation {
    /// Service confirmed, nothing more to say.
    On,
    /// Service confirmed with a server string or banner.
    Detail(String),
}

/// Turns an open connection into a service label.
#[derive(Debug, Clone)]
pub struct Fingerprinter {
    catalog: Arc<ServiceCatalog>,
    io_timeout: Duration,
}

impl Fingerprinter {
    /// `io_timeout` bounds all reads and writes on one connection together.
    pub fn new(catalog: Arc<ServiceCatalog>, io_timeout: Duration) -> Self {
        Self {
            catalog,
            io_timeout,
        }
    }

    /// Label the service behind `stream`, which is connected to `host:port`.
    ///
    /// The stream is consumed and closed when this returns.
    pub async fn identify<S>(&self, port: u16, mut stream: S, host: Ipv4Addr) -> String
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let name = self.catalog.name_or_unknown(port);
        let detector = match Detector::for_port(port) {
            Some(Detector::Shallow) => return format!("{name} ON"),
            Some(detector) => detector,
            None => return name.to_string(),
        };

        let deadline = Instant::now() + self.io_timeout;
        match run_detector(detector, &mut stream, host, deadline).await {
            Ok(Confirmation::Detail(detail)) => format!("{name} ({detail})"),
            Ok(Confirmation::On) => format!("{name} ON"),
            Err(e) => {
                tracing::debug!(%host, port, error = %e, "fingerprint degraded to base label");
                format!("{name} ON")
            }
        }
    }
}

async fn run_detector<S>(
    detector: Detector,
    stream: &mut S,
    host: Ipv4Addr,
    deadline: Instant,
) -> Result<Confirmation, FingerprintError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    match detector {
        Detector::Http => {
            let request = format!(
                "GET / HTTP/1.1\r\nHost: {host}\r\nUser-Agent: portsweep/{}\r\nAccept: */*\r\nConnection: close\r\n\r\n",
                env!("CARGO_PKG_VERSION")
            );
            send(stream, request.as_bytes(), deadline).await?;
            let response = collect(stream, deadline, |buf| contains(buf, b"\r\n\r\n")).await?;
            parse_http(&response)
        }
        Detector::Ssh => {
            let response = collect(stream, deadline, |buf| buf.contains(&b'\n')).await?;
            let line = first_line(&response);
            if line.contains("SSH") {
                Ok(Confirmation::Detail(sanitize_banner(line.as_bytes())))
            } else {
                Err(FingerprintError::Unrecognized(sanitize_banner(line.as_bytes())))
            }
        }
        Detector::Greeting(token) => {
            let response = collect(stream, deadline, |buf| buf.contains(&b'\n')).await?;
            parse_greeting(&first_line(&response), token)
        }
        Detector::Redis => {
            send(stream, b"PING\r\n", deadline).await?;
            let response = collect(stream, deadline, |buf| buf.contains(&b'\n')).await?;
            let text = String::from_utf8_lossy(&response);
            if text.contains("PONG") {
                Ok(Confirmation::Detail("PONG".to_string()))
            } else if text.starts_with("-NOAUTH") {
                Ok(Confirmation::Detail("auth required".to_string()))
            } else {
                Err(FingerprintError::Unrecognized(sanitize_banner(&response)))
            }
        }
        Detector::Probe(bytes) => {
            if !bytes.is_empty() {
                send(stream, bytes, deadline).await?;
            }
            collect(stream, deadline, |buf| !buf.is_empty()).await?;
            Ok(Confirmation::On)
        }
        Detector::Shallow => Ok(Confirmation::On),
    }
}

async fn send<S>(stream: &mut S, bytes: &[u8], deadline: Instant) -> Result<(), FingerprintError>
where
    S: AsyncWrite + Unpin,
{
    timeout_at(deadline, stream.write_all(bytes))
        .await
        .map_err(|_| FingerprintError::Timeout)??;
    timeout_at(deadline, stream.flush())
        .await
        .map_err(|_| FingerprintError::Timeout)??;
    Ok(())
}

/// Read until `done` says the buffer is complete, the peer closes, the
/// buffer fills, or the deadline passes. Whatever arrived before a timeout
/// or close is still returned; only an empty result is an error.
async fn collect<S, F>(stream: &mut S, deadline: Instant, done: F) -> Result<Vec<u8>, FingerprintError>
where
    S: AsyncRead + Unpin,
    F: Fn(&[u8]) -> bool,
{
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    while buffer.len() < MAX_RESPONSE_SIZE && !done(&buffer) {
        match timeout_at(deadline, stream.read(&mut chunk)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => buffer.extend_from_slice(&chunk[..n]),
            Ok(Err(e)) if buffer.is_empty() => return Err(e.into()),
            Ok(Err(_)) => break,
            Err(_) if buffer.is_empty() => return Err(FingerprintError::Timeout),
            Err(_) => break,
        }
    }

    if buffer.is_empty() {
        Err(FingerprintError::Closed)
    } else {
        buffer.truncate(MAX_RESPONSE_SIZE);
        Ok(buffer)
    }
}

fn parse_http(response: &[u8]) -> Result<Confirmation, FingerprintError> {
    let text = String::from_utf8_lossy(response);
    let status = text.lines().next().unwrap_or_default();
    if !is_http_status_line(status) {
        return Err(FingerprintError::Unrecognized(sanitize_banner(status.as_bytes())));
    }

    let server = text
        .lines()
        .skip(1)
        .take_while(|line| !line.trim().is_empty())
        .find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case("server")
                .then(|| sanitize_banner(value.as_bytes()))
        })
        .filter(|server| !server.is_empty());

    Ok(server.map_or(Confirmation::On, Confirmation::Detail))
}

/// `HTTP/x.y NNN ...`
fn is_http_status_line(line: &str) -> bool {
    let mut parts = line.split_whitespace();
    let version_ok = parts
        .next()
        .is_some_and(|v| v.starts_with("HTTP/") && v.len() > 5);
    let code_ok = parts
        .next()
        .is_some_and(|c| c.len() == 3 && c.bytes().all(|b| b.is_ascii_digit()));
    version_ok && code_ok
}

fn parse_greeting(line: &str, token: &str) -> Result<Confirmation, FingerprintError> {
    let Some(rest) = line.strip_prefix(token) else {
        return Err(FingerprintError::Unrecognized(sanitize_banner(line.as_bytes())));
    };
    // Multi-line SMTP/FTP greetings continue with "220-".
    let detail = sanitize_banner(rest.trim_start_matches('-').as_bytes());
    if detail.is_empty() {
        Ok(Confirmation::On)
    } else {
        Ok(Confirmation::Detail(detail))
    }
}

fn first_line(data: &[u8]) -> String {
    let text = String::from_utf8_lossy(data);
    text.lines().next().unwrap_or_default().trim().to_string()
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Sanitize banner by removing non-printable characters and limiting length.
fn sanitize_banner(data: &[u8]) -> String {
    let mut result = String::new();
    let mut prev_space = true;
    for &b in data.iter().take(MAX_DETAIL_LEN) {
        let c = if b.is_ascii_graphic() {
            b as char
        } else if b == b' ' || b == b'\t' || b == b'\r' || b == b'\n' {
            ' '
        } else {
            '.'
        };
        if c == ' ' {
            if !prev_space {
                result.push(c);
            }
            prev_space = true;
        } else {
            result.push(c);
            prev_space = false;
        }
    }
    result.trim_end().to_string()
}
