//! Liveness probing of the service's REST endpoint.
//!
//! The lifecycle manager only needs to know whether one `GET /_ping` against
//! the service URI succeeds; everything else about the wire protocol belongs
//! to podman. The probe outcome is tagged so the readiness loop can tell the
//! one recoverable condition (endpoint not accepting connections yet) apart
//! from fatal ones.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::ProbeError;

const PING_PATH: &str = "/_ping";

/// Sockets that stop answering mid-request should not hang the poll loop.
const IO_TIMEOUT: Duration = Duration::from_secs(3);

/// A single best-effort health check against a service endpoint.
///
/// `Ok(true)` means the service is ready, `Ok(false)` means it answered but
/// is not ready yet. See [`ProbeError`] for the failure classes.
pub trait Prober {
    fn ping(&self, uri: &str) -> Result<bool, ProbeError>;
}

/// Probes the service by speaking plain HTTP/1.1 over the socket named in
/// the URI. Supports `unix://`, `tcp://` and `http://` URIs, the forms
/// `podman system service` itself accepts.
#[derive(Debug, Clone, Default)]
pub struct HttpProber;

impl HttpProber {
    pub fn new() -> Self {
        Self
    }
}

impl Prober for HttpProber {
    fn ping(&self, uri: &str) -> Result<bool, ProbeError> {
        let status = match parse_endpoint(uri)? {
            Endpoint::Unix(path) => {
                let stream = UnixStream::connect(&path).map_err(|e| unreachable(uri, e))?;
                stream
                    .set_read_timeout(Some(IO_TIMEOUT))
                    .and_then(|_| stream.set_write_timeout(Some(IO_TIMEOUT)))
                    .map_err(|e| unreachable(uri, e))?;
                exchange(uri, stream)?
            }
            Endpoint::Tcp(addr) => {
                let stream = TcpStream::connect(&addr).map_err(|e| unreachable(uri, e))?;
                stream
                    .set_read_timeout(Some(IO_TIMEOUT))
                    .and_then(|_| stream.set_write_timeout(Some(IO_TIMEOUT)))
                    .map_err(|e| unreachable(uri, e))?;
                exchange(uri, stream)?
            }
        };

        log::trace!("ping {} answered {}", uri, status);
        Ok((200..300).contains(&status))
    }
}

enum Endpoint {
    Unix(PathBuf),
    Tcp(String),
}

fn parse_endpoint(uri: &str) -> Result<Endpoint, ProbeError> {
    if let Some(path) = uri.strip_prefix("unix://") {
        if path.is_empty() {
            return Err(address(uri, "empty socket path"));
        }
        return Ok(Endpoint::Unix(PathBuf::from(path)));
    }

    for scheme in &["tcp://", "http://"] {
        if let Some(rest) = uri.strip_prefix(*scheme) {
            let authority = rest.split('/').next().unwrap_or("");
            if authority.is_empty() {
                return Err(address(uri, "missing host"));
            }
            if !authority.contains(':') {
                return Err(address(uri, "missing port"));
            }
            return Ok(Endpoint::Tcp(authority.to_string()));
        }
    }

    Err(address(uri, "unsupported scheme"))
}

/// One request-response round trip. The `Connection: close` header makes the
/// service close the socket after answering, so reading to EOF is enough.
fn exchange<S: Read + Write>(uri: &str, mut stream: S) -> Result<u16, ProbeError> {
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        PING_PATH
    );
    stream
        .write_all(request.as_bytes())
        .map_err(|e| unreachable(uri, e))?;

    let mut raw = Vec::new();
    stream
        .read_to_end(&mut raw)
        .map_err(|e| unreachable(uri, e))?;

    parse_status(uri, &raw)
}

fn parse_status(uri: &str, raw: &[u8]) -> Result<u16, ProbeError> {
    let text = String::from_utf8_lossy(raw);
    let status_line = match text.lines().next() {
        Some(line) if !line.is_empty() => line.to_string(),
        _ => return Err(protocol(uri, "empty response")),
    };

    let mut parts = status_line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(version), Some(code)) if version.starts_with("HTTP/") => code
            .parse::<u16>()
            .map_err(|_| protocol(uri, "unparseable status code")),
        _ => Err(protocol(uri, "missing status line")),
    }
}

fn unreachable(uri: &str, source: io::Error) -> ProbeError {
    ProbeError::Unreachable {
        uri: uri.to_string(),
        source,
    }
}

fn address(uri: &str, reason: &str) -> ProbeError {
    ProbeError::Address {
        uri: uri.to_string(),
        reason: reason.to_string(),
    }
}

fn protocol(uri: &str, reason: &str) -> ProbeError {
    ProbeError::Protocol {
        uri: uri.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::os::unix::net::UnixListener;
    use std::path::Path;
    use std::thread;

    use super::*;

    fn serve_unix_once(path: &Path, response: &'static str) -> thread::JoinHandle<()> {
        let listener = UnixListener::bind(path).unwrap();
        thread::spawn(move || {
            if let Ok((mut socket, _)) = listener.accept() {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf);
                let _ = socket.write_all(response.as_bytes());
            }
        })
    }

    #[test]
    fn test_ping_ready_over_unix_socket() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("api.sock");
        let server = serve_unix_once(&socket, "HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nOK");

        let uri = format!("unix://{}", socket.display());
        assert!(HttpProber::new().ping(&uri).unwrap());
        server.join().unwrap();
    }

    #[test]
    fn test_ping_not_ready_on_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("api.sock");
        let server = serve_unix_once(&socket, "HTTP/1.1 503 Service Unavailable\r\n\r\n");

        let uri = format!("unix://{}", socket.display());
        assert!(!HttpProber::new().ping(&uri).unwrap());
        server.join().unwrap();
    }

    #[test]
    fn test_ping_unreachable_without_listener() {
        let dir = tempfile::tempdir().unwrap();
        let uri = format!("unix://{}/absent.sock", dir.path().display());
        let err = HttpProber::new().ping(&uri).unwrap_err();
        assert!(matches!(err, ProbeError::Unreachable { .. }));
    }

    #[test]
    fn test_ping_garbage_response_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("api.sock");
        let server = serve_unix_once(&socket, "I AM NOT HTTP\r\n\r\n");

        let uri = format!("unix://{}", socket.display());
        let err = HttpProber::new().ping(&uri).unwrap_err();
        assert!(matches!(err, ProbeError::Protocol { .. }));
        server.join().unwrap();
    }

    #[test]
    fn test_ping_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            if let Ok((mut socket, _)) = listener.accept() {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf);
                let _ = socket.write_all(b"HTTP/1.1 200 OK\r\n\r\n");
            }
        });

        let uri = format!("tcp://{}", addr);
        assert!(HttpProber::new().ping(&uri).unwrap());
        server.join().unwrap();
    }

    #[test]
    fn test_unsupported_uri_is_rejected() {
        let prober = HttpProber::new();
        assert!(matches!(
            prober.ping("ftp://example.com").unwrap_err(),
            ProbeError::Address { .. }
        ));
        assert!(matches!(
            prober.ping("tcp://nohost").unwrap_err(),
            ProbeError::Address { .. }
        ));
        assert!(matches!(
            prober.ping("unix://").unwrap_err(),
            ProbeError::Address { .. }
        ));
    }
}
