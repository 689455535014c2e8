//! # Transport Abstraction
//!
//! A minimal, async interface for moving bytes between the agent and a local
//! runtime proxy process.
//!
//! ## Philosophy
//!
//! - **Byte-Oriented**: The Transport knows nothing about CRI calls or JSON.
//!   It moves opaque, newline-terminated buffers.
//! - **Request-Response**: "send bytes, await bytes". One connection per call,
//!   so concurrent calls never share a stream.

use std::fmt;
use std::path::PathBuf;

use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;

use crate::frame_io::ReadFrame;
use crate::frame_io::read_frame;

/// Largest reply accepted from a proxy.
pub const MAX_REPLY_BYTES: usize = 4 * 1024 * 1024;

/// Errors that occur at the network/transport layer.
#[derive(Debug, Clone)]
pub enum TransportError {
    /// The peer is unreachable or the connection was dropped.
    ConnectionLost(String),
    /// The reply exceeded `MAX_REPLY_BYTES`.
    PayloadTooLarge,
    /// Generic I/O error or internal transport failure.
    Io(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionLost(msg) => write!(f, "Connection lost: {}", msg),
            Self::PayloadTooLarge => write!(f, "Payload too large for transport"),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

pub type Result<T> = std::result::Result<T, TransportError>;

/// A mechanism to send a byte buffer and receive a reply.
///
/// This trait is designed to be object-safe (`Arc<dyn Transport>`).
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Sends a payload and waits for a response.
    ///
    /// # invariants
    /// - Must return `Ok(vec)` with the raw reply bytes on success.
    /// - Must return `Err` if the peer cannot be reached or hangs up.
    /// - Should not interpret the payload content.
    async fn call(&self, payload: &[u8]) -> Result<Vec<u8>>;
}

/// Where a local proxy listens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    Tcp(String),
}

impl Endpoint {
    /// Parses `unix:///path`, `tcp://host:port`, a bare absolute path, or a bare `host:port`.
    pub fn parse(raw: &str) -> std::result::Result<Self, String> {
        let raw = raw.trim();
        if let Some(path) = raw.strip_prefix("unix://") {
            return Self::unix(path, raw);
        }
        if let Some(addr) = raw.strip_prefix("tcp://") {
            return Self::tcp(addr, raw);
        }
        if raw.starts_with('/') {
            return Self::unix(raw, raw);
        }
        Self::tcp(raw, raw)
    }

    fn unix(path: &str, raw: &str) -> std::result::Result<Self, String> {
        if path.is_empty() {
            return Err(format!("endpoint {:?} has an empty socket path", raw));
        }
        Ok(Self::Unix(PathBuf::from(path)))
    }

    fn tcp(addr: &str, raw: &str) -> std::result::Result<Self, String> {
        match addr.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                Ok(Self::Tcp(addr.to_string()))
            }
            _ => Err(format!("endpoint {:?} is neither a socket path nor host:port", raw)),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
            Self::Tcp(addr) => write!(f, "tcp://{}", addr),
        }
    }
}

/// Line-oriented transport that dials the endpoint once per call.
pub struct SocketTransport {
    endpoint: Endpoint,
}

impl SocketTransport {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait::async_trait]
impl Transport for SocketTransport {
    async fn call(&self, payload: &[u8]) -> Result<Vec<u8>> {
        match &self.endpoint {
            Endpoint::Tcp(addr) => {
                let stream = tokio::net::TcpStream::connect(addr.as_str())
                    .await
                    .map_err(|e| TransportError::ConnectionLost(format!("{}: {}", self.endpoint, e)))?;
                exchange(stream, payload).await
            }
            #[cfg(unix)]
            Endpoint::Unix(path) => {
                let stream = tokio::net::UnixStream::connect(path)
                    .await
                    .map_err(|e| TransportError::ConnectionLost(format!("{}: {}", self.endpoint, e)))?;
                exchange(stream, payload).await
            }
            #[cfg(not(unix))]
            Endpoint::Unix(_) => Err(TransportError::Io(format!(
                "{}: unix sockets are not supported on this platform",
                self.endpoint
            ))),
        }
    }
}

/// Writes one line and reads one line back.
async fn exchange<S>(stream: S, payload: &[u8]) -> Result<Vec<u8>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);

    writer.write_all(payload).await.map_err(io_error)?;
    if !payload.ends_with(b"\n") {
        writer.write_all(b"\n").await.map_err(io_error)?;
    }
    writer.flush().await.map_err(io_error)?;

    let mut reader = BufReader::new(reader);
    let mut reply = Vec::new();
    match read_frame(&mut reader, &mut reply, MAX_REPLY_BYTES).await.map_err(io_error)? {
        ReadFrame::Line => Ok(reply),
        ReadFrame::TooLarge(_) => Err(TransportError::PayloadTooLarge),
        ReadFrame::Closed => Err(TransportError::ConnectionLost("peer closed before replying".into())),
    }
}

fn io_error(e: std::io::Error) -> TransportError {
    match e.kind() {
        std::io::ErrorKind::BrokenPipe
        | std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::ConnectionAborted
        | std::io::ErrorKind::UnexpectedEof => TransportError::ConnectionLost(e.to_string()),
        _ => TransportError::Io(e.to_string()),
    }
}
