//! # Agent Client
//!
//! What a control plane uses to talk to an agent: one TCP connection carrying
//! sequential request/response exchanges.

use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::net::ToSocketAddrs;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::tcp::OwnedWriteHalf;
use zonewire::FrameError;
use zonewire::MAX_FRAME_BYTES;
use zonewire::Request;
use zonewire::Response;
use zonewire::WorkloadSpec;

use crate::frame_io::ReadFrame;
use crate::frame_io::read_frame;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Frame(FrameError),
    /// The agent closed the connection before answering.
    ConnectionClosed,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Frame(e) => write!(f, "Frame error: {}", e),
            Self::ConnectionClosed => write!(f, "Connection closed by agent"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub struct AgentClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    line: Vec<u8>,
}

impl AgentClient {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
            line: Vec::new(),
        })
    }

    pub async fn start_workload(&mut self, workload: WorkloadSpec) -> Result<Response> {
        self.call(&Request::StartWorkload { workload }).await
    }

    pub async fn get_status(&mut self, id: impl Into<String>) -> Result<Response> {
        self.call(&Request::GetStatus { id: id.into() }).await
    }

    pub async fn call(&mut self, request: &Request) -> Result<Response> {
        let bytes = zonewire::encode_request(request)?;
        self.send_raw(&bytes).await
    }

    /// Sends a pre-encoded line and reads the reply. A missing newline is added.
    pub async fn send_raw(&mut self, line: &[u8]) -> Result<Response> {
        self.writer.write_all(line).await?;
        if !line.ends_with(b"\n") {
            self.writer.write_all(b"\n").await?;
        }
        self.writer.flush().await?;

        match read_frame(&mut self.reader, &mut self.line, MAX_FRAME_BYTES).await? {
            ReadFrame::Line => Ok(zonewire::decode_response(&self.line)?),
            ReadFrame::TooLarge(len) => Err(Error::Frame(FrameError::TooLarge(len))),
            ReadFrame::Closed => Err(Error::ConnectionClosed),
        }
    }
}
