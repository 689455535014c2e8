//! # Protocol Listener
//!
//! Accepts control-plane connections and pumps request lines through the
//! dispatcher. One task per connection; exchanges on a connection are
//! sequential. A bad frame is answered with a `ProtocolError` and the
//! connection stays open.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::net::TcpListener;
use tracing::Instrument;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::info_span;
use tracing::warn;
use zonewire::ErrorKind;
use zonewire::FrameError;
use zonewire::MAX_FRAME_BYTES;
use zonewire::Request;
use zonewire::Response;

use crate::dispatch::Dispatcher;
use crate::dispatch::StatusReport;
use crate::error::AgentError;
use crate::frame_io::ReadFrame;
use crate::frame_io::read_frame;
use crate::workload::WorkloadEntry;
use crate::workload::WorkloadId;

/// Pause after a failed accept, so a persistent error (e.g. fd exhaustion) doesn't spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct Listener {
    listener: TcpListener,
    dispatcher: Dispatcher,
}

impl Listener {
    pub async fn bind(addr: SocketAddr, dispatcher: Dispatcher) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, dispatcher })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves until the process exits.
    pub async fn serve(self) -> std::io::Result<()> {
        self.serve_until(std::future::pending()).await
    }

    /// Serves until `shutdown` resolves. Open connections are left to finish on their own.
    pub async fn serve_until<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()>,
    {
        let addr = self.local_addr()?;
        info!(%addr, "listening for control plane connections");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(%addr, "listener shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let dispatcher = self.dispatcher.clone();
                        let span = info_span!("connection", %peer);
                        tokio::spawn(
                            async move {
                                debug!("connection opened");
                                if let Err(e) = serve_connection(stream, dispatcher).await {
                                    warn!(error = %e, "connection ended with error");
                                } else {
                                    debug!("connection closed");
                                }
                            }
                            .instrument(span),
                        );
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }
    }
}

/// Runs request/response exchanges on one stream until the peer closes it.
pub async fn serve_connection<S>(stream: S, dispatcher: Dispatcher) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    loop {
        let response = match read_frame(&mut reader, &mut line, MAX_FRAME_BYTES).await? {
            ReadFrame::Closed => return Ok(()),
            ReadFrame::TooLarge(len) => protocol_error(None, &FrameError::TooLarge(len)),
            ReadFrame::Line => match zonewire::decode_request(&line) {
                Ok(request) => route(&dispatcher, request).await,
                Err(e) => protocol_error(zonewire::peek_id(&line), &e),
            },
        };

        let bytes = match zonewire::encode_response(&response) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(error = %e, "failed to encode response");
                let fallback = Response::error(None, ErrorKind::RuntimeError, "failed to encode response");
                zonewire::encode_response(&fallback).map_err(std::io::Error::other)?
            }
        };
        writer.write_all(&bytes).await?;
        writer.flush().await?;
    }
}

/// Invokes the dispatcher method matching `request` and shapes the outcome.
pub async fn route(dispatcher: &Dispatcher, request: Request) -> Response {
    let id = request.workload_id().to_string();
    match request {
        Request::StartWorkload { workload } => match dispatcher.handle_start(workload).await {
            Ok(entry) => entry_response(&entry),
            Err(e) => error_response(&id, &e),
        },
        Request::GetStatus { .. } => match dispatcher.handle_get_status(&WorkloadId::new(id.as_str())).await {
            Ok(report) => report_response(report),
            Err(e) => error_response(&id, &e),
        },
    }
}

fn entry_response(entry: &WorkloadEntry) -> Response {
    Response::status(entry.id(), entry.state, entry.last_error.clone())
}

fn report_response(report: StatusReport) -> Response {
    match report.query_error {
        None => entry_response(&report.entry),
        Some(e) => Response::Error {
            id: Some(report.entry.spec.id.clone()),
            kind: e.kind(),
            message: e.to_string(),
            state: Some(report.entry.state),
        },
    }
}

fn error_response(id: &str, e: &AgentError) -> Response {
    let id = (!id.is_empty()).then(|| id.to_string());
    Response::error(id, e.kind(), e.to_string())
}

fn protocol_error(id: Option<String>, e: &FrameError) -> Response {
    debug!(error = %e, "rejected frame");
    Response::error(id, ErrorKind::ProtocolError, AgentError::Protocol(e.to_string()).to_string())
}
