//! # Runtime Adapter
//!
//! The only part of the agent that knows zones are made of a sandbox and a
//! container. Everything above this module sees two operations:
//!
//! - `create_zone(spec) -> RuntimeHandle`
//! - `query_status(handle) -> Observation`
//!
//! [`CriAdapter`] implements both over any [`CriBackend`]. Which backend is
//! used is decided once at startup by [`build`].
//!
//! Neither operation retries or times out; both may block on backend I/O.

pub mod adapter;
pub mod cri;
pub mod proxy;
pub mod simulated;
pub mod status;

use std::sync::Arc;

pub use adapter::CriAdapter;
pub use cri::BackendError;
pub use cri::CriBackend;
pub use proxy::ProxyBackend;
pub use simulated::SimulatedBackend;
pub use status::Observation;

use crate::config::BackendConfig;
use crate::transport::SocketTransport;
use crate::workload::PartialHandle;
use crate::workload::RuntimeHandle;
use crate::workload::WorkloadSpec;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    /// The backend could not be reached.
    Unavailable,
    /// The backend was reached but the call failed or answered nonsense.
    Failed,
}

/// A failed lifecycle call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub message: String,
    /// What `create_zone` obtained before failing. Empty for status queries.
    pub partial: PartialHandle,
}

impl RuntimeError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: RuntimeErrorKind::Unavailable,
            message: message.into(),
            partial: PartialHandle::default(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            kind: RuntimeErrorKind::Failed,
            message: message.into(),
            partial: PartialHandle::default(),
        }
    }

    pub fn with_partial(mut self, partial: PartialHandle) -> Self {
        self.partial = partial;
        self
    }
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            RuntimeErrorKind::Unavailable => write!(f, "runtime unavailable: {}", self.message)?,
            RuntimeErrorKind::Failed => write!(f, "runtime call failed: {}", self.message)?,
        }
        if !self.partial.is_empty() {
            write!(f, " ({} obtained before failure)", self.partial)?;
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeError {}

pub type Result<T> = std::result::Result<T, RuntimeError>;

/// The contract between the dispatcher and an isolation backend.
///
/// This trait is designed to be object-safe (`Arc<dyn ZoneRuntime>`).
#[async_trait::async_trait]
pub trait ZoneRuntime: Send + Sync + 'static {
    /// Creates sandbox, creates container, starts container.
    ///
    /// Either all three succeed and a full handle is returned, or the whole
    /// operation fails with the partial handle attached to the error.
    async fn create_zone(&self, spec: &WorkloadSpec) -> Result<RuntimeHandle>;

    /// Asks the backend where the zone is and maps the answer onto a workload state.
    ///
    /// Unrecognized backend states come back as `Failed` with a detail, never as an error.
    async fn query_status(&self, handle: &RuntimeHandle) -> Result<Observation>;
}

/// Builds the runtime selected by configuration.
pub fn build(config: &BackendConfig) -> Arc<dyn ZoneRuntime> {
    match config {
        BackendConfig::Proxy { endpoint } => {
            let transport = SocketTransport::new(endpoint.clone());
            Arc::new(CriAdapter::new(ProxyBackend::new(Arc::new(transport))))
        }
        BackendConfig::Simulated => Arc::new(CriAdapter::new(SimulatedBackend::new())),
    }
}
