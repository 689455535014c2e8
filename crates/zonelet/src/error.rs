//! # Agent Errors
//!
//! The taxonomy every request failure is reported in. Each variant maps onto
//! exactly one wire [`ErrorKind`]; nothing here is fatal to the process.

use zonewire::ErrorKind;

use crate::registry;
use crate::runtime::RuntimeError;
use crate::runtime::RuntimeErrorKind;
use crate::workload::WorkloadId;
use crate::workload::WorkloadState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// Unsupported runtime class or malformed spec.
    Validation(String),
    Duplicate(WorkloadId),
    NotFound(WorkloadId),
    /// Undecodable message.
    Protocol(String),
    RuntimeUnavailable(String),
    Runtime(String),
    /// The dispatcher asked the registry for an edge the state machine forbids.
    InvalidTransition {
        id: WorkloadId,
        from: WorkloadState,
        to: WorkloadState,
    },
}

impl AgentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::Duplicate(_) => ErrorKind::DuplicateError,
            Self::NotFound(_) => ErrorKind::NotFoundError,
            Self::Protocol(_) => ErrorKind::ProtocolError,
            Self::RuntimeUnavailable(_) => ErrorKind::RuntimeUnavailable,
            Self::Runtime(_) | Self::InvalidTransition { .. } => ErrorKind::RuntimeError,
        }
    }
}

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "Invalid workload: {}", msg),
            Self::Duplicate(id) => write!(f, "Workload already exists: {}", id),
            Self::NotFound(id) => write!(f, "Workload not found: {}", id),
            Self::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            Self::RuntimeUnavailable(msg) => write!(f, "Runtime unavailable: {}", msg),
            Self::Runtime(msg) => write!(f, "Runtime error: {}", msg),
            Self::InvalidTransition { id, from, to } => {
                write!(f, "Internal error: invalid transition for {}: {} -> {}", id, from, to)
            }
        }
    }
}

impl std::error::Error for AgentError {}

impl From<registry::Error> for AgentError {
    fn from(e: registry::Error) -> Self {
        match e {
            registry::Error::Duplicate(id) => Self::Duplicate(id),
            registry::Error::NotFound(id) => Self::NotFound(id),
            registry::Error::InvalidTransition { id, from, to } => Self::InvalidTransition { id, from, to },
        }
    }
}

impl From<RuntimeError> for AgentError {
    fn from(e: RuntimeError) -> Self {
        match e.kind {
            RuntimeErrorKind::Unavailable => Self::RuntimeUnavailable(e.to_string()),
            RuntimeErrorKind::Failed => Self::Runtime(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
