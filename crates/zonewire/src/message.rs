//! Request and response messages.

use serde::Deserialize;
use serde::Serialize;

use crate::types::WorkloadSpec;
use crate::types::WorkloadState;

/// Control plane to agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    StartWorkload { workload: WorkloadSpec },
    GetStatus { id: String },
}

impl Request {
    /// The workload id this request is about.
    pub fn workload_id(&self) -> &str {
        match self {
            Self::StartWorkload { workload } => &workload.id,
            Self::GetStatus { id } => id,
        }
    }
}

/// Agent to control plane.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Status {
        id: String,
        state: WorkloadState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_error: Option<String>,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        kind: ErrorKind,
        message: String,
        /// Last known state, when a status query failed against an existing entry.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state: Option<WorkloadState>,
    },
}

impl Response {
    pub fn status(id: impl Into<String>, state: WorkloadState, last_error: Option<String>) -> Self {
        Self::Status { id: id.into(), state, last_error }
    }

    pub fn error(id: Option<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error { id, kind, message: message.into(), state: None }
    }
}

/// Error taxonomy shared by the agent and its callers.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Unsupported runtime class or malformed spec.
    ValidationError,
    /// The id is already registered.
    DuplicateError,
    /// The id is unknown.
    NotFoundError,
    /// The message could not be decoded.
    ProtocolError,
    /// The isolation backend could not be reached.
    RuntimeUnavailable,
    /// The backend was reached but the lifecycle call failed.
    RuntimeError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ValidationError => "ValidationError",
            Self::DuplicateError => "DuplicateError",
            Self::NotFoundError => "NotFoundError",
            Self::ProtocolError => "ProtocolError",
            Self::RuntimeUnavailable => "RuntimeUnavailable",
            Self::RuntimeError => "RuntimeError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
