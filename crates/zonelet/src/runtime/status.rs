//! # Status Mapping
//!
//! Folds backend container/sandbox states into the four workload states.
//! The mapping is total: every input, including states this agent has never
//! heard of, produces exactly one answer.

use crate::runtime::cri::CONTAINER_CREATED;
use crate::runtime::cri::CONTAINER_EXITED;
use crate::runtime::cri::CONTAINER_RUNNING;
use crate::runtime::cri::ContainerStatus;
use crate::runtime::cri::SANDBOX_NOTREADY;
use crate::runtime::cri::SANDBOX_READY;
use crate::runtime::cri::SandboxStatus;
use crate::workload::WorkloadState;

/// What the backend says about a zone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Observation {
    pub state: WorkloadState,
    /// Why the zone is `Failed`. Always `Some` for `Failed`, `None` otherwise.
    pub detail: Option<String>,
}

impl Observation {
    pub fn new(state: WorkloadState) -> Self {
        Self { state, detail: None }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self { state: WorkloadState::Failed, detail: Some(detail.into()) }
    }
}

/// Whether the sandbox needs to be consulted to classify this container state.
pub fn needs_sandbox(container: &ContainerStatus) -> bool {
    container.state == CONTAINER_RUNNING
}

/// Maps backend status to a workload state.
///
/// `sandbox` is only looked at for running containers; a running container in
/// a sandbox that is not ready counts as failed.
pub fn observe(container: &ContainerStatus, sandbox: Option<&SandboxStatus>) -> Observation {
    match container.state.as_str() {
        CONTAINER_CREATED => Observation::new(WorkloadState::Pending),
        CONTAINER_RUNNING => match sandbox.map(|s| s.state.as_str()) {
            None | Some(SANDBOX_READY) => Observation::new(WorkloadState::Running),
            Some(SANDBOX_NOTREADY) => Observation::failed("sandbox is not ready while its container is running"),
            Some(other) => Observation::failed(format!("unrecognized sandbox state {:?}", other)),
        },
        CONTAINER_EXITED => match container.exit_code {
            Some(0) => Observation::new(WorkloadState::Succeeded),
            Some(code) => Observation::failed(describe_exit(code, container)),
            None => Observation::failed("container exited without reporting an exit code"),
        },
        other => Observation::failed(format!("unrecognized container state {:?}", other)),
    }
}

fn describe_exit(code: i32, container: &ContainerStatus) -> String {
    let mut detail = format!("container exited with code {}", code);
    if let Some(reason) = container.reason.as_deref().filter(|r| !r.is_empty()) {
        detail.push_str(": ");
        detail.push_str(reason);
    }
    if let Some(message) = container.message.as_deref().filter(|m| !m.is_empty()) {
        detail.push_str(" (");
        detail.push_str(message);
        detail.push(')');
    }
    detail
}
