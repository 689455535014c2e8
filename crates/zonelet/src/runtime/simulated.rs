//! # Simulated Backend
//!
//! An in-process stand-in for an isolation host. It hands out sandbox and
//! container ids, tracks their states, and can be scripted to fail a given
//! step or to move a container to any state. Used when running the agent
//! without an isolation host, and throughout the test suite.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use dashmap::DashMap;

use crate::runtime::cri::BackendError;
use crate::runtime::cri::CONTAINER_CREATED;
use crate::runtime::cri::CONTAINER_RUNNING;
use crate::runtime::cri::ContainerConfig;
use crate::runtime::cri::ContainerStatus;
use crate::runtime::cri::CriBackend;
use crate::runtime::cri::Result;
use crate::runtime::cri::SANDBOX_READY;
use crate::runtime::cri::SandboxConfig;
use crate::runtime::cri::SandboxStatus;

/// One backend call, for scripting failures and counting invocations.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum Step {
    RunPodSandbox,
    CreateContainer,
    StartContainer,
    ContainerStatus,
    PodSandboxStatus,
}

struct SimContainer {
    sandbox_id: String,
    status: ContainerStatus,
}

#[derive(Default)]
pub struct SimulatedBackend {
    next_id: AtomicU64,
    sandboxes: DashMap<String, SandboxStatus>,
    containers: DashMap<String, SimContainer>,
    failures: DashMap<Step, BackendError>,
    calls: DashMap<Step, u64>,
    latency: Option<Duration>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every call by `latency`, to widen race windows in tests.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes the next call of `step` fail with `error`. Consumed by that call.
    pub fn fail_next(&self, step: Step, error: BackendError) {
        self.failures.insert(step, error);
    }

    /// Number of times `step` has been invoked, failed calls included.
    pub fn calls(&self, step: Step) -> u64 {
        self.calls.get(&step).map(|c| *c).unwrap_or(0)
    }

    pub fn set_container_status(&self, container_id: &str, status: ContainerStatus) {
        if let Some(mut container) = self.containers.get_mut(container_id) {
            container.status = status;
        }
    }

    /// Sets a raw container state, keeping any other status fields.
    pub fn set_container_state(&self, container_id: &str, state: &str) {
        if let Some(mut container) = self.containers.get_mut(container_id) {
            container.status.state = state.to_string();
        }
    }

    pub fn exit_container(&self, container_id: &str, exit_code: i32) {
        self.set_container_status(container_id, ContainerStatus::exited(exit_code));
    }

    pub fn set_sandbox_state(&self, sandbox_id: &str, state: &str) {
        if let Some(mut sandbox) = self.sandboxes.get_mut(sandbox_id) {
            sandbox.state = state.to_string();
        }
    }

    pub fn sandbox_of(&self, container_id: &str) -> Option<String> {
        self.containers.get(container_id).map(|c| c.sandbox_id.clone())
    }

    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    async fn enter(&self, step: Step) -> Result<()> {
        *self.calls.entry(step).or_insert(0) += 1;
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match self.failures.remove(&step) {
            Some((_, error)) => Err(error),
            None => Ok(()),
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

fn not_found(what: &str, id: &str) -> BackendError {
    BackendError::Rejected {
        code: "NotFound".into(),
        message: format!("{} {} does not exist", what, id),
    }
}

#[async_trait::async_trait]
impl CriBackend for SimulatedBackend {
    async fn run_pod_sandbox(&self, _config: &SandboxConfig) -> Result<String> {
        self.enter(Step::RunPodSandbox).await?;
        let id = self.next_id("sb");
        self.sandboxes.insert(id.clone(), SandboxStatus { state: SANDBOX_READY.into() });
        Ok(id)
    }

    async fn create_container(&self, sandbox_id: &str, _config: &ContainerConfig) -> Result<String> {
        self.enter(Step::CreateContainer).await?;
        if !self.sandboxes.contains_key(sandbox_id) {
            return Err(not_found("sandbox", sandbox_id));
        }
        let id = self.next_id("ctr");
        self.containers.insert(id.clone(), SimContainer {
            sandbox_id: sandbox_id.to_string(),
            status: ContainerStatus::new(CONTAINER_CREATED),
        });
        Ok(id)
    }

    async fn start_container(&self, container_id: &str) -> Result<()> {
        self.enter(Step::StartContainer).await?;
        let mut container = self
            .containers
            .get_mut(container_id)
            .ok_or_else(|| not_found("container", container_id))?;
        if container.status.state != CONTAINER_CREATED {
            return Err(BackendError::Rejected {
                code: "FailedPrecondition".into(),
                message: format!("container {} is {}, not created", container_id, container.status.state),
            });
        }
        container.status = ContainerStatus::new(CONTAINER_RUNNING);
        Ok(())
    }

    async fn container_status(&self, container_id: &str) -> Result<ContainerStatus> {
        self.enter(Step::ContainerStatus).await?;
        self.containers
            .get(container_id)
            .map(|c| c.status.clone())
            .ok_or_else(|| not_found("container", container_id))
    }

    async fn pod_sandbox_status(&self, sandbox_id: &str) -> Result<SandboxStatus> {
        self.enter(Step::PodSandboxStatus).await?;
        self.sandboxes
            .get(sandbox_id)
            .map(|s| s.clone())
            .ok_or_else(|| not_found("sandbox", sandbox_id))
    }
}
