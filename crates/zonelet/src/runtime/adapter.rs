//! # CRI Adapter
//!
//! Drives the three-step zone creation sequence and the status query over a
//! [`CriBackend`], turning backend errors into [`RuntimeError`]s.

use tracing::debug;
use tracing::warn;

use crate::runtime::Observation;
use crate::runtime::Result;
use crate::runtime::RuntimeError;
use crate::runtime::ZoneRuntime;
use crate::runtime::cri::BackendError;
use crate::runtime::cri::ContainerConfig;
use crate::runtime::cri::CriBackend;
use crate::runtime::cri::SandboxConfig;
use crate::runtime::status;
use crate::workload::PartialHandle;
use crate::workload::RuntimeHandle;
use crate::workload::WorkloadSpec;

pub struct CriAdapter<B> {
    backend: B,
}

impl<B: CriBackend> CriAdapter<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

/// Classifies a backend error for one named step.
fn step_error(step: &str, error: BackendError, partial: PartialHandle) -> RuntimeError {
    let err = match error {
        BackendError::Unavailable(msg) => RuntimeError::unavailable(format!("{}: {}", step, msg)),
        other => RuntimeError::failed(format!("{}: {}", step, other)),
    };
    err.with_partial(partial)
}

#[async_trait::async_trait]
impl<B: CriBackend> ZoneRuntime for CriAdapter<B> {
    async fn create_zone(&self, spec: &WorkloadSpec) -> Result<RuntimeHandle> {
        let mut partial = PartialHandle::default();

        let sandbox_id = self
            .backend
            .run_pod_sandbox(&SandboxConfig::for_workload(spec))
            .await
            .map_err(|e| step_error("run pod sandbox", e, partial.clone()))?;
        debug!(workload_id = %spec.id, %sandbox_id, "sandbox created");
        partial.sandbox_id = Some(sandbox_id.clone());

        let container_id = self
            .backend
            .create_container(&sandbox_id, &ContainerConfig::for_workload(spec))
            .await
            .map_err(|e| step_error("create container", e, partial.clone()))?;
        debug!(workload_id = %spec.id, %sandbox_id, %container_id, "container created");
        partial.container_id = Some(container_id.clone());

        if let Err(e) = self.backend.start_container(&container_id).await {
            warn!(workload_id = %spec.id, %sandbox_id, %container_id, error = %e, "container failed to start");
            return Err(step_error("start container", e, partial));
        }
        debug!(workload_id = %spec.id, %container_id, "container started");

        Ok(RuntimeHandle { sandbox_id, container_id })
    }

    async fn query_status(&self, handle: &RuntimeHandle) -> Result<Observation> {
        let container = self
            .backend
            .container_status(&handle.container_id)
            .await
            .map_err(|e| step_error("container status", e, PartialHandle::default()))?;

        let sandbox = if status::needs_sandbox(&container) {
            let sandbox = self
                .backend
                .pod_sandbox_status(&handle.sandbox_id)
                .await
                .map_err(|e| step_error("pod sandbox status", e, PartialHandle::default()))?;
            Some(sandbox)
        } else {
            None
        };

        Ok(status::observe(&container, sandbox.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RuntimeErrorKind;
    use crate::runtime::cri::SANDBOX_NOTREADY;
    use crate::runtime::simulated::SimulatedBackend;
    use crate::runtime::simulated::Step;
    use crate::workload::WorkloadState;

    fn spec() -> WorkloadSpec {
        WorkloadSpec::new("wl-1", "x", "edera-zone").with_memory_mb(512).with_cpu_millicores(500)
    }

    fn rejected(msg: &str) -> BackendError {
        BackendError::Rejected { code: "Internal".into(), message: msg.into() }
    }

    #[tokio::test]
    async fn test_create_zone_runs_all_steps() {
        let adapter = CriAdapter::new(SimulatedBackend::new());
        let handle = adapter.create_zone(&spec()).await.expect("create_zone failed");

        let backend = adapter.backend();
        assert_eq!(backend.calls(Step::RunPodSandbox), 1);
        assert_eq!(backend.calls(Step::CreateContainer), 1);
        assert_eq!(backend.calls(Step::StartContainer), 1);
        assert_eq!(backend.sandbox_of(&handle.container_id).as_deref(), Some(handle.sandbox_id.as_str()));
    }

    #[tokio::test]
    async fn test_sandbox_failure_has_no_partial_handle() {
        let adapter = CriAdapter::new(SimulatedBackend::new());
        adapter.backend().fail_next(Step::RunPodSandbox, rejected("no capacity"));

        let err = adapter.create_zone(&spec()).await.unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::Failed);
        assert!(err.partial.is_empty());
        assert_eq!(adapter.backend().calls(Step::CreateContainer), 0);
    }

    #[tokio::test]
    async fn test_start_failure_reports_partial_handle() {
        let adapter = CriAdapter::new(SimulatedBackend::new());
        adapter.backend().fail_next(Step::StartContainer, rejected("exec format error"));

        let err = adapter.create_zone(&spec()).await.unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::Failed);
        assert!(err.partial.sandbox_id.is_some());
        assert!(err.partial.container_id.is_some());

        let text = err.to_string();
        assert!(text.contains("start container"));
        assert!(text.contains("exec format error"));
        assert!(text.contains("obtained before failure"));
    }

    #[tokio::test]
    async fn test_unreachable_backend_midway_is_unavailable() {
        let adapter = CriAdapter::new(SimulatedBackend::new());
        adapter.backend().fail_next(Step::CreateContainer, BackendError::Unavailable("socket gone".into()));

        let err = adapter.create_zone(&spec()).await.unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::Unavailable);
        assert!(err.partial.sandbox_id.is_some());
        assert!(err.partial.container_id.is_none());
    }

    #[tokio::test]
    async fn test_query_status_follows_container() {
        let adapter = CriAdapter::new(SimulatedBackend::new());
        let handle = adapter.create_zone(&spec()).await.unwrap();

        let obs = adapter.query_status(&handle).await.unwrap();
        assert_eq!(obs.state, WorkloadState::Running);

        adapter.backend().exit_container(&handle.container_id, 0);
        let obs = adapter.query_status(&handle).await.unwrap();
        assert_eq!(obs.state, WorkloadState::Succeeded);
        // Exited containers don't need the sandbox consulted.
        assert_eq!(adapter.backend().calls(Step::PodSandboxStatus), 1);
    }

    #[tokio::test]
    async fn test_query_status_sees_dead_sandbox() {
        let adapter = CriAdapter::new(SimulatedBackend::new());
        let handle = adapter.create_zone(&spec()).await.unwrap();
        adapter.backend().set_sandbox_state(&handle.sandbox_id, SANDBOX_NOTREADY);

        let obs = adapter.query_status(&handle).await.unwrap();
        assert_eq!(obs.state, WorkloadState::Failed);
    }

    #[tokio::test]
    async fn test_query_status_error_is_classified() {
        let adapter = CriAdapter::new(SimulatedBackend::new());
        let handle = adapter.create_zone(&spec()).await.unwrap();
        adapter.backend().fail_next(Step::ContainerStatus, BackendError::Unavailable("down".into()));

        let err = adapter.query_status(&handle).await.unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::Unavailable);

        adapter.backend().fail_next(Step::ContainerStatus, BackendError::Malformed("not json".into()));
        let err = adapter.query_status(&handle).await.unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::Failed);
    }
}
