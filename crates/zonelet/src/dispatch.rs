//! # Request Dispatcher
//!
//! Turns typed requests into registry and runtime calls.
//!
//! ## Invariants
//!
//! - Validation happens before the registry is touched; a rejected spec leaves no trace.
//! - At most one runtime call is in flight per workload id (see [`SingleFlight`]).
//! - Runtime calls never hold a registry-wide lock, so a slow zone never blocks
//!   unrelated ids.
//! - A failed status query never changes recorded state.
//!
//! Zone creation runs in its own task: once started it finishes even if the
//! requesting client goes away.

use std::sync::Arc;

use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::error::AgentError;
use crate::error::Result;
use crate::registry::Registry;
use crate::runtime::ZoneRuntime;
use crate::single_flight::SingleFlight;
use crate::workload::WorkloadEntry;
use crate::workload::WorkloadId;
use crate::workload::WorkloadSpec;
use crate::workload::WorkloadState;
use crate::workload::validate_spec;

/// Result of a status request.
///
/// `query_error` is set when the backend could not be asked; `entry` then
/// holds the last known state.
#[derive(Clone, Debug)]
pub struct StatusReport {
    pub entry: WorkloadEntry,
    pub query_error: Option<AgentError>,
}

impl StatusReport {
    fn current(entry: WorkloadEntry) -> Self {
        Self { entry, query_error: None }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Arc<Registry>,
    runtime: Arc<dyn ZoneRuntime>,
    flights: SingleFlight,
    runtime_class: String,
}

impl Dispatcher {
    /// `runtime_class` is the only class this agent accepts.
    pub fn new(
        registry: Arc<Registry>,
        runtime: Arc<dyn ZoneRuntime>,
        runtime_class: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                runtime,
                flights: SingleFlight::new(),
                runtime_class: runtime_class.into(),
            }),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }

    /// Accepts a workload and brings up its zone.
    ///
    /// Returns the entry after the creation attempt: `Running` on success,
    /// `Failed` with `last_error` otherwise. Errors are only returned when no
    /// entry was created (validation, duplicate).
    pub async fn handle_start(&self, spec: WorkloadSpec) -> Result<WorkloadEntry> {
        if let Err(reason) = validate_spec(&spec, &self.inner.runtime_class) {
            debug!(workload_id = %spec.id, %reason, "rejected workload spec");
            return Err(AgentError::Validation(reason));
        }

        self.inner.registry.register(spec.clone())?;
        let id = WorkloadId::new(spec.id.clone());
        info!(workload_id = %id, image = %spec.image, "accepted workload");

        let this = self.clone();
        let task_id = id.clone();
        let provision = tokio::spawn(async move { this.provision(task_id, spec).await });
        match provision.await {
            Ok(result) => result,
            Err(e) => {
                error!(workload_id = %id, error = %e, "zone provisioning task aborted");
                let reason = format!("zone provisioning task aborted: {}", e);
                self.inner
                    .registry
                    .transition(&id, WorkloadState::Failed, None, Some(reason))
                    .map_err(AgentError::from)
            }
        }
    }

    async fn provision(&self, id: WorkloadId, spec: WorkloadSpec) -> Result<WorkloadEntry> {
        let _flight = self.inner.flights.acquire(&id).await;

        let entry = match self.inner.runtime.create_zone(&spec).await {
            Ok(handle) => {
                info!(
                    workload_id = %id,
                    sandbox_id = %handle.sandbox_id,
                    container_id = %handle.container_id,
                    "zone running"
                );
                self.inner.registry.transition(&id, WorkloadState::Running, Some(handle), None)
            }
            Err(e) => {
                warn!(workload_id = %id, error = %e, "zone creation failed");
                self.inner.registry.transition(&id, WorkloadState::Failed, None, Some(e.to_string()))
            }
        };

        entry.map_err(|e| {
            error!(workload_id = %id, error = %e, "registry refused provisioning outcome");
            AgentError::from(e)
        })
    }

    /// Reports a workload's state, asking the backend only when it is `Running`.
    pub async fn handle_get_status(&self, id: &WorkloadId) -> Result<StatusReport> {
        let entry = self.inner.registry.get(id)?;
        if entry.state != WorkloadState::Running {
            return Ok(StatusReport::current(entry));
        }

        let _flight = self.inner.flights.acquire(id).await;

        // The entry may have moved on while we waited for the flight.
        let entry = self.inner.registry.get(id)?;
        if entry.state != WorkloadState::Running {
            return Ok(StatusReport::current(entry));
        }
        let Some(handle) = entry.handle.clone() else {
            error!(workload_id = %id, "running workload has no runtime handle");
            return Ok(StatusReport::current(entry));
        };

        match self.inner.runtime.query_status(&handle).await {
            Ok(observation) if observation.state.is_terminal() => {
                info!(workload_id = %id, state = %observation.state, "workload finished");
                let entry = self.inner.registry.transition(id, observation.state, None, observation.detail)?;
                Ok(StatusReport::current(entry))
            }
            Ok(observation) => {
                debug!(workload_id = %id, observed = %observation.state, "workload still active");
                Ok(StatusReport::current(entry))
            }
            Err(e) => {
                warn!(workload_id = %id, error = %e, "status query failed, reporting last known state");
                Ok(StatusReport { entry, query_error: Some(e.into()) })
            }
        }
    }
}
