//! Workload data that travels on the wire.

use serde::Deserialize;
use serde::Serialize;

/// A declarative description of one workload, as submitted by the control plane.
///
/// Immutable once accepted by an agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadSpec {
    /// Unique within one agent's registry.
    pub id: String,
    /// OCI-style image reference. Opaque to the agent.
    pub image: String,
    /// Selects the isolation backend.
    pub runtime_class: String,
    /// Memory limit in MiB. `0` means unspecified.
    #[serde(default)]
    pub memory_mb: u64,
    /// CPU limit in millicores. `0` means unspecified.
    #[serde(default)]
    pub cpu_millicores: u64,
}

impl WorkloadSpec {
    pub fn new(
        id: impl Into<String>,
        image: impl Into<String>,
        runtime_class: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            image: image.into(),
            runtime_class: runtime_class.into(),
            memory_mb: 0,
            cpu_millicores: 0,
        }
    }

    pub fn with_memory_mb(mut self, memory_mb: u64) -> Self {
        self.memory_mb = memory_mb;
        self
    }

    pub fn with_cpu_millicores(mut self, cpu_millicores: u64) -> Self {
        self.cpu_millicores = cpu_millicores;
        self
    }
}

/// Lifecycle state of a workload as seen by the agent.
///
/// `Pending -> Running -> {Succeeded, Failed}`, or `Pending -> Failed` when
/// zone creation fails. `Succeeded` and `Failed` are terminal.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkloadState {
    Pending,
    Running,
    Failed,
    Succeeded,
}

impl WorkloadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Succeeded)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Staying in the same non-terminal state is not a transition and is
    /// rejected here; callers skip no-op updates before asking.
    pub fn can_transition_to(self, next: WorkloadState) -> bool {
        use WorkloadState::*;
        matches!(
            (self, next),
            (Pending, Running) | (Pending, Failed) | (Running, Succeeded) | (Running, Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Failed => "Failed",
            Self::Succeeded => "Succeeded",
        }
    }
}

impl std::fmt::Display for WorkloadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
