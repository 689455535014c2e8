//! # CRI-style Backend Contract
//!
//! The subset of the container runtime interface the adapter drives. Calls
//! are named after their CRI counterparts; states are carried as the raw
//! strings the backend reports so that unexpected values survive long enough
//! to be mapped explicitly.

use serde::Deserialize;
use serde::Serialize;

use crate::workload::WorkloadSpec;

pub const CONTAINER_CREATED: &str = "CONTAINER_CREATED";
pub const CONTAINER_RUNNING: &str = "CONTAINER_RUNNING";
pub const CONTAINER_EXITED: &str = "CONTAINER_EXITED";
pub const CONTAINER_UNKNOWN: &str = "CONTAINER_UNKNOWN";

pub const SANDBOX_READY: &str = "SANDBOX_READY";
pub const SANDBOX_NOTREADY: &str = "SANDBOX_NOTREADY";

/// CFS period used when a CPU limit is requested, in microseconds.
pub const CPU_PERIOD_US: u64 = 100_000;

const BYTES_PER_MIB: u64 = 1024 * 1024;

/// Errors reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The backend could not be reached.
    Unavailable(String),
    /// The backend refused or failed the call.
    Rejected { code: String, message: String },
    /// The backend answered with something that is not a valid reply.
    Malformed(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "backend unavailable: {}", msg),
            Self::Rejected { code, message } => write!(f, "backend rejected call ({}): {}", code, message),
            Self::Malformed(msg) => write!(f, "malformed backend reply: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

pub type Result<T> = std::result::Result<T, BackendError>;

/// Linux resource limits; zero means "no limit".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinuxResources {
    pub memory_limit_bytes: u64,
    pub cpu_period: u64,
    pub cpu_quota: u64,
}

impl LinuxResources {
    pub fn for_workload(spec: &WorkloadSpec) -> Self {
        let (cpu_period, cpu_quota) = match spec.cpu_millicores {
            0 => (0, 0),
            millis => (CPU_PERIOD_US, millis.saturating_mul(CPU_PERIOD_US) / 1000),
        };
        Self {
            memory_limit_bytes: spec.memory_mb.saturating_mul(BYTES_PER_MIB),
            cpu_period,
            cpu_quota,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Sandbox name; the workload id.
    pub name: String,
    /// CRI runtime handler, i.e. the workload's runtime class.
    pub runtime_handler: String,
    pub resources: LinuxResources,
}

impl SandboxConfig {
    pub fn for_workload(spec: &WorkloadSpec) -> Self {
        Self {
            name: spec.id.clone(),
            runtime_handler: spec.runtime_class.clone(),
            resources: LinuxResources::for_workload(spec),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerConfig {
    pub name: String,
    pub image: String,
    pub resources: LinuxResources,
}

impl ContainerConfig {
    pub fn for_workload(spec: &WorkloadSpec) -> Self {
        Self {
            name: spec.id.clone(),
            image: spec.image.clone(),
            resources: LinuxResources::for_workload(spec),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub state: String,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ContainerStatus {
    pub fn new(state: impl Into<String>) -> Self {
        Self { state: state.into(), exit_code: None, reason: None, message: None }
    }

    pub fn exited(exit_code: i32) -> Self {
        Self { exit_code: Some(exit_code), ..Self::new(CONTAINER_EXITED) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxStatus {
    pub state: String,
}

/// Lifecycle calls an isolation backend must answer.
///
/// This trait is designed to be object-safe, but the adapter takes it by value.
#[async_trait::async_trait]
pub trait CriBackend: Send + Sync + 'static {
    /// Returns the new sandbox id.
    async fn run_pod_sandbox(&self, config: &SandboxConfig) -> Result<String>;

    /// Returns the new container id.
    async fn create_container(&self, sandbox_id: &str, config: &ContainerConfig) -> Result<String>;

    async fn start_container(&self, container_id: &str) -> Result<()>;

    async fn container_status(&self, container_id: &str) -> Result<ContainerStatus>;

    async fn pod_sandbox_status(&self, sandbox_id: &str) -> Result<SandboxStatus>;
}

/// Lets a caller keep a handle on a backend it hands to the adapter.
#[async_trait::async_trait]
impl<B: CriBackend> CriBackend for std::sync::Arc<B> {
    async fn run_pod_sandbox(&self, config: &SandboxConfig) -> Result<String> {
        (**self).run_pod_sandbox(config).await
    }

    async fn create_container(&self, sandbox_id: &str, config: &ContainerConfig) -> Result<String> {
        (**self).create_container(sandbox_id, config).await
    }

    async fn start_container(&self, container_id: &str) -> Result<()> {
        (**self).start_container(container_id).await
    }

    async fn container_status(&self, container_id: &str) -> Result<ContainerStatus> {
        (**self).container_status(container_id).await
    }

    async fn pod_sandbox_status(&self, sandbox_id: &str) -> Result<SandboxStatus> {
        (**self).pod_sandbox_status(sandbox_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resources_from_spec() {
        let spec = WorkloadSpec::new("wl-1", "x", "edera-zone")
            .with_memory_mb(512)
            .with_cpu_millicores(500);
        let res = LinuxResources::for_workload(&spec);

        assert_eq!(res.memory_limit_bytes, 512 * 1024 * 1024);
        assert_eq!(res.cpu_period, 100_000);
        assert_eq!(res.cpu_quota, 50_000);
    }

    #[test]
    fn test_zero_means_unlimited() {
        let spec = WorkloadSpec::new("wl-1", "x", "edera-zone");
        assert_eq!(LinuxResources::for_workload(&spec), LinuxResources::default());
    }

    #[test]
    fn test_sandbox_config_uses_runtime_class_as_handler() {
        let spec = WorkloadSpec::new("wl-1", "x", "edera-zone");
        let config = SandboxConfig::for_workload(&spec);
        assert_eq!(config.name, "wl-1");
        assert_eq!(config.runtime_handler, "edera-zone");
    }
}
