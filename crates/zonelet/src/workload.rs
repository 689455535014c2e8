//! # Workload Model
//!
//! Registry records and the identifiers that key them. The spec and state
//! enums themselves live in `zonewire` because they travel on the wire.

pub use zonewire::WorkloadSpec;
pub use zonewire::WorkloadState;

/// Strong type for workload identifiers.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct WorkloadId(String);

impl WorkloadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkloadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkloadId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for WorkloadId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Backend identifiers for a zone that was fully created.
///
/// Opaque to everything except the runtime adapter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeHandle {
    pub sandbox_id: String,
    pub container_id: String,
}

/// Whatever identifiers a failed zone creation managed to obtain.
///
/// Diagnostic only; nothing retries or cleans up based on it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PartialHandle {
    pub sandbox_id: Option<String>,
    pub container_id: Option<String>,
}

impl PartialHandle {
    pub fn is_empty(&self) -> bool {
        self.sandbox_id.is_none() && self.container_id.is_none()
    }
}

impl std::fmt::Display for PartialHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.sandbox_id, &self.container_id) {
            (None, None) => write!(f, "no handle"),
            (Some(sb), None) => write!(f, "sandbox {}", sb),
            (None, Some(ctr)) => write!(f, "container {}", ctr),
            (Some(sb), Some(ctr)) => write!(f, "sandbox {}, container {}", sb, ctr),
        }
    }
}

/// One registry record per accepted workload id.
///
/// # Invariants
/// - `handle` is `None` while `Pending`; once set it is never replaced.
/// - `last_error` is `Some` (and non-empty) exactly when `state` is `Failed`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkloadEntry {
    pub spec: WorkloadSpec,
    pub handle: Option<RuntimeHandle>,
    pub state: WorkloadState,
    pub last_error: Option<String>,
}

impl WorkloadEntry {
    pub(crate) fn pending(spec: WorkloadSpec) -> Self {
        Self {
            spec,
            handle: None,
            state: WorkloadState::Pending,
            last_error: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }
}

/// Checks a spec before it is allowed anywhere near the registry.
///
/// Returns a human-readable reason on rejection.
pub fn validate_spec(spec: &WorkloadSpec, accepted_runtime_class: &str) -> Result<(), String> {
    if spec.id.is_empty() {
        return Err("workload id must not be empty".into());
    }
    if spec.id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(format!("workload id {:?} contains whitespace or control characters", spec.id));
    }
    if spec.image.is_empty() {
        return Err(format!("workload {} has an empty image reference", spec.id));
    }
    if spec.runtime_class != accepted_runtime_class {
        return Err(format!(
            "unsupported runtime class {:?}, this agent only accepts {:?}",
            spec.runtime_class, accepted_runtime_class
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLASS: &str = "edera-zone";

    #[test]
    fn test_accepts_well_formed_spec() {
        let spec = WorkloadSpec::new("wl-1", "x", CLASS).with_memory_mb(512);
        assert!(validate_spec(&spec, CLASS).is_ok());
    }

    #[test]
    fn test_rejects_foreign_runtime_class() {
        let spec = WorkloadSpec::new("wl-1", "x", "runc");
        let reason = validate_spec(&spec, CLASS).unwrap_err();
        assert!(reason.contains("runc"));
    }

    #[test]
    fn test_rejects_empty_fields() {
        assert!(validate_spec(&WorkloadSpec::new("", "x", CLASS), CLASS).is_err());
        assert!(validate_spec(&WorkloadSpec::new("wl-1", "", CLASS), CLASS).is_err());
        assert!(validate_spec(&WorkloadSpec::new("wl 1", "x", CLASS), CLASS).is_err());
    }

    #[test]
    fn test_image_is_only_checked_for_presence() {
        assert!(validate_spec(&WorkloadSpec::new("wl-1", " ", CLASS), CLASS).is_ok());
    }

    #[test]
    fn test_partial_handle_display() {
        let partial = PartialHandle { sandbox_id: Some("sb-1".into()), container_id: None };
        assert_eq!(partial.to_string(), "sandbox sb-1");
        assert!(!partial.is_empty());
        assert!(PartialHandle::default().is_empty());
    }
}
