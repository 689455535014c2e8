//! # Proxy Backend
//!
//! Sends CRI-shaped calls to a local proxy process that owns the real
//! connection to the isolation host.
//!
//! ## Wire format
//!
//! One JSON object per line in each direction:
//!
//! - Call: `{"method":"RunPodSandbox","params":{"config":{...}}}`
//! - Reply: `{"ok":{"pod_sandbox_id":"..."}}` or `{"err":{"code":"...","message":"..."}}`
//!
//! A transport failure means the proxy is unreachable; an `err` reply means it
//! was reached and refused; anything unparseable is a malformed reply.

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::trace;

use crate::runtime::cri::BackendError;
use crate::runtime::cri::ContainerConfig;
use crate::runtime::cri::ContainerStatus;
use crate::runtime::cri::CriBackend;
use crate::runtime::cri::Result;
use crate::runtime::cri::SandboxConfig;
use crate::runtime::cri::SandboxStatus;
use crate::transport::Transport;

#[derive(Serialize)]
struct ProxyCall<'a> {
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum ProxyReply<T> {
    Ok(T),
    Err(ProxyFailure),
}

#[derive(Deserialize)]
struct ProxyFailure {
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct RunPodSandboxReply {
    pod_sandbox_id: String,
}

#[derive(Deserialize)]
struct CreateContainerReply {
    container_id: String,
}

#[derive(Deserialize)]
struct StartContainerReply {}

#[derive(Deserialize)]
struct ContainerStatusReply {
    status: ContainerStatus,
}

#[derive(Deserialize)]
struct PodSandboxStatusReply {
    status: SandboxStatus,
}

/// CRI backend reached through a local proxy.
pub struct ProxyBackend {
    transport: Arc<dyn Transport>,
}

impl ProxyBackend {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    async fn call<R: DeserializeOwned>(&self, method: &str, params: serde_json::Value) -> Result<R> {
        let mut payload = serde_json::to_vec(&ProxyCall { method, params })
            .map_err(|e| BackendError::Malformed(format!("failed to encode {}: {}", method, e)))?;
        payload.push(b'\n');

        trace!(method, "calling runtime proxy");
        let reply = self
            .transport
            .call(&payload)
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        let reply: ProxyReply<R> = serde_json::from_slice(&reply)
            .map_err(|e| BackendError::Malformed(format!("{} reply: {}", method, e)))?;
        match reply {
            ProxyReply::Ok(value) => Ok(value),
            ProxyReply::Err(failure) => Err(BackendError::Rejected {
                code: failure.code,
                message: failure.message,
            }),
        }
    }
}

#[async_trait::async_trait]
impl CriBackend for ProxyBackend {
    async fn run_pod_sandbox(&self, config: &SandboxConfig) -> Result<String> {
        let reply: RunPodSandboxReply = self.call("RunPodSandbox", json!({ "config": config })).await?;
        Ok(reply.pod_sandbox_id)
    }

    async fn create_container(&self, sandbox_id: &str, config: &ContainerConfig) -> Result<String> {
        let params = json!({ "pod_sandbox_id": sandbox_id, "config": config });
        let reply: CreateContainerReply = self.call("CreateContainer", params).await?;
        Ok(reply.container_id)
    }

    async fn start_container(&self, container_id: &str) -> Result<()> {
        let _: StartContainerReply = self
            .call("StartContainer", json!({ "container_id": container_id }))
            .await?;
        Ok(())
    }

    async fn container_status(&self, container_id: &str) -> Result<ContainerStatus> {
        let reply: ContainerStatusReply = self
            .call("ContainerStatus", json!({ "container_id": container_id }))
            .await?;
        Ok(reply.status)
    }

    async fn pod_sandbox_status(&self, sandbox_id: &str) -> Result<SandboxStatus> {
        let reply: PodSandboxStatusReply = self
            .call("PodSandboxStatus", json!({ "pod_sandbox_id": sandbox_id }))
            .await?;
        Ok(reply.status)
    }
}
