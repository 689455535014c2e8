//! # Zonelet
//!
//! A node agent that accepts workload specs from a control plane and runs
//! each one as an isolated zone through a CRI-style container runtime.
//!
//! The pieces, outermost first:
//!
//! - [`listener`] accepts connections and decodes request lines.
//! - [`dispatch`] validates, registers, provisions and reconciles workloads.
//! - [`registry`] owns the per-workload state machine.
//! - [`runtime`] turns a spec into backend calls and backend answers into states.
//! - [`transport`] carries backend calls to a local proxy.

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub(crate) mod frame_io;
pub mod listener;
pub mod registry;
pub mod runtime;
pub mod single_flight;
pub mod transport;
pub mod workload;

pub use client::AgentClient;
pub use config::AgentConfig;
pub use config::BackendConfig;
pub use dispatch::Dispatcher;
pub use dispatch::StatusReport;
pub use error::AgentError;
pub use listener::Listener;
pub use registry::Registry;
pub use runtime::ZoneRuntime;
pub use workload::WorkloadEntry;
pub use workload::WorkloadId;
pub use workload::WorkloadSpec;
pub use workload::WorkloadState;
