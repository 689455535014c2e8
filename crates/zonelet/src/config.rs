//! # Agent Configuration
//!
//! Command-line flags with environment fallbacks, resolved into an
//! [`AgentConfig`] before anything is bound or dialed.

use std::fmt;
use std::net::SocketAddr;

use clap::Parser;
use clap::ValueEnum;

use crate::transport::Endpoint;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:7878";
pub const DEFAULT_RUNTIME_CLASS: &str = "edera-zone";
pub const DEFAULT_LOG_FILTER: &str = "zonelet=info";

#[derive(Parser, Debug, Clone)]
#[command(name = "zonelet")]
#[command(about = "Node agent that provisions workloads as isolated zones")]
#[command(version)]
pub struct Args {
    /// Address the control-plane listener binds to
    #[arg(long, env = "ZONELET_LISTEN", default_value = DEFAULT_LISTEN)]
    pub listen: SocketAddr,

    /// Which container-runtime backend to drive
    #[arg(long, env = "ZONELET_BACKEND", value_enum, default_value_t = BackendKind::Proxy)]
    pub backend: BackendKind,

    /// Local CRI proxy endpoint (unix:///path or tcp://host:port), required for the proxy backend
    #[arg(long, env = "ZONELET_PROXY_ENDPOINT")]
    pub proxy_endpoint: Option<String>,

    /// The only runtime class this agent accepts
    #[arg(long, env = "ZONELET_RUNTIME_CLASS", default_value = DEFAULT_RUNTIME_CLASS)]
    pub runtime_class: String,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "ZONELET_LOG", default_value = DEFAULT_LOG_FILTER)]
    pub log_filter: String,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Talk to a local CRI proxy over a socket
    Proxy,
    /// In-process backend with scripted behavior, for development
    Simulated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    Proxy { endpoint: Endpoint },
    Simulated,
}

impl fmt::Display for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proxy { endpoint } => write!(f, "proxy at {}", endpoint),
            Self::Simulated => write!(f, "simulated"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingProxyEndpoint,
    InvalidEndpoint(String),
    EmptyRuntimeClass,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingProxyEndpoint => {
                write!(f, "the proxy backend needs --proxy-endpoint (or ZONELET_PROXY_ENDPOINT)")
            }
            Self::InvalidEndpoint(msg) => write!(f, "invalid proxy endpoint: {}", msg),
            Self::EmptyRuntimeClass => write!(f, "runtime class must not be empty"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub listen: SocketAddr,
    pub backend: BackendConfig,
    pub runtime_class: String,
    pub log_filter: String,
}

impl AgentConfig {
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let runtime_class = args.runtime_class.trim().to_string();
        if runtime_class.is_empty() {
            return Err(ConfigError::EmptyRuntimeClass);
        }

        let backend = match args.backend {
            BackendKind::Simulated => BackendConfig::Simulated,
            BackendKind::Proxy => {
                let raw = args.proxy_endpoint.ok_or(ConfigError::MissingProxyEndpoint)?;
                let endpoint = Endpoint::parse(&raw).map_err(ConfigError::InvalidEndpoint)?;
                BackendConfig::Proxy { endpoint }
            }
        };

        Ok(Self {
            listen: args.listen,
            backend,
            runtime_class,
            log_filter: args.log_filter,
        })
    }
}
