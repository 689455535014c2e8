//! Zonelet agent entry point.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use zonelet::AgentConfig;
use zonelet::Dispatcher;
use zonelet::Listener;
use zonelet::Registry;
use zonelet::config::Args;
use zonelet::runtime;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = AgentConfig::from_args(args).context("invalid configuration")?;

    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_filter))?;
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    tracing::info!(
        listen = %config.listen,
        backend = %config.backend,
        runtime_class = %config.runtime_class,
        "starting zonelet"
    );

    let registry = Arc::new(Registry::new());
    let runtime = runtime::build(&config.backend);
    let dispatcher = Dispatcher::new(registry, runtime, config.runtime_class.clone());

    let listener = Listener::bind(config.listen, dispatcher)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;

    listener
        .serve_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to wait for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("zonelet stopped");
    Ok(())
}
