//! flowadmd - Adaptive Flow Admission Control Daemon
//!
//! Entry point: loads the configuration, bootstraps the device, installs
//! the configured policies and runs one telemetry loop per flow until
//! SIGINT/SIGTERM.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use flowadmd::{
    load_config, DaemonConfig, DeviceGateway, FlowController, InMemoryGateway,
    DEFAULT_CONFIG_PATH,
};

/// Initializes tracing/logging subsystem
fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    info!("--- Starting flowadmd (Rust) ---");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    info!("Loading configuration: {}", config_path);

    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration {}: {}", config_path, e);
            return ExitCode::FAILURE;
        }
    };

    match run_daemon(config).await {
        Ok(()) => {
            info!("flowadmd exiting");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("flowadmd failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_daemon(config: DaemonConfig) -> anyhow::Result<()> {
    // In-memory device backend; a P4Runtime-backed gateway implements the
    // same trait. The digest feed handle stays open for the daemon's
    // lifetime so the loops block instead of seeing a closed channel.
    let (gateway, _digest_feed) = InMemoryGateway::new();
    let gateway: Arc<dyn DeviceGateway> = Arc::new(gateway);

    let mut controller = FlowController::new(gateway, config.device.cpu_port);
    controller
        .bootstrap()
        .await
        .with_context(|| format!("bootstrapping device {}", config.device.name))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::with_capacity(config.flows.len());

    for flow in &config.flows {
        controller
            .install_policy(flow.flow_id, &flow.match_key, flow.strategy, flow.params())
            .await
            .with_context(|| format!("installing policy for flow {}", flow.flow_id))?;
        tasks.push(controller.spawn_telemetry(flow.flow_id, flow.strategy, shutdown_rx.clone()));
    }
    info!(
        "{} telemetry loop(s) running on device {}",
        tasks.len(),
        config.device.name
    );

    signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("Received shutdown signal");
    let _ = shutdown_tx.send(true);

    for task in tasks {
        let _ = task.await;
    }

    Ok(())
}
