//! Flow admission controller
//!
//! Wires the device gateway, the policy store and the telemetry loops.
//! Bootstrap replays the device's mechanical startup sequence: full state
//! reset, drop-by-default on both forwarding tables, the alarm clone
//! session when a CPU port exists, and a clean rule table.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::device::DeviceGateway;
use crate::error::Result;
use crate::policy::PolicyStore;
use crate::tables::{
    ALARM_CLONE_SESSION, DROP_ACTION, IPV4_DPI_TABLE, IPV4_LPM_TABLE, RULE_TABLE,
};
use crate::telemetry::TelemetryLoop;
use crate::types::{FlowId, PolicyParams, Strategy};

pub struct FlowController {
    gateway: Arc<dyn DeviceGateway>,
    policies: PolicyStore,
    cpu_port: Option<u32>,
}

impl FlowController {
    pub fn new(gateway: Arc<dyn DeviceGateway>, cpu_port: Option<u32>) -> Self {
        let policies = PolicyStore::new(gateway.clone());
        Self {
            gateway,
            policies,
            cpu_port,
        }
    }

    /// Resets the device and installs the baseline configuration
    pub async fn bootstrap(&self) -> Result<()> {
        self.gateway.reset_device_state().await?;
        self.gateway
            .set_default_action(IPV4_LPM_TABLE, DROP_ACTION, &[])
            .await?;
        self.gateway
            .set_default_action(IPV4_DPI_TABLE, DROP_ACTION, &[])
            .await?;
        if let Some(port) = self.cpu_port {
            self.gateway
                .create_clone_session(ALARM_CLONE_SESSION, &[port])
                .await?;
        }
        self.gateway.clear_table(RULE_TABLE).await?;
        info!("device bootstrap complete (cpu_port={:?})", self.cpu_port);
        Ok(())
    }

    /// Installs or replaces the policy for a flow (last-writer-wins)
    pub async fn install_policy(
        &mut self,
        flow_id: FlowId,
        match_key: &str,
        strategy: Strategy,
        params: PolicyParams,
    ) -> Result<()> {
        self.policies
            .install_policy(flow_id, match_key, strategy, params)
            .await
    }

    /// Builds the telemetry loop for a flow without spawning it
    pub fn telemetry_loop(
        &self,
        flow_id: FlowId,
        strategy: Strategy,
        shutdown: watch::Receiver<bool>,
    ) -> TelemetryLoop {
        TelemetryLoop::new(self.gateway.clone(), flow_id, strategy, shutdown)
    }

    /// Spawns the telemetry loop for a flow.
    ///
    /// A loop error terminates only that flow's loop; it is logged here and
    /// not propagated to the other flows.
    pub fn spawn_telemetry(
        &self,
        flow_id: FlowId,
        strategy: Strategy,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let telemetry = self.telemetry_loop(flow_id, strategy, shutdown);
        tokio::spawn(async move {
            if let Err(e) = telemetry.run().await {
                error!("flow {}: telemetry loop terminated: {}", flow_id, e);
            }
        })
    }

    pub fn policy_store(&self) -> &PolicyStore {
        &self.policies
    }
}
