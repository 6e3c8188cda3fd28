//! Policy store: per-flow admission policy and its device rules
//!
//! Installation order matters: parameters are validated before any gateway
//! call, the prior rule for the flow (if any) is removed, the new rule is
//! installed, and only then is the warm-up step register written. Re-install
//! for the same flow is last-writer-wins with no duplicate rules.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::device::DeviceGateway;
use crate::error::{FlowAdmError, Result};
use crate::tables::{FLOW_CONTROL_ACTION, RATE_LIMIT_WIRE, RULE_TABLE, WARM_UP_STEP_REGISTER};
use crate::types::{FlowId, PolicyParams, Strategy};
use crate::warm_up::ms_per_threshold_step;

/// Policy currently in effect for a flow
#[derive(Clone, Debug)]
pub struct InstalledPolicy {
    pub match_key: String,
    pub strategy: Strategy,
    pub params: PolicyParams,
}

/// Owns the FlowId -> policy mapping for the controller's lifetime
pub struct PolicyStore {
    gateway: Arc<dyn DeviceGateway>,
    policies: HashMap<FlowId, InstalledPolicy>,
}

impl PolicyStore {
    pub fn new(gateway: Arc<dyn DeviceGateway>) -> Self {
        Self {
            gateway,
            policies: HashMap::new(),
        }
    }

    /// Installs or replaces the admission policy for a flow.
    ///
    /// The device rule carries the ordered action-parameter tuple
    /// `[flow_id, strategy, rate_limit, threshold, warm_up_period_ms,
    /// warm_up_factor, base_rate]`. Only `WarmUp` policies compute and push
    /// the step register; `Direct` never touches it.
    pub async fn install_policy(
        &mut self,
        flow_id: FlowId,
        match_key: &str,
        strategy: Strategy,
        params: PolicyParams,
    ) -> Result<()> {
        // Validate before any device call.
        let step = match strategy {
            Strategy::Direct => {
                if params.threshold == 0 {
                    return Err(FlowAdmError::InvalidParams(
                        "threshold must be positive".to_string(),
                    ));
                }
                None
            }
            Strategy::WarmUp => Some(ms_per_threshold_step(
                params.threshold,
                params.warm_up_period_ms,
                params.warm_up_factor,
            )?),
        };

        if let Some(prev) = self.policies.get(&flow_id) {
            self.gateway
                .remove_table_entry(RULE_TABLE, &prev.match_key)
                .await?;
        }

        let action_params = [
            u64::from(flow_id),
            strategy.wire_code(),
            RATE_LIMIT_WIRE,
            params.threshold,
            params.warm_up_period_ms,
            u64::from(params.warm_up_factor),
            params.base_rate,
        ];
        self.gateway
            .add_table_entry(RULE_TABLE, FLOW_CONTROL_ACTION, match_key, &action_params)
            .await?;

        if let Some(step) = step {
            self.gateway
                .write_register(WARM_UP_STEP_REGISTER, flow_id, step)
                .await?;
            info!(
                "installed {} policy for flow {} ({}): threshold={} step_ms={}",
                strategy.as_str(),
                flow_id,
                match_key,
                params.threshold,
                step
            );
        } else {
            info!(
                "installed {} policy for flow {} ({}): threshold={}",
                strategy.as_str(),
                flow_id,
                match_key,
                params.threshold
            );
        }

        self.policies.insert(
            flow_id,
            InstalledPolicy {
                match_key: match_key.to_string(),
                strategy,
                params,
            },
        );
        Ok(())
    }

    /// Policy currently installed for a flow, if any
    pub fn policy(&self, flow_id: FlowId) -> Option<&InstalledPolicy> {
        self.policies.get(&flow_id)
    }

    /// Number of flows with an installed policy
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
