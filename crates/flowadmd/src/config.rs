//! Daemon configuration file
//!
//! flowadmd reads one JSON file naming the device and the monitored flows.
//! Policy numbers are validated at install time, not at parse time, so a
//! config that parses can still be rejected by the policy store.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FlowAdmError, Result};
use crate::types::{FlowId, PolicyParams, Strategy};

/// Default configuration path, overridable via argv\[1\]
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sonic/flowadm_cfg.json";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device name, used only for logging
    pub name: String,
    /// CPU-facing port index, if the device has one
    #[serde(default)]
    pub cpu_port: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FlowConfig {
    pub flow_id: FlowId,
    /// Match key for the rule table (destination address)
    pub match_key: String,
    pub strategy: Strategy,
    pub threshold: u64,
    #[serde(default)]
    pub warm_up_period_ms: u64,
    #[serde(default)]
    pub warm_up_factor: u32,
    pub base_rate: u64,
}

impl FlowConfig {
    pub fn params(&self) -> PolicyParams {
        PolicyParams {
            threshold: self.threshold,
            warm_up_period_ms: self.warm_up_period_ms,
            warm_up_factor: self.warm_up_factor,
            base_rate: self.base_rate,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DaemonConfig {
    pub device: DeviceConfig,
    #[serde(default)]
    pub flows: Vec<FlowConfig>,
}

/// Loads and parses the daemon configuration
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<DaemonConfig> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text)
        .map_err(|e| FlowAdmError::Config(format!("{}: {}", path.display(), e)))
}
