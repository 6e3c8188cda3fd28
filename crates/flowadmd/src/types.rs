//! Core domain types for flowadmd

use serde::{Deserialize, Serialize};

use crate::tables::{COUNT_DIGEST, WARM_UP_DIGEST};

/// Identifier of a monitored flow, unique across the device's rule table.
/// Assigned by the operator when a policy is installed.
pub type FlowId = u32;

/// Admission strategy for a monitored flow
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Static threshold, no ramp
    Direct,
    /// Threshold rises from a reduced start to the target over a period
    WarmUp,
}

impl Strategy {
    /// Wire code understood by the forwarding-plane program
    pub fn wire_code(&self) -> u64 {
        match self {
            Strategy::Direct => 1,
            Strategy::WarmUp => 2,
        }
    }

    /// Display name used in telemetry log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Direct => "Direct",
            Strategy::WarmUp => "WarmUp",
        }
    }

    /// Digest channel this strategy reports on
    pub fn digest_name(&self) -> &'static str {
        match self {
            Strategy::Direct => COUNT_DIGEST,
            Strategy::WarmUp => WARM_UP_DIGEST,
        }
    }
}

/// Per-flow policy parameters
///
/// `threshold` is the target admission threshold and must be positive.
/// `warm_up_period_ms` and `warm_up_factor` are only meaningful for
/// [`Strategy::WarmUp`]; the ramp starts at
/// `threshold - (threshold >> warm_up_factor)`. `base_rate` is passed
/// through to the device unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyParams {
    pub threshold: u64,
    pub warm_up_period_ms: u64,
    pub warm_up_factor: u32,
    pub base_rate: u64,
}

/// Decoded telemetry event, consumed immediately and never retained
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DigestEvent {
    /// Counter report from a Direct flow
    Count { passed: u64, blocked: u64 },
    /// Counter report from a WarmUp flow, including the device-local threshold
    Threshold {
        threshold: u64,
        passed: u64,
        blocked: u64,
    },
}
