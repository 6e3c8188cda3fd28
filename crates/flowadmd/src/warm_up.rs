//! Warm-up ramp step derivation
//!
//! The ramp itself executes inside the forwarding device: starting at
//! `threshold - (threshold >> warm_up_factor)`, the device raises its local
//! threshold by one unit every `ms_per_threshold_step` milliseconds until it
//! reaches `threshold`, then holds steady and admits with the Direct rule.
//! This module only derives and validates that constant; it is computed once
//! at policy installation and never mutated mid-ramp.

use crate::error::{FlowAdmError, Result};

/// Starting threshold of the device-side ramp.
///
/// Callers must validate the parameters with [`ms_per_threshold_step`]
/// first; an oversized factor shifts to zero here rather than panicking.
pub fn ramp_start(threshold: u64, warm_up_factor: u32) -> u64 {
    threshold - threshold.checked_shr(warm_up_factor).unwrap_or(0)
}

/// Derives the milliseconds the device waits between one-unit threshold
/// increments.
///
/// Requires `threshold > 0` and a `warm_up_factor` small enough that
/// `threshold >> warm_up_factor < threshold`, so the ramp covers at least
/// one unit. A `warm_up_period_ms` of 0 is valid and yields 0: the ramp is
/// considered complete immediately and the device admits at the full
/// threshold from the start.
pub fn ms_per_threshold_step(
    threshold: u64,
    warm_up_period_ms: u64,
    warm_up_factor: u32,
) -> Result<u64> {
    if threshold == 0 {
        return Err(FlowAdmError::InvalidParams(
            "threshold must be positive".to_string(),
        ));
    }
    if warm_up_factor >= u64::BITS {
        return Err(FlowAdmError::InvalidParams(format!(
            "warm_up_factor {} exceeds threshold bit width",
            warm_up_factor
        )));
    }

    let reduced = threshold >> warm_up_factor;
    if reduced >= threshold {
        return Err(FlowAdmError::InvalidParams(format!(
            "warm_up_factor {} leaves no ramp: threshold {} >> {} == {}",
            warm_up_factor, threshold, warm_up_factor, reduced
        )));
    }

    Ok(warm_up_period_ms / (threshold - reduced))
}
