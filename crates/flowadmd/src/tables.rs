//! Device table, action, register and digest names used by flowadmd
//!
//! These names are fixed by the forwarding-plane program; the controller
//! never discovers them dynamically.

/// Admission rule table, keyed by destination address
pub const RULE_TABLE: &str = "rule_tbl";

/// Action installed on [`RULE_TABLE`] entries
pub const FLOW_CONTROL_ACTION: &str = "flow_control";

/// Plain forwarding table, drop by default at bootstrap
pub const IPV4_LPM_TABLE: &str = "ipv4_lpm";

/// Inspection forwarding table, drop by default at bootstrap
pub const IPV4_DPI_TABLE: &str = "ipv4_dpi_lpm";

/// Default action installed on the two forwarding tables
pub const DROP_ACTION: &str = "drop";

/// Register holding milliseconds-per-threshold-step, indexed by flow id
pub const WARM_UP_STEP_REGISTER: &str = "warm_up_ms_per_threshold";

/// Digest channel carrying pass/block counters (Direct strategy)
pub const COUNT_DIGEST: &str = "reported_data";

/// Digest channel carrying threshold plus counters (WarmUp strategy)
pub const WARM_UP_DIGEST: &str = "warm_up_data";

/// Clone session mirroring matched traffic to the CPU port
pub const ALARM_CLONE_SESSION: u32 = 321;

/// Fixed rate-limit action parameter, passed through unchanged
pub const RATE_LIMIT_WIRE: u64 = 1;
