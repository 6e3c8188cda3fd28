//! # flowadmd - Adaptive Flow Admission Control Daemon
//!
//! Control-plane agent for a programmable forwarding device. Per monitored
//! flow it installs an admission policy (pass/block decided in the data
//! plane), pushes the warm-up ramp constant to the device, and runs a
//! telemetry loop that decodes asynchronously pushed digest records into
//! pass/block counter events.
//!
//! ## Strategies
//! - `Direct`: static admission threshold, no ramp
//! - `WarmUp`: the device raises its local threshold from
//!   `threshold - (threshold >> warm_up_factor)` to `threshold`, one unit
//!   every `ms_per_threshold_step` milliseconds, then behaves like `Direct`
//!
//! ## Components
//! - [`device`]: narrow gateway trait to the forwarding device
//! - [`policy`]: per-flow policy store and rule installation
//! - [`warm_up`]: ramp step derivation and validation
//! - [`digest`]: declared-layout decoding of digest records
//! - [`telemetry`]: per-flow receive loops with cancellation

pub mod config;
pub mod controller;
pub mod device;
pub mod digest;
pub mod error;
pub mod policy;
pub mod tables;
pub mod telemetry;
pub mod types;
pub mod warm_up;

pub use config::{load_config, DaemonConfig, DeviceConfig, FlowConfig, DEFAULT_CONFIG_PATH};
pub use controller::FlowController;
pub use device::{DeviceGateway, DigestConfig, InMemoryGateway, TableEntry};
pub use digest::{DigestEntry, DigestLayout, DigestRecord, COUNT_LAYOUT, WARM_UP_LAYOUT};
pub use error::{FlowAdmError, Result};
pub use policy::{InstalledPolicy, PolicyStore};
pub use telemetry::TelemetryLoop;
pub use types::{DigestEvent, FlowId, PolicyParams, Strategy};
pub use warm_up::{ms_per_threshold_step, ramp_start};
