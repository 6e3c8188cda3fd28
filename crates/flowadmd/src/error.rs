//! Error types for flowadmd

use thiserror::Error;

/// Flow admission daemon errors
#[derive(Error, Debug)]
pub enum FlowAdmError {
    /// Gateway call did not complete (RPC timeout, connection down)
    #[error("device unreachable: {0}")]
    DeviceUnreachable(String),

    /// Digest record field count or width does not match the declared layout
    #[error("malformed digest: {0}")]
    MalformedDigest(String),

    /// Policy parameters violate the ramp invariant
    #[error("invalid policy parameters: {0}")]
    InvalidParams(String),

    /// Digest subscription could not be established or the feed closed
    #[error("telemetry channel error: {0}")]
    ChannelError(String),

    /// Configuration file error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for flowadmd operations
pub type Result<T> = std::result::Result<T, FlowAdmError>;
