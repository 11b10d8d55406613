//! # Filter Error Taxonomy
//!
//! Four failure classes, mirroring how they propagate:
//! - configuration errors are detected before any resource is committed
//! - pool exhaustion is transient, the caller may retry the frame
//! - driver errors during open unwind the whole session; during a frame
//!   they drop only that frame
//! - allocation failures unwind exactly like driver errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilterError {
    /// Incompatible formats or an unsupported filter/algorithm. Detected
    /// before resource commitment, never retryable.
    #[error("unsupported configuration: {0}")]
    Unsupported(String),

    /// No free output surface in the pool. Transient; the caller should
    /// throttle and resubmit the frame.
    #[error("output surface pool exhausted")]
    PoolExhausted,

    /// A hardware call failed during setup or per-frame execution.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Host-memory allocation failure. Unwinds like a driver error.
    #[error("allocation failed: {0}")]
    Allocation(String),

    /// Runtime control name is unrecognized or the channel is not exposed
    /// by the hardware.
    #[error("unknown or unavailable control '{0}'")]
    UnknownControl(String),
}

/// A single failed driver call, identified by operation name and the raw
/// status code the driver returned.
#[derive(Debug, Error)]
#[error("{op} failed (driver status {status})")]
pub struct DriverError {
    pub op: &'static str,
    pub status: i32,
}

impl DriverError {
    pub fn new(op: &'static str, status: i32) -> Self {
        Self { op, status }
    }
}
