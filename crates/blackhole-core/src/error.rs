//! Error types for the blackhole server

use core::fmt;
use std::collections::TryReserveError;

/// Result type for server operations
pub type BhResult<T> = Result<T, BhError>;

/// Result type for container operations
pub type VectorResult<T> = Result<T, VectorError>;

/// Errors that can occur while setting up or running the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BhError {
    /// Response file could not be opened, inspected or mapped
    ResponseFile { path: String, errno: i32 },

    /// Socket setup failed (`op` names the failing call)
    Socket { op: &'static str, errno: i32 },

    /// Invalid configuration value
    Config(&'static str),

    /// Container growth failed
    Vector(VectorError),

    /// Failed to spawn the worker thread
    SpawnFailed,

    /// Worker thread panicked
    WorkerPanicked,

    /// Signal setup failed
    SignalSetupFailed(i32),

    /// OS error with errno
    Os(i32),
}

impl BhError {
    /// Build an `Os` error from the calling thread's errno.
    pub fn last_os_error() -> Self {
        BhError::Os(std::io::Error::last_os_error().raw_os_error().unwrap_or(0))
    }

    /// Build a `Socket` error for `op` from the calling thread's errno.
    pub fn socket(op: &'static str) -> Self {
        BhError::Socket {
            op,
            errno: std::io::Error::last_os_error().raw_os_error().unwrap_or(0),
        }
    }
}

impl fmt::Display for BhError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BhError::ResponseFile { path, errno } => write!(
                f,
                "cannot load response file {}: {}",
                path,
                std::io::Error::from_raw_os_error(*errno)
            ),
            BhError::Socket { op, errno } => write!(
                f,
                "{}() failed: {}",
                op,
                std::io::Error::from_raw_os_error(*errno)
            ),
            BhError::Config(msg) => write!(f, "invalid config: {}", msg),
            BhError::Vector(e) => write!(f, "container error: {}", e),
            BhError::SpawnFailed => write!(f, "failed to spawn worker thread"),
            BhError::WorkerPanicked => write!(f, "worker thread panicked"),
            BhError::SignalSetupFailed(errno) => write!(f, "signal setup failed: errno {}", errno),
            BhError::Os(errno) => {
                write!(f, "OS error: {}", std::io::Error::from_raw_os_error(*errno))
            }
        }
    }
}

impl std::error::Error for BhError {}

/// Growable array errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorError {
    /// Doubling the capacity would overflow `usize`
    CapacityOverflow,

    /// The allocator refused the request (capacity in elements)
    AllocationFailed { capacity: usize },
}

impl fmt::Display for VectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VectorError::CapacityOverflow => write!(f, "capacity overflow"),
            VectorError::AllocationFailed { capacity } => {
                write!(f, "allocation of {} elements failed", capacity)
            }
        }
    }
}

impl std::error::Error for VectorError {}

impl From<VectorError> for BhError {
    fn from(e: VectorError) -> Self {
        BhError::Vector(e)
    }
}

impl VectorError {
    pub(crate) fn from_reserve(capacity: usize, _e: TryReserveError) -> Self {
        VectorError::AllocationFailed { capacity }
    }
}
