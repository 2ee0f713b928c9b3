//! # blackhole-core
//!
//! Building blocks shared by the blackhole runtime and binary.
//!
//! ## Modules
//!
//! - `vector` - Growable array with an optional per-element destructor
//! - `cancel` - Cancellation token (flag + eventfd) for cooperative shutdown
//! - `wake` - Eventfd wrapper used to interrupt a blocking poll
//! - `error` - Error types
//! - `kprint` - Kernel-style leveled logging macros
//! - `env` - Environment variable utilities

pub mod vector;
pub mod cancel;
pub mod wake;
pub mod error;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use vector::{Destructor, Vector};
pub use cancel::CancellationToken;
pub use wake::WakeFd;
pub use error::{BhError, BhResult, VectorError, VectorResult};
pub use env::{env_get, env_get_bool, env_get_millis, env_get_opt, env_get_secs, env_get_str};
