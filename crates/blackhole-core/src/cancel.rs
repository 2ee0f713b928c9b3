//! Cancellation token for cooperative shutdown
//!
//! One token is shared by the supervising server, the acceptor and the
//! poll worker. Cancelling it sets a flag every loop checks and bumps an
//! eventfd, so a thread blocked in `poll(2)` on [`CancellationToken::wake_fd`]
//! returns immediately.

use crate::error::BhResult;
use crate::wake::WakeFd;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Token for checking and triggering cancellation
///
/// Clones share state. `cancel()` only performs an atomic store and a
/// `write(2)`, so it may be called from a signal handler.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

struct Inner {
    cancelled: AtomicBool,
    wake: WakeFd,
}

impl CancellationToken {
    /// Create a new token with its own wake eventfd.
    pub fn new() -> BhResult<Self> {
        Ok(Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                wake: WakeFd::create()?,
            }),
        })
    }

    /// Check if cancellation was requested
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Request cancellation and wake any poller watching `wake_fd()`.
    ///
    /// Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        let _ = self.inner.wake.notify();
    }

    /// Descriptor that becomes readable on cancellation.
    #[inline]
    pub fn wake_fd(&self) -> RawFd {
        self.inner.wake.fd()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("wake_fd", &self.wake_fd())
            .finish()
    }
}
