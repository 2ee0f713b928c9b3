//! `WakeFd`: eventfd used to interrupt a blocking `poll(2)`.
//!
//! Writing bumps the eventfd counter and makes the descriptor readable.
//! The counter is never reset: a cancellation wakeup stays visible to every
//! later poll. `notify()` is a single `write(2)` and is safe to call from a
//! signal handler.

use crate::error::{BhError, BhResult};
use std::os::unix::io::RawFd;

pub struct WakeFd {
    fd: RawFd,
}

impl WakeFd {
    /// Create a new non-blocking, close-on-exec eventfd.
    pub fn create() -> BhResult<Self> {
        let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        if fd < 0 {
            return Err(BhError::last_os_error());
        }
        Ok(Self { fd })
    }

    /// Raw descriptor, for inclusion in a poll set.
    #[inline]
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// Make the descriptor readable. Never blocks.
    pub fn notify(&self) -> BhResult<()> {
        let val: u64 = 1;
        let ret = unsafe {
            libc::write(
                self.fd,
                &val as *const u64 as *const libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if ret < 0 {
            let errno = unsafe { *libc::__errno_location() };
            // Counter saturated: a wakeup is already pending.
            if errno == libc::EAGAIN {
                return Ok(());
            }
            return Err(BhError::Os(errno));
        }
        Ok(())
    }
}

impl std::fmt::Debug for WakeFd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WakeFd").field("fd", &self.fd).finish()
    }
}

impl Drop for WakeFd {
    fn drop(&mut self) {
        if self.fd >= 0 {
            unsafe {
                libc::close(self.fd);
            }
            self.fd = -1;
        }
    }
}
