//! Connection acceptor
//!
//! Runs on the thread that calls `Server::run`. Waits until the listener is
//! readable or the shutdown token fires, accepts, and publishes the new
//! record/descriptor pair to the worker through the registry.

use crate::connection::Incoming;
use crate::net::Listener;
use crate::registry::SharedRegistry;
use blackhole_core::kprint;
use blackhole_core::{kdebug, kerror, kinfo};
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::io;
use std::os::unix::io::{AsFd, BorrowedFd};
use std::sync::Arc;

/// What woke the acceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wake {
    Connection,
    Shutdown,
}

pub struct Acceptor {
    listener: Listener,
    registry: Arc<SharedRegistry>,
    accepted: u64,
}

impl Acceptor {
    pub fn new(listener: Listener, registry: Arc<SharedRegistry>) -> Self {
        Self {
            listener,
            registry,
            accepted: 0,
        }
    }

    /// Accept until shutdown. Returns the number of accepted connections.
    ///
    /// Always releases a parked worker before returning.
    pub fn run(&mut self) -> u64 {
        kprint::set_thread_tag("acceptor");
        kdebug!("acceptor starting on fd {}", self.listener.fd());

        loop {
            match self.wait() {
                Ok(Wake::Shutdown) => break,
                Ok(Wake::Connection) => self.accept_one(),
                Err(Errno::EINTR) => continue,
                Err(e) => kerror!("poll() on listener failed: {}", e.desc()),
            }
        }

        kdebug!("acceptor leaving, releasing worker");
        self.registry.release_worker();
        self.accepted
    }

    /// Block on the listener and the shutdown token's eventfd together.
    fn wait(&self) -> Result<Wake, Errno> {
        let token = self.registry.shutdown_token();
        if token.is_cancelled() {
            return Ok(Wake::Shutdown);
        }

        // The token (and its eventfd) outlives this call via the registry.
        let wake_fd = unsafe { BorrowedFd::borrow_raw(token.wake_fd()) };
        let mut fds = [
            PollFd::new(self.listener.as_fd(), PollFlags::POLLIN),
            PollFd::new(wake_fd, PollFlags::POLLIN),
        ];
        poll(&mut fds, PollTimeout::NONE)?;

        if token.is_cancelled() {
            return Ok(Wake::Shutdown);
        }
        Ok(Wake::Connection)
    }

    fn accept_one(&mut self) {
        match self.listener.accept() {
            Ok((fd, remote)) => {
                let incoming = Incoming::new(fd, remote);
                kinfo!(
                    "accepted {} client {} port {}",
                    incoming.record.family(),
                    remote.ip(),
                    remote.port()
                );
                self.registry.publish(incoming);
                self.accepted += 1;
            }
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => kerror!("accept() failed: {}", e),
        }
    }
}
