//! Per-connection state: the record, its poll descriptor and the pair
//! handed from the acceptor to the worker.

use crate::request::BoundaryScanner;
use std::fmt;
use std::net::SocketAddr;
use std::os::unix::io::RawFd;
use std::time::SystemTime;

/// Bookkeeping for one accepted client.
///
/// Created by the acceptor, owned and mutated by the worker afterwards.
/// The descriptor is closed by the records array's destructor
/// ([`close_record`]), not by `Drop`.
#[derive(Debug)]
pub struct ConnectionRecord {
    fd: RawFd,
    remote: SocketAddr,
    addr_len: libc::socklen_t,
    accepted_at: SystemTime,
    scanner: BoundaryScanner,
}

impl ConnectionRecord {
    pub fn new(fd: RawFd, remote: SocketAddr) -> Self {
        let addr_len = match remote {
            SocketAddr::V4(_) => std::mem::size_of::<libc::sockaddr_in>(),
            SocketAddr::V6(_) => std::mem::size_of::<libc::sockaddr_in6>(),
        } as libc::socklen_t;
        Self {
            fd,
            remote,
            addr_len,
            accepted_at: SystemTime::now(),
            scanner: BoundaryScanner::new(),
        }
    }

    #[inline]
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    #[inline]
    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    #[inline]
    pub fn port(&self) -> u16 {
        self.remote.port()
    }

    /// Size of the OS address structure for the peer's family.
    #[inline]
    pub fn addr_len(&self) -> libc::socklen_t {
        self.addr_len
    }

    pub fn family(&self) -> &'static str {
        match self.remote {
            SocketAddr::V4(_) => "IPv4",
            SocketAddr::V6(_) => "IPv6",
        }
    }

    #[inline]
    pub fn accepted_at(&self) -> SystemTime {
        self.accepted_at
    }

    #[inline]
    pub fn scanner_mut(&mut self) -> &mut BoundaryScanner {
        &mut self.scanner
    }

    pub fn is_open(&self) -> bool {
        self.fd >= 0
    }

    /// Close the descriptor once. Later calls are no-ops.
    pub fn close(&mut self) {
        if self.fd >= 0 {
            unsafe {
                libc::close(self.fd);
            }
            self.fd = -1;
        }
    }
}

/// Destructor installed on the records array.
pub fn close_record(record: &mut ConnectionRecord) {
    record.close();
}

/// Readiness of one descriptor after a poll, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Idle,
    HangUp,
    Error,
    Readable,
}

/// `pollfd` entry stored index-parallel to the records.
///
/// `repr(transparent)` so a slice of these can be passed to `poll(2)`.
#[repr(transparent)]
#[derive(Clone, Copy)]
pub struct PollDescriptor(libc::pollfd);

impl PollDescriptor {
    /// Descriptor with read interest.
    pub fn readable(fd: RawFd) -> Self {
        Self(libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        })
    }

    #[inline]
    pub fn fd(&self) -> RawFd {
        self.0.fd
    }

    #[inline]
    pub fn events(&self) -> libc::c_short {
        self.0.events
    }

    #[inline]
    pub fn revents(&self) -> libc::c_short {
        self.0.revents
    }

    #[inline]
    pub fn clear_revents(&mut self) {
        self.0.revents = 0;
    }

    /// Classify the returned events: hang-up, then error, then readable.
    pub fn readiness(&self) -> Readiness {
        let r = self.0.revents;
        if r & libc::POLLHUP != 0 {
            Readiness::HangUp
        } else if r & (libc::POLLERR | libc::POLLNVAL) != 0 {
            Readiness::Error
        } else if r & libc::POLLIN != 0 {
            Readiness::Readable
        } else {
            Readiness::Idle
        }
    }

    pub(crate) fn as_raw_mut(slice: &mut [PollDescriptor]) -> *mut libc::pollfd {
        slice.as_mut_ptr() as *mut libc::pollfd
    }

    #[cfg(test)]
    pub(crate) fn with_revents(fd: RawFd, revents: libc::c_short) -> Self {
        Self(libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents,
        })
    }
}

impl fmt::Debug for PollDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollDescriptor")
            .field("fd", &self.0.fd)
            .field("events", &format_args!("{:#x}", self.0.events))
            .field("revents", &format_args!("{:#x}", self.0.revents))
            .finish()
    }
}

/// Record/descriptor pair built by the acceptor for admission.
#[derive(Debug)]
pub struct Incoming {
    pub record: ConnectionRecord,
    pub descriptor: PollDescriptor,
}

impl Incoming {
    pub fn new(fd: RawFd, remote: SocketAddr) -> Self {
        Self {
            record: ConnectionRecord::new(fd, remote),
            descriptor: PollDescriptor::readable(fd),
        }
    }

    /// Close the descriptor of a pair that will never be admitted.
    pub fn discard(mut self) {
        self.record.close();
    }
}
