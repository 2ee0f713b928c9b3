//! Listening socket setup

use blackhole_core::error::{BhError, BhResult};
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd, FromRawFd, IntoRawFd, RawFd};

/// Non-blocking TCP listener.
///
/// An IPv6 bind address clears `IPV6_V6ONLY`, so the wildcard `[::]`
/// also accepts IPv4 clients as mapped addresses.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    pub fn bind(addr: SocketAddr, backlog: i32) -> BhResult<Self> {
        let domain = match addr {
            SocketAddr::V4(_) => libc::AF_INET,
            SocketAddr::V6(_) => libc::AF_INET6,
        };

        let fd = unsafe { libc::socket(domain, libc::SOCK_STREAM | libc::SOCK_CLOEXEC, 0) };
        if fd < 0 {
            return Err(BhError::socket("socket"));
        }
        // Owns the fd from here on; any early return closes it.
        let inner = unsafe { TcpListener::from_raw_fd(fd) };

        set_int_option(fd, libc::SOL_SOCKET, libc::SO_REUSEADDR, 1)?;
        if addr.is_ipv6() {
            set_int_option(fd, libc::IPPROTO_IPV6, libc::IPV6_V6ONLY, 0)?;
        }

        let ret = match addr {
            SocketAddr::V4(v4) => {
                let mut sa: libc::sockaddr_in = unsafe { std::mem::zeroed() };
                sa.sin_family = libc::AF_INET as libc::sa_family_t;
                sa.sin_port = v4.port().to_be();
                sa.sin_addr.s_addr = u32::from_ne_bytes(v4.ip().octets());
                unsafe {
                    libc::bind(
                        fd,
                        &sa as *const _ as *const libc::sockaddr,
                        std::mem::size_of_val(&sa) as libc::socklen_t,
                    )
                }
            }
            SocketAddr::V6(v6) => {
                let mut sa: libc::sockaddr_in6 = unsafe { std::mem::zeroed() };
                sa.sin6_family = libc::AF_INET6 as libc::sa_family_t;
                sa.sin6_port = v6.port().to_be();
                sa.sin6_addr.s6_addr = v6.ip().octets();
                sa.sin6_flowinfo = v6.flowinfo();
                sa.sin6_scope_id = v6.scope_id();
                unsafe {
                    libc::bind(
                        fd,
                        &sa as *const _ as *const libc::sockaddr,
                        std::mem::size_of_val(&sa) as libc::socklen_t,
                    )
                }
            }
        };
        if ret != 0 {
            return Err(BhError::socket("bind"));
        }

        if unsafe { libc::listen(fd, backlog) } != 0 {
            return Err(BhError::socket("listen"));
        }

        inner
            .set_nonblocking(true)
            .map_err(|e| io_error("fcntl", e))?;

        Ok(Self { inner })
    }

    pub fn local_addr(&self) -> BhResult<SocketAddr> {
        self.inner
            .local_addr()
            .map_err(|e| io_error("getsockname", e))
    }

    /// Accept one pending connection, transferring ownership of its
    /// descriptor to the caller.
    pub fn accept(&self) -> io::Result<(RawFd, SocketAddr)> {
        let (stream, addr) = self.inner.accept()?;
        Ok((stream.into_raw_fd(), addr))
    }

    #[inline]
    pub fn fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }
}

impl AsFd for Listener {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.inner.as_fd()
    }
}

fn set_int_option(
    fd: RawFd,
    level: libc::c_int,
    name: libc::c_int,
    value: libc::c_int,
) -> BhResult<()> {
    let ret = unsafe {
        libc::setsockopt(
            fd,
            level,
            name,
            &value as *const _ as *const libc::c_void,
            std::mem::size_of_val(&value) as libc::socklen_t,
        )
    };
    if ret != 0 {
        return Err(BhError::socket("setsockopt"));
    }
    Ok(())
}

fn io_error(op: &'static str, e: io::Error) -> BhError {
    BhError::Socket {
        op,
        errno: e.raw_os_error().unwrap_or(libc::EIO),
    }
}
