//! Compile-time defaults for `ServerConfig`.

use std::net::{IpAddr, Ipv6Addr};

/// Wildcard dual-stack address `[::]`
pub const BIND_ADDR: IpAddr = IpAddr::V6(Ipv6Addr::UNSPECIFIED);
pub const PORT: u16 = 80;
pub const BACKLOG: i32 = 32;

/// Poll timeout while responses are queued
pub const BUSY_POLL_MS: u64 = 100;
/// Poll timeout with nothing queued
pub const IDLE_POLL_MS: u64 = 300;

/// Pending writes serviced per cycle
pub const WRITE_BUDGET: usize = 14;
/// Bytes read per ready descriptor per cycle
pub const RECV_BUFFER_SIZE: usize = 65535;
/// Slots reserved up front in each registry array
pub const INITIAL_CAPACITY: usize = 32;

/// 0 disables the periodic stats line
pub const STATS_INTERVAL_SECS: u64 = 5;

pub const STATUS_LINE: &str = "HTTP/1.1 503 Service Unavailable";
pub const CONTENT_TYPE: &str = "text/html; charset=UTF-8";
