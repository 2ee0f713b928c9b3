//! Server Configuration
//!
//! Compile-time defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Builder calls
//! 2. Environment variables (runtime)
//! 3. Library defaults (`defaults`)
//!
//! # Example
//!
//! ```rust,ignore
//! use blackhole_runtime::config::ServerConfig;
//!
//! let config = ServerConfig::from_env()
//!     .bind_addr("127.0.0.1".parse().unwrap())
//!     .port(0);
//! config.validate()?;
//! ```

pub mod defaults;

use blackhole_core::env::{env_get, env_get_millis, env_get_secs, env_get_str};
use blackhole_core::error::BhError;
use blackhole_core::kprintln;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Server configuration with builder pattern.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to; IPv6 wildcard accepts IPv4 too
    pub bind_addr: IpAddr,
    /// Listening port, 0 picks an ephemeral one
    pub port: u16,
    /// listen(2) backlog
    pub backlog: i32,
    /// Poll timeout while the pending-write queue is non-empty
    pub busy_poll_timeout: Duration,
    /// Poll timeout while the pending-write queue is empty
    pub idle_poll_timeout: Duration,
    /// Pending writes drained per cycle
    pub write_budget: usize,
    /// Receive buffer size (one receive per ready descriptor per cycle)
    pub recv_buffer_size: usize,
    /// Capacity reserved in each registry array at startup
    pub initial_capacity: usize,
    /// Period of the worker's stats line, zero disables it
    pub stats_interval: Duration,
    /// Status line of the canned response
    pub status_line: String,
    /// `Content-Type` of the canned response
    pub content_type: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ServerConfig {
    /// Create config from compile-time defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `BH_BIND_ADDR` - Listen address
    /// - `BH_PORT` - Listen port
    /// - `BH_BACKLOG` - listen(2) backlog
    /// - `BH_BUSY_POLL_MS` - Poll timeout with writes queued
    /// - `BH_IDLE_POLL_MS` - Poll timeout with no writes queued
    /// - `BH_WRITE_BUDGET` - Writes serviced per cycle
    /// - `BH_RECV_BUFFER` - Receive buffer size in bytes
    /// - `BH_INITIAL_CAPACITY` - Registry slots reserved at startup
    /// - `BH_STATS_INTERVAL_SECS` - Stats period, 0 = off
    /// - `BH_STATUS_LINE` - Response status line
    /// - `BH_CONTENT_TYPE` - Response content type
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_get("BH_BIND_ADDR", defaults::BIND_ADDR),
            port: env_get("BH_PORT", defaults::PORT),
            backlog: env_get("BH_BACKLOG", defaults::BACKLOG),
            busy_poll_timeout: env_get_millis(
                "BH_BUSY_POLL_MS",
                Duration::from_millis(defaults::BUSY_POLL_MS),
            ),
            idle_poll_timeout: env_get_millis(
                "BH_IDLE_POLL_MS",
                Duration::from_millis(defaults::IDLE_POLL_MS),
            ),
            write_budget: env_get("BH_WRITE_BUDGET", defaults::WRITE_BUDGET),
            recv_buffer_size: env_get("BH_RECV_BUFFER", defaults::RECV_BUFFER_SIZE),
            initial_capacity: env_get("BH_INITIAL_CAPACITY", defaults::INITIAL_CAPACITY),
            stats_interval: env_get_secs(
                "BH_STATS_INTERVAL_SECS",
                Duration::from_secs(defaults::STATS_INTERVAL_SECS),
            ),
            status_line: env_get_str("BH_STATUS_LINE", defaults::STATUS_LINE),
            content_type: env_get_str("BH_CONTENT_TYPE", defaults::CONTENT_TYPE),
        }
    }

    /// Create config with explicit defaults (no env override).
    pub fn new() -> Self {
        Self {
            bind_addr: defaults::BIND_ADDR,
            port: defaults::PORT,
            backlog: defaults::BACKLOG,
            busy_poll_timeout: Duration::from_millis(defaults::BUSY_POLL_MS),
            idle_poll_timeout: Duration::from_millis(defaults::IDLE_POLL_MS),
            write_budget: defaults::WRITE_BUDGET,
            recv_buffer_size: defaults::RECV_BUFFER_SIZE,
            initial_capacity: defaults::INITIAL_CAPACITY,
            stats_interval: Duration::from_secs(defaults::STATS_INTERVAL_SECS),
            status_line: defaults::STATUS_LINE.to_string(),
            content_type: defaults::CONTENT_TYPE.to_string(),
        }
    }

    // Builder methods

    pub fn bind_addr(mut self, addr: IpAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn backlog(mut self, backlog: i32) -> Self {
        self.backlog = backlog;
        self
    }

    pub fn busy_poll_timeout(mut self, d: Duration) -> Self {
        self.busy_poll_timeout = d;
        self
    }

    pub fn idle_poll_timeout(mut self, d: Duration) -> Self {
        self.idle_poll_timeout = d;
        self
    }

    pub fn write_budget(mut self, n: usize) -> Self {
        self.write_budget = n;
        self
    }

    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size;
        self
    }

    pub fn initial_capacity(mut self, cap: usize) -> Self {
        self.initial_capacity = cap;
        self
    }

    pub fn stats_interval(mut self, d: Duration) -> Self {
        self.stats_interval = d;
        self
    }

    pub fn status_line(mut self, line: impl Into<String>) -> Self {
        self.status_line = line.into();
        self
    }

    pub fn content_type(mut self, ct: impl Into<String>) -> Self {
        self.content_type = ct.into();
        self
    }

    /// Socket address the listener binds to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    /// Validate configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backlog <= 0 {
            return Err(ConfigError::InvalidValue("backlog must be > 0"));
        }
        if self.write_budget == 0 {
            return Err(ConfigError::InvalidValue("write_budget must be > 0"));
        }
        if self.recv_buffer_size == 0 {
            return Err(ConfigError::InvalidValue("recv_buffer_size must be > 0"));
        }
        if self.busy_poll_timeout.is_zero() || self.idle_poll_timeout.is_zero() {
            return Err(ConfigError::InvalidValue("poll timeouts must be > 0"));
        }
        if self.busy_poll_timeout.as_millis() > i32::MAX as u128
            || self.idle_poll_timeout.as_millis() > i32::MAX as u128
        {
            return Err(ConfigError::InvalidValue("poll timeouts must fit in i32 milliseconds"));
        }
        if self.status_line.is_empty() || self.status_line.contains(['\r', '\n']) {
            return Err(ConfigError::InvalidValue(
                "status_line must be a single non-empty line",
            ));
        }
        if self.content_type.contains(['\r', '\n']) {
            return Err(ConfigError::InvalidValue("content_type must be a single line"));
        }
        Ok(())
    }

    /// Print configuration (for debugging)
    pub fn print(&self) {
        kprintln!("blackhole configuration:");
        kprintln!("  listen:            {}", self.socket_addr());
        kprintln!("  backlog:           {}", self.backlog);
        kprintln!("  busy_poll_timeout: {:?}", self.busy_poll_timeout);
        kprintln!("  idle_poll_timeout: {:?}", self.idle_poll_timeout);
        kprintln!("  write_budget:      {}", self.write_budget);
        kprintln!("  recv_buffer_size:  {}", self.recv_buffer_size);
        kprintln!("  initial_capacity:  {}", self.initial_capacity);
        kprintln!("  stats_interval:    {:?}", self.stats_interval);
        kprintln!("  status_line:       {}", self.status_line);
        kprintln!("  content_type:      {}", self.content_type);
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for BhError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::InvalidValue(msg) => BhError::Config(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::new();
        assert_eq!(config.port, 80);
        assert_eq!(config.backlog, 32);
        assert_eq!(config.write_budget, 14);
        assert_eq!(config.busy_poll_timeout, Duration::from_millis(100));
        assert_eq!(config.idle_poll_timeout, Duration::from_millis(300));
        assert_eq!(config.socket_addr().to_string(), "[::]:80");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ServerConfig::new()
            .bind_addr("127.0.0.1".parse().unwrap())
            .port(0)
            .write_budget(3)
            .status_line("HTTP/1.1 200 OK");

        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:0");
        assert_eq!(config.write_budget, 3);
        assert_eq!(config.status_line, "HTTP/1.1 200 OK");
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("BH_WRITE_BUDGET", "7");
        std::env::set_var("BH_IDLE_POLL_MS", "50");
        let config = ServerConfig::from_env();
        std::env::remove_var("BH_WRITE_BUDGET");
        std::env::remove_var("BH_IDLE_POLL_MS");

        assert_eq!(config.write_budget, 7);
        assert_eq!(config.idle_poll_timeout, Duration::from_millis(50));
    }

    #[test]
    fn test_validation() {
        assert!(ServerConfig::new().write_budget(0).validate().is_err());
        assert!(ServerConfig::new().backlog(0).validate().is_err());
        assert!(ServerConfig::new()
            .busy_poll_timeout(Duration::ZERO)
            .validate()
            .is_err());

        let err = ServerConfig::new()
            .status_line("HTTP/1.1 200 OK\r\nX-Evil: 1")
            .validate()
            .unwrap_err();
        let bh: BhError = err.into();
        assert!(matches!(bh, BhError::Config(_)));
    }
}
