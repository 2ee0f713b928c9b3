//! # blackhole-runtime
//!
//! Two-thread TCP server that answers every request with one canned
//! response.
//!
//! - [`acceptor::Acceptor`] waits on the listener (and the shutdown eventfd),
//!   accepts, and publishes record/descriptor pairs
//! - [`worker::PollWorker`] polls every registered descriptor, counts
//!   `"\r\n\r\n"` terminators and sends a bounded number of responses per cycle
//! - [`registry::SharedRegistry`] holds the index-parallel arrays and the
//!   handoff between the two
//! - [`server::Server`] wires them together and tears them down
//!
//! # Example
//!
//! ```rust,ignore
//! use blackhole_runtime::{config::ServerConfig, response::Response, server::Server, signal};
//!
//! let config = ServerConfig::from_env();
//! let response = Response::from_file("page.html", &config.status_line, &config.content_type)?;
//! let server = Server::bind(config, response)?;
//! signal::install_shutdown_handler(&server.shutdown_token())?;
//! let report = server.run()?;
//! ```

pub mod acceptor;
pub mod config;
pub mod connection;
pub mod net;
pub mod registry;
pub mod request;
pub mod response;
pub mod server;
pub mod signal;
pub mod worker;

pub use config::{ConfigError, ServerConfig};
pub use response::Response;
pub use server::{Server, ServerReport};
pub use worker::WorkerStats;
