//! Shutdown signal handling
//!
//! `SIGINT`/`SIGTERM` cancel the server's shutdown token; `SIGPIPE` is
//! ignored so a vanished peer surfaces as an `EPIPE` send error.

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        pub use unix::*;
    }
}
