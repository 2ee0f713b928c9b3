//! Unix signal handling for graceful shutdown

use blackhole_core::cancel::CancellationToken;
use blackhole_core::error::{BhError, BhResult};
use blackhole_core::kwarn;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::sync::OnceLock;

/// Token cancelled by the handler. Set once per process.
static SHUTDOWN: OnceLock<CancellationToken> = OnceLock::new();

/// Signals that request a graceful shutdown.
pub const SHUTDOWN_SIGNALS: [Signal; 2] = [Signal::SIGINT, Signal::SIGTERM];

/// Route `SIGINT`/`SIGTERM` to `token.cancel()` and ignore `SIGPIPE`.
///
/// The handler is installed without `SA_RESTART`. Only the first token
/// passed in a process is used; later calls keep it and return `Ok`.
pub fn install_shutdown_handler(token: &CancellationToken) -> BhResult<()> {
    if SHUTDOWN.set(token.clone()).is_err() {
        kwarn!("shutdown handler already installed, keeping the first token");
        return Ok(());
    }

    let action = SigAction::new(
        SigHandler::Handler(handle_shutdown),
        SaFlags::empty(),
        SigSet::empty(),
    );
    for signal in SHUTDOWN_SIGNALS {
        unsafe { sigaction(signal, &action) }
            .map_err(|e| BhError::SignalSetupFailed(e as i32))?;
    }

    ignore_sigpipe()
}

/// Ignore `SIGPIPE` process-wide.
pub fn ignore_sigpipe() -> BhResult<()> {
    let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
    unsafe { sigaction(Signal::SIGPIPE, &ignore) }
        .map_err(|e| BhError::SignalSetupFailed(e as i32))?;
    Ok(())
}

/// Atomic store plus one `write(2)`; nothing else.
extern "C" fn handle_shutdown(_sig: libc::c_int) {
    if let Some(token) = SHUTDOWN.get() {
        token.cancel();
    }
}
