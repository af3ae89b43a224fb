//! Signal-driven cooperative shutdown.
//!
//! The server's main loop is tokio-async end to end, so shutdown is driven
//! by `tokio::signal::unix::signal` tasks racing against the rest of the
//! runtime rather than a thread polling a flag.

use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

/// Wait for SIGINT or SIGTERM, then cancel `token`. Meant to be spawned
/// once, for the lifetime of the process.
pub async fn wait_for_shutdown_signal(token: CancellationToken) {
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            log::error!("action: signal_handler_install | result: fail | signal: SIGINT | error: {e}");
            return;
        }
    };
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            log::error!("action: signal_handler_install | result: fail | signal: SIGTERM | error: {e}");
            return;
        }
    };

    tokio::select! {
        _ = sigint.recv() => {
            log::info!("action: shutdown_signal | result: success | signal: SIGINT");
        }
        _ = sigterm.recv() => {
            log::info!("action: shutdown_signal | result: success | signal: SIGTERM");
        }
        _ = token.cancelled() => {}
    }
    token.cancel();
}
