//! Acceptor / server: binds the listening socket, accepts up to `K` clients,
//! spawns one worker per connection, and orchestrates shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::{TcpListener, TcpSocket};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::intake::{self, WinnerPredicate};
use crate::rendezvous::Rendezvous;
use crate::store::BetStore;

/// How long shutdown waits for in-flight workers to finish before giving up
/// on a clean join.
const WORKER_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs the accept loop until `config.client_count` connections have been
/// accepted or `shutdown` is cancelled, then waits for every spawned worker
/// to finish before returning.
pub async fn run(
    config: Config,
    has_won: WinnerPredicate,
    shutdown: CancellationToken,
) -> Result<()> {
    let store = Arc::new(
        BetStore::open(&config.storage_path)
            .with_context(|| format!("failed to open bet store at {:?}", config.storage_path))?,
    );
    let rendezvous = Arc::new(Rendezvous::new(config.client_count));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = bind_listener(&addr, config.listen_backlog)
        .await
        .with_context(|| format!("failed to bind listener on {addr}"))?;
    log::info!(
        "action: server_listen | result: success | addr: {addr} | expected_clients: {}",
        config.client_count
    );

    // Watches `shutdown` independently of the accept loop below: all `K`
    // sockets may already be accepted (and some worker stuck at the
    // rendezvous, short of `K` arrivals) by the time a signal lands, so the
    // barrier must be broken on cancellation regardless of accept-loop state.
    let abort_watcher = tokio::spawn({
        let rendezvous = rendezvous.clone();
        let shutdown = shutdown.clone();
        async move {
            shutdown.cancelled().await;
            rendezvous.abort().await;
        }
    });

    let mut workers: Vec<JoinHandle<()>> = Vec::with_capacity(config.client_count);

    while workers.len() < config.client_count {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((socket, peer)) => {
                        let store = store.clone();
                        let rendezvous = rendezvous.clone();
                        let has_won = has_won.clone();
                        let read_timeout = Duration::from_secs(config.read_timeout_secs);
                        workers.push(tokio::spawn(async move {
                            intake::handle_connection(socket, peer, store, rendezvous, has_won, read_timeout).await;
                        }));
                    }
                    Err(e) => {
                        log::error!("action: accept_connection | result: fail | error: {e}");
                    }
                }
            }
            _ = shutdown.cancelled() => {
                log::info!("action: server_shutdown | result: in_progress | reason: signal_received");
                break;
            }
        }
    }

    drop(listener);
    log::info!("action: server_listen | result: success | status: closed");

    join_workers(workers).await;
    abort_watcher.abort();

    log::info!("action: server_shutdown | result: success");
    Ok(())
}

/// Binds via `TcpSocket` rather than `TcpListener::bind` so the configured
/// backlog is actually handed to `listen()` instead of left at whatever
/// default the OS picks.
async fn bind_listener(addr: &str, listen_backlog: u32) -> Result<TcpListener> {
    log::debug!("action: bind_listener | configured_backlog: {listen_backlog}");
    let addr = addr.parse().context("invalid listen address")?;
    let socket = TcpSocket::new_v4()?;
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(listen_backlog).map_err(Into::into)
}

/// Await every worker's `JoinHandle`, bounded by [`WORKER_JOIN_TIMEOUT`], so
/// shutdown is observably complete rather than merely signaled.
async fn join_workers(workers: Vec<JoinHandle<()>>) {
    match tokio::time::timeout(WORKER_JOIN_TIMEOUT, await_all(workers)).await {
        Ok(()) => {}
        Err(_) => {
            log::warn!(
                "action: worker_join | result: fail | reason: timeout_after_{}s",
                WORKER_JOIN_TIMEOUT.as_secs()
            );
        }
    }
}

async fn await_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if let Err(e) = handle.await {
            log::error!("action: worker_join | result: fail | error: {e}");
        }
    }
}
