//! Per-connection intake handler: drives one client's state machine from
//! first batch to disconnect.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;

use crate::error::{LottoError, Result};
use crate::protocol::{batch, framing, ParsedPayload};
use crate::rendezvous::Rendezvous;
use crate::store::BetStore;

/// Predicate deciding whether a bet won the draw. Deliberately abstract: the
/// store has no opinion on what makes a winner, so the acceptor wires one in
/// rather than the intake handler owning the rule.
pub type WinnerPredicate = Arc<dyn Fn(&crate::protocol::Bet) -> bool + Send + Sync>;

const ACK_SUCCESS: &str = "success";
const ACK_ERROR: &str = "error";
const NO_WINNERS: &str = "NO_WINNERS";

/// Drive one client connection through `READY_FOR_BATCH` → ... →
/// `DISCONNECT`/`FAILED`. Returns once the socket has been released on every
/// exit path.
pub async fn handle_connection(
    mut socket: TcpStream,
    peer: SocketAddr,
    store: Arc<BetStore>,
    rendezvous: Arc<Rendezvous>,
    has_won: WinnerPredicate,
    read_timeout: Duration,
) {
    log::info!("action: client_connection | result: success | ip: {peer}");

    let mut agency_id: Option<u32> = None;
    let outcome = ready_for_batch(&mut socket, peer, &store, &mut agency_id, read_timeout).await;

    match outcome {
        Ok(()) => {
            log::info!(
                "action: client_waiting_for_draw | result: success | ip: {peer} | agency: {agency_id:?}"
            );
            match rendezvous.arrive_and_wait(move |b| has_won(b), &store).await {
                Ok(table) => {
                    let agency = agency_id.unwrap_or(0);
                    let docs = table.for_agency(agency);
                    let payload = if docs.is_empty() {
                        NO_WINNERS.to_string()
                    } else {
                        docs.join(";")
                    };
                    if let Err(e) = framing::send(&mut socket, payload.as_bytes()).await {
                        log::error!("action: winners_sent | result: fail | ip: {peer} | error: {e}");
                    } else {
                        log::info!("action: winners_sent | result: success | ip: {peer} | agency: {agency}");
                    }
                }
                Err(LottoError::Broken) => {
                    log::info!("action: client_waiting_for_draw | result: fail | ip: {peer} | reason: shutdown");
                }
                Err(e) => {
                    log::error!("action: client_waiting_for_draw | result: fail | ip: {peer} | error: {e}");
                }
            }
        }
        Err(e) => {
            log::error!("action: client_connection | result: fail | ip: {peer} | error: {e}");
        }
    }

    log::info!("action: client_disconnection | result: success | ip: {peer}");
}

/// Runs the `READY_FOR_BATCH` loop until `END` is received (`Ok(())`, i.e.
/// `FINISHED_SENDING`) or a fatal error terminates the session (`FAILED`).
async fn ready_for_batch(
    socket: &mut TcpStream,
    peer: SocketAddr,
    store: &BetStore,
    agency_id: &mut Option<u32>,
    read_timeout: Duration,
) -> Result<()> {
    loop {
        let payload = match tokio::time::timeout(read_timeout, framing::receive(socket)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(LottoError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "read timed out",
                )))
            }
        };

        match batch::parse(&payload) {
            Ok(ParsedPayload::End) => {
                log::info!(
                    "action: client_connection | result: success | ip: {peer} | status: finished_sending_bets"
                );
                return Ok(());
            }
            Ok(ParsedPayload::Empty) => continue,
            Ok(ParsedPayload::Batch(b)) => {
                if let Some(bound) = *agency_id {
                    if bound != b.agency_id {
                        log::warn!(
                            "action: apuesta_recibida | result: fail | ip: {peer} | reason: agency_mismatch"
                        );
                        send_ack(socket, ACK_ERROR, "batch agency does not match session agency").await?;
                        continue;
                    }
                } else {
                    *agency_id = Some(b.agency_id);
                }

                match store.append(&b.bets) {
                    Ok(()) => {
                        log::info!(
                            "action: apuesta_recibida | result: success | ip: {peer} | cantidad: {}",
                            b.bets.len()
                        );
                        send_ack(socket, ACK_SUCCESS, "batch stored successfully").await?;
                    }
                    Err(e) if !e.is_fatal() => {
                        log::error!("action: apuesta_recibida | result: fail | ip: {peer} | error: {e}");
                        send_ack(socket, ACK_ERROR, &e.to_string()).await?;
                    }
                    Err(e) => return Err(e),
                }
            }
            Err(e) if !e.is_fatal() => {
                log::warn!("action: apuesta_recibida | result: fail | ip: {peer} | error: {e}");
                send_ack(socket, ACK_ERROR, &e.to_string()).await?;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn send_ack(socket: &mut TcpStream, status: &str, message: &str) -> Result<()> {
    let payload = format!("{status};{message}");
    framing::send(socket, payload.as_bytes()).await
}
