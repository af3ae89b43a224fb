//! Rendezvous / draw coordinator.
//!
//! A cyclic barrier with an on-release action, composed from a mutex,
//! arrival counter, generation number, and abort flag, built on
//! `tokio::sync::{Mutex, Notify}` so waiters suspend cooperatively on the
//! runtime instead of blocking a thread.

use std::sync::Arc;

use tokio::sync::{Mutex, Notify};

use crate::error::{LottoError, Result};
use crate::store::BetStore;
use crate::winners::WinnersTable;

struct State {
    arrived: usize,
    /// Bumped every time the barrier releases (on draw or on abort), so a
    /// waiter can tell a stale wakeup from the one meant for it.
    generation: u64,
    aborted: bool,
    table: Option<Arc<WinnersTable>>,
}

/// Gates the draw on "all `expected` agencies finished".
pub struct Rendezvous {
    expected: usize,
    state: Mutex<State>,
    notify: Notify,
}

impl Rendezvous {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            state: Mutex::new(State {
                arrived: 0,
                generation: 0,
                aborted: false,
                table: None,
            }),
            notify: Notify::new(),
        }
    }

    /// Called by a handler that has reached `FINISHED_SENDING`. Runs the
    /// draw synchronously on the arrival that reaches `expected`, then
    /// releases every waiter (including itself) with the published table.
    ///
    /// # Errors
    ///
    /// Returns [`LottoError::Broken`] if shutdown aborted the rendezvous
    /// before or while this call was waiting.
    pub async fn arrive_and_wait(&self, has_won: impl Fn(&crate::protocol::Bet) -> bool, store: &BetStore) -> Result<Arc<WinnersTable>> {
        let my_generation = {
            let mut state = self.state.lock().await;
            if state.aborted {
                return Err(LottoError::Broken);
            }
            state.arrived += 1;
            let generation = state.generation;

            if state.arrived == self.expected {
                let table = run_draw(store, has_won);
                state.table = Some(Arc::new(table));
                state.arrived = 0;
                state.generation += 1;
                drop(state);
                self.notify.notify_waiters();
                return self.published_table().await;
            }
            generation
        };

        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register this waiter in `notify`'s waiter list *before* checking
            // `generation`: `notify_waiters()` stores no permit, so a waiter
            // that polls `notified` only after the draw has already called it
            // would miss the wakeup and block forever. `enable()` performs
            // that registration without consuming a wakeup the way polling
            // the future would.
            notified.as_mut().enable();
            {
                let state = self.state.lock().await;
                if state.aborted {
                    return Err(LottoError::Broken);
                }
                if state.generation != my_generation {
                    return self.published_table().await;
                }
            }
            notified.await;
        }
    }

    async fn published_table(&self) -> Result<Arc<WinnersTable>> {
        let state = self.state.lock().await;
        if state.aborted {
            return Err(LottoError::Broken);
        }
        state
            .table
            .clone()
            .ok_or_else(|| LottoError::Internal("rendezvous released without a published table".into()))
    }

    /// Abort the rendezvous: every current and future `arrive_and_wait` call
    /// returns [`LottoError::Broken`].
    pub async fn abort(&self) {
        let mut state = self.state.lock().await;
        state.aborted = true;
        drop(state);
        self.notify.notify_waiters();
    }
}

fn run_draw(store: &BetStore, has_won: impl Fn(&crate::protocol::Bet) -> bool) -> WinnersTable {
    let mut table = WinnersTable::new();
    for bet in store.scan() {
        if has_won(&bet) {
            table.record(bet.agency, bet.document.clone());
        }
    }
    table
}
