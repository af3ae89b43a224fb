//! Concurrent intake-and-rendezvous engine for the agency lottery protocol.
//!
//! Module breakdown: wire framing (`protocol::framing`), batch grammar
//! (`protocol::batch`), durable bet storage (`store`), the per-connection
//! state machine (`intake`), the draw barrier (`rendezvous`), the accept
//! loop (`server`), and signal-driven shutdown (`shutdown`).

pub mod config;
pub mod error;
pub mod intake;
pub mod protocol;
pub mod rendezvous;
pub mod server;
pub mod shutdown;
pub mod store;
pub mod winners;

pub use config::{CliOverrides, Config};
pub use error::{LottoError, Result};
pub use intake::WinnerPredicate;
