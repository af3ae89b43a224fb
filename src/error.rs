//! Typed error kinds for the intake-and-rendezvous pipeline.
//!
//! `anyhow` is used at the binary/setup layer (config loading, socket bind)
//! where an error is only ever logged and propagated. Everywhere the caller
//! needs to branch on *what kind* of failure occurred — a parse error is
//! recovered locally, an I/O error tears down the connection — we need a
//! concrete type to match on, so this module exists alongside `anyhow`.

use thiserror::Error;

/// Error kinds produced by the frame codec, batch parser, bet store, and
/// rendezvous.
#[derive(Debug, Error)]
pub enum LottoError {
    /// Malformed length header on the wire.
    #[error("framing error: {0}")]
    Framing(String),

    /// Malformed batch payload.
    #[error("parse error: {0}")]
    Parse(String),

    /// Transport fault: short read, peer reset, write failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Persistence failure on append.
    #[error("storage error: {0}")]
    Storage(String),

    /// Rendezvous aborted by shutdown.
    #[error("rendezvous broken by shutdown")]
    Broken,

    /// Unexpected invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LottoError {
    /// Whether this error should terminate the connection: framing, I/O,
    /// broken-rendezvous, and internal errors are all fatal to the session.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, LottoError::Parse(_) | LottoError::Storage(_))
    }
}

pub type Result<T> = std::result::Result<T, LottoError>;
