//! Wire protocol: frame codec and batch grammar.

pub mod batch;
pub mod framing;

pub use batch::{Batch, Bet, ParsedPayload};
