//! Durable, append-only bet store.
//!
//! Backed by a newline-delimited, semicolon-separated file — one bet per
//! line, mirroring the wire format's own bet-line shape — opened in append
//! mode and flushed after every `append()` so a successful append is durable
//! before the caller's ACK is sent.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Mutex;

use crate::error::{LottoError, Result};
use crate::protocol::Bet;

/// Process-wide append-only log of bets, synchronized with a single mutex:
/// appends are mutually exclusive and never overlap a reader.
pub struct BetStore {
    file: Mutex<File>,
    mirror: Mutex<Vec<Bet>>,
}

impl BetStore {
    /// Open (creating if absent) the backing file at `path` for appends, and
    /// load any bets it already contains into the in-memory mirror `scan()`
    /// reads from.
    pub fn open(path: &Path) -> Result<Self> {
        let existing = load_existing(path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| LottoError::Storage(format!("failed to open bet store at {path:?}: {e}")))?;
        Ok(Self {
            file: Mutex::new(file),
            mirror: Mutex::new(existing),
        })
    }

    /// Durably append all `bets` in order, atomically with respect to other
    /// `append` calls. On failure, no guarantee is made about how much of
    /// the batch reached disk; the caller must treat the whole batch as
    /// failed.
    pub fn append(&self, bets: &[Bet]) -> Result<()> {
        let mut file = self.file.lock().expect("bet store mutex poisoned");
        let mut buf = String::new();
        for bet in bets {
            buf.push_str(&encode_line(bet));
            buf.push('\n');
        }
        file.write_all(buf.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| LottoError::Storage(format!("append failed: {e}")))?;
        drop(file);

        self.mirror
            .lock()
            .expect("bet store mirror mutex poisoned")
            .extend_from_slice(bets);
        Ok(())
    }

    /// Every bet stored so far, in insertion order. Only meaningful after
    /// all in-flight `append`s are known complete — enforced by the
    /// rendezvous, not by this method.
    pub fn scan(&self) -> Vec<Bet> {
        self.mirror.lock().expect("bet store mirror mutex poisoned").clone()
    }
}

fn encode_line(bet: &Bet) -> String {
    format!(
        "{};{};{};{};{};{}",
        bet.agency, bet.first_name, bet.last_name, bet.document, bet.birthdate, bet.number
    )
}

fn decode_line(line: &str) -> Option<Bet> {
    let fields: Vec<&str> = line.split(';').collect();
    if fields.len() != 6 {
        return None;
    }
    Some(Bet {
        agency: fields[0].parse().ok()?,
        first_name: fields[1].to_string(),
        last_name: fields[2].to_string(),
        document: fields[3].to_string(),
        birthdate: fields[4].to_string(),
        number: fields[5].parse().ok()?,
    })
}

fn load_existing(path: &Path) -> Result<Vec<Bet>> {
    let Ok(file) = File::open(path) else {
        return Ok(Vec::new());
    };
    let mut bets = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| LottoError::Storage(format!("failed reading existing store: {e}")))?;
        if line.is_empty() {
            continue;
        }
        if let Some(bet) = decode_line(&line) {
            bets.push(bet);
        }
    }
    Ok(bets)
}
