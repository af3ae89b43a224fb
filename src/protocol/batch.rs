//! Batch grammar: turns a frame payload into a [`ParsedPayload`].
//!
//! A two-stage grammar — a header line, then `N` bet lines — with fields
//! validated and typed at parse time rather than kept as strings.

use crate::error::{LottoError, Result};

const FIELD_SEPARATOR: char = ';';
const END_MARKER: &str = "END";

/// One lottery entry. `agency` is set to the owning batch's `agency_id` for
/// every bet parsed from that batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bet {
    pub agency: u32,
    pub first_name: String,
    pub last_name: String,
    pub document: String,
    pub birthdate: String,
    pub number: u64,
}

/// A client-submitted group of bets, all sharing one `agency_id`. Ephemeral —
/// never persisted as a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub agency_id: u32,
    pub bets: Vec<Bet>,
}

/// The three shapes a decoded payload can take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedPayload {
    /// The client has no further bets.
    End,
    /// Zero-length payload, or all-whitespace.
    Empty,
    /// A well-formed batch.
    Batch(Batch),
}

/// Parse a frame payload per the batch grammar.
///
/// Rejects the whole batch on any error — never reports a partial set of
/// bets.
///
/// # Errors
///
/// Returns [`LottoError::Parse`] for bad encoding, a malformed header, a
/// bet-count mismatch, a bet line with other than 5 fields, or a
/// non-integer `number`.
pub fn parse(payload: &[u8]) -> Result<ParsedPayload> {
    let text = std::str::from_utf8(payload)
        .map_err(|_| LottoError::Parse("invalid message encoding".into()))?;

    let trimmed = text.trim();
    if trimmed == END_MARKER {
        return Ok(ParsedPayload::End);
    }
    if trimmed.is_empty() {
        return Ok(ParsedPayload::Empty);
    }

    let lines: Vec<&str> = trimmed.lines().filter(|l| !l.trim().is_empty()).collect();
    let Some((header, bet_lines)) = lines.split_first() else {
        return Ok(ParsedPayload::Empty);
    };

    let header_parts: Vec<&str> = header.split(FIELD_SEPARATOR).collect();
    if header_parts.len() != 2 {
        return Err(LottoError::Parse(format!(
            "invalid batch header format: got {header:?}"
        )));
    }
    let agency_str = header_parts[0].trim();
    let count_str = header_parts[1].trim();
    if agency_str.is_empty() {
        return Err(LottoError::Parse("batch header agency is empty".into()));
    }
    let agency_id: u32 = agency_str
        .parse()
        .map_err(|_| LottoError::Parse(format!("batch header agency is not numeric: {agency_str:?}")))?;
    let expected_count: usize = count_str
        .parse()
        .map_err(|_| LottoError::Parse(format!("batch header count is not numeric: {count_str:?}")))?;

    if bet_lines.len() != expected_count {
        return Err(LottoError::Parse(format!(
            "batch size mismatch: header says {expected_count}, but received {}",
            bet_lines.len()
        )));
    }

    let mut bets = Vec::with_capacity(bet_lines.len());
    for line in bet_lines {
        let fields: Vec<&str> = line.trim().split(FIELD_SEPARATOR).collect();
        if fields.len() != 5 {
            return Err(LottoError::Parse(format!(
                "invalid bet format: expected 5 fields in line {line:?}"
            )));
        }
        let number: u64 = fields[4]
            .trim()
            .parse()
            .map_err(|_| LottoError::Parse(format!("bet number is not an integer: {:?}", fields[4])))?;
        bets.push(Bet {
            agency: agency_id,
            first_name: fields[0].trim().to_string(),
            last_name: fields[1].trim().to_string(),
            document: fields[2].trim().to_string(),
            birthdate: fields[3].trim().to_string(),
            number,
        });
    }

    Ok(ParsedPayload::Batch(Batch { agency_id, bets }))
}
