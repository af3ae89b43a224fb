//! Wire framing for the lottery intake protocol.
//!
//! Every message on the wire is an 8-byte zero-padded ASCII decimal length
//! header followed by exactly that many payload bytes:
//!
//! ```text
//! [8 ASCII digits: length][length bytes: payload]
//! ```
//!
//! Unlike a binary length prefix, the header is human-readable on the wire.
//! That's the wire format clients speak, not a stylistic choice.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{LottoError, Result};

const HEADER_LEN: usize = 8;

/// Maximum payload length accepted from a header: the full 8-digit decimal
/// ceiling, matching [`send`]'s own limit so every payload `send` will emit
/// is one `receive` will accept (spec invariant: round-trip holds for any
/// payload with `len < 10^8`). Still rejects a corrupt or hostile header
/// before it forces an unbounded allocation — a genuine peer can't declare
/// more than this without lying about its own frame.
const MAX_PAYLOAD_LEN: u64 = 99_999_999;

/// Read exactly one length-prefixed frame from `conn`.
///
/// Reads are loop-until-complete: `read_exact` accumulates partial reads
/// until the header or payload is fully received, an EOF is hit, or a
/// lower-level I/O error occurs.
///
/// # Errors
///
/// - [`LottoError::Framing`] if the 8-byte header is not ASCII decimal digits.
/// - [`LottoError::Io`] if the peer closes before the full payload arrives,
///   or on any other transport fault.
pub async fn receive<R: AsyncRead + Unpin>(conn: &mut R) -> Result<Vec<u8>> {
    let mut header = [0u8; HEADER_LEN];
    read_exact_or_short(conn, &mut header).await?;

    let header_str = std::str::from_utf8(&header)
        .map_err(|_| LottoError::Framing("length header is not valid ASCII".into()))?;
    if !header_str.bytes().all(|b| b.is_ascii_digit()) {
        return Err(LottoError::Framing(format!(
            "length header is not 8 ASCII digits: {header_str:?}"
        )));
    }
    let length: u64 = header_str
        .parse()
        .map_err(|_| LottoError::Framing(format!("length header is not decimal: {header_str:?}")))?;
    if length > MAX_PAYLOAD_LEN {
        return Err(LottoError::Framing(format!(
            "declared length {length} exceeds maximum {MAX_PAYLOAD_LEN}"
        )));
    }

    let mut payload = vec![0u8; length as usize];
    read_exact_or_short(conn, &mut payload).await?;
    Ok(payload)
}

/// Read `buf.len()` bytes, mapping an unexpected EOF to a `SHORT_READ`-style
/// `Io` error distinct from other transport faults only in its message.
async fn read_exact_or_short<R: AsyncRead + Unpin>(conn: &mut R, buf: &mut [u8]) -> Result<()> {
    match conn.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(LottoError::Io(
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "peer closed before frame complete"),
        )),
        Err(e) => Err(LottoError::Io(e)),
    }
}

/// Write one length-prefixed frame to `conn`: an 8-wide zero-padded ASCII
/// decimal length followed by `payload`, written as a single buffer so the
/// header and body can't be interleaved with another writer's frame.
///
/// # Errors
///
/// Returns [`LottoError::Io`] on any transport fault, or
/// [`LottoError::Framing`] if `payload` is too large to encode in an 8-digit
/// decimal header.
pub async fn send<W: AsyncWrite + Unpin>(conn: &mut W, payload: &[u8]) -> Result<()> {
    if payload.len() as u64 > MAX_PAYLOAD_LEN {
        return Err(LottoError::Framing(format!(
            "payload of {} bytes does not fit an 8-digit length header",
            payload.len()
        )));
    }
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(format!("{:0>8}", payload.len()).as_bytes());
    buf.extend_from_slice(payload);
    conn.write_all(&buf).await?;
    Ok(())
}
