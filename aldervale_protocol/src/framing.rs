// Length-delimited message framing over TCP.
//
// Wire format: a 4-byte big-endian length prefix followed by a JSON payload.
// Raw JSON concatenation (splitting the stream on `}{`) is not a framing
// scheme — it corrupts any payload containing that substring, cannot survive a
// message split across two reads, and misparses back-to-back arrivals. The
// length prefix handles all three.
//
// Two consumption styles:
// - `write_frame` / `read_frame` operate blocking on any `Write`/`Read`; the
//   caller handles JSON serialization separately, keeping them format-agnostic.
// - `FrameDecoder` is the incremental path for connection reader loops: feed
//   it whatever the socket returned, pull zero or more complete messages out.
//   A frame that fails JSON parsing poisons only itself; the stream stays
//   aligned and later frames decode normally.
//
// A `MAX_FRAME_SIZE` constant protects against unbounded allocation from
// malformed or hostile length prefixes. GAME_STATE snapshots grow with the
// connected population but stay far below 1 MB for any plausible one.

use std::io::{self, Read, Write};

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Maximum allowed frame payload size (1 MB). Protects against unbounded
/// allocation from malformed length prefixes.
pub const MAX_FRAME_SIZE: u32 = 1024 * 1024;

/// A frame-level decode failure. Affects exactly one frame; the connection
/// and the decoder remain usable afterwards.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Declared payload length exceeds `MAX_FRAME_SIZE`. The decoder discards
    /// the payload bytes as they arrive, preserving stream alignment.
    #[error("frame too large: {len} bytes (max {MAX_FRAME_SIZE})")]
    FrameTooLarge { len: u32 },
    /// Payload was not valid JSON for the expected message type.
    #[error("malformed frame payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Write a length-delimited frame: 4-byte big-endian length, then payload.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    let len = payload.len();
    if len > MAX_FRAME_SIZE as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("frame too large: {len} bytes (max {MAX_FRAME_SIZE})"),
        ));
    }
    #[expect(clippy::cast_possible_truncation)]
    let len_bytes = (len as u32).to_be_bytes();
    writer.write_all(&len_bytes)?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Read a length-delimited frame: 4-byte big-endian length, then payload.
///
/// Returns `UnexpectedEof` if the stream closes cleanly before or during a
/// frame. Returns `InvalidData` if the length exceeds `MAX_FRAME_SIZE`.
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {len} bytes (max {MAX_FRAME_SIZE})"),
        ));
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Incremental frame decoder for one connection.
///
/// Owns a growing byte buffer; `extend` appends whatever a socket read
/// returned (any split point is fine, including mid-prefix), and `next_frame`
/// extracts one complete payload whenever at least `4 + length` bytes are
/// buffered, dropping the consumed bytes from the front. Bytes belonging to an
/// incomplete frame stay buffered until the rest arrives.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    /// Remaining payload bytes of an oversized frame still to be swallowed.
    discard: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly read bytes to the decode buffer.
    pub fn extend(&mut self, bytes: &[u8]) {
        let mut bytes = bytes;
        if self.discard > 0 {
            let n = self.discard.min(bytes.len());
            self.discard -= n;
            bytes = &bytes[n..];
        }
        self.buf.extend_from_slice(bytes);
    }

    /// Extract the next complete frame payload, if one is buffered.
    ///
    /// `Ok(None)` means more bytes are needed. An oversized declared length
    /// yields `ProtocolError::FrameTooLarge` once and schedules that frame's
    /// payload bytes for discard; decoding resumes at the following frame.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
        if self.buf.len() < 4 {
            return Ok(None);
        }
        let len = u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]);
        if len > MAX_FRAME_SIZE {
            let available = self.buf.len() - 4;
            let skip = (len as usize).min(available);
            self.buf.drain(..4 + skip);
            self.discard = len as usize - skip;
            return Err(ProtocolError::FrameTooLarge { len });
        }
        let total = 4 + len as usize;
        if self.buf.len() < total {
            return Ok(None);
        }
        let payload = self.buf[4..total].to_vec();
        self.buf.drain(..total);
        Ok(Some(payload))
    }

    /// Extract and JSON-decode the next complete message, if one is buffered.
    ///
    /// A payload that is not valid JSON for `T` consumes that frame and
    /// returns `ProtocolError::Malformed`; the next call continues with the
    /// following frame.
    pub fn next_message<T: DeserializeOwned>(&mut self) -> Result<Option<T>, ProtocolError> {
        match self.next_frame()? {
            None => Ok(None),
            Some(payload) => Ok(Some(serde_json::from_slice(&payload)?)),
        }
    }

    /// Number of bytes currently buffered (incomplete frame remainder).
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}
