//! Length-prefixed envelope framing.
//!
//! Wire layout per frame:
//!
//! ```text
//! ┌──────────────────┬─────────────────────┐
//! │ Length (4 bytes) │ Envelope bytes      │
//! │ Big-endian u32   │ (variable size)     │
//! └──────────────────┴─────────────────────┘
//! ```
//!
//! The reader tolerates arbitrary TCP segmentation: bytes accumulate in a
//! reassembly buffer and complete frames are peeled off as they fill in.

use crate::{connection::error::TransportError, messages::envelope::Envelope};

pub const LENGTH_PREFIX_BYTES: usize = 4;

/// Append one framed envelope to `out`.
///
/// Fails without touching the wire if the encoded envelope would exceed
/// `max_frame` bytes.
pub fn encode_into(
    envelope: &Envelope,
    max_frame: usize,
    out: &mut Vec<u8>,
) -> Result<(), TransportError> {
    let bytes = envelope.encode()?;
    if bytes.len() > max_frame {
        return Err(TransportError::FrameTooLarge {
            size: bytes.len(),
            limit: max_frame,
        });
    }
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(&bytes);
    Ok(())
}

/// Reassembles framed envelopes from an arbitrarily-segmented byte stream
pub struct FrameReader {
    buffer: Vec<u8>,
    max_frame: usize,
}

impl FrameReader {
    pub fn new(max_frame: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            max_frame,
        }
    }

    /// Feed freshly-read socket bytes into the reassembly buffer
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Pop the next complete envelope, if one has fully arrived.
    ///
    /// An oversized length prefix or an undecodable body is unrecoverable —
    /// the stream has lost framing and the connection must drop.
    pub fn next_envelope(&mut self) -> Result<Option<Envelope>, TransportError> {
        if self.buffer.len() < LENGTH_PREFIX_BYTES {
            return Ok(None);
        }
        let mut prefix = [0u8; LENGTH_PREFIX_BYTES];
        prefix.copy_from_slice(&self.buffer[..LENGTH_PREFIX_BYTES]);
        let length = u32::from_be_bytes(prefix) as usize;

        if length > self.max_frame {
            return Err(TransportError::FrameTooLarge {
                size: length,
                limit: self.max_frame,
            });
        }
        if self.buffer.len() < LENGTH_PREFIX_BYTES + length {
            return Ok(None);
        }

        let envelope = Envelope::decode(&self.buffer[LENGTH_PREFIX_BYTES..LENGTH_PREFIX_BYTES + length])?;
        self.buffer.drain(..LENGTH_PREFIX_BYTES + length);
        Ok(Some(envelope))
    }

    /// Drop any partially-assembled bytes (used when a connection resets)
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
