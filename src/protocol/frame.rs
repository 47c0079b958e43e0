//! Length-prefixed framing for byte-stream transports.
//!
//! ```text
//! ┌──────────────┬──────────────────────┐
//! │ Length       │ Payload (MsgPack)    │
//! │ 4 bytes      │ `Length` bytes       │
//! │ uint32 BE    │                      │
//! └──────────────┴──────────────────────┘
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{ExchangeError, Result};

/// Length prefix size in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default maximum payload size (16 MB).
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Build a complete frame (prefix + payload) in a single buffer.
///
/// # Errors
///
/// Returns `Protocol` if the payload does not fit a `u32` length.
pub fn build_frame(payload: &[u8]) -> Result<Bytes> {
    let len = u32::try_from(payload.len()).map_err(|_| {
        ExchangeError::Protocol(format!("Payload size {} exceeds u32", payload.len()))
    })?;
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    buf.put_u32(len);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Read the payload length from a frame prefix.
///
/// Returns `None` if fewer than [`LENGTH_PREFIX_SIZE`] bytes are given.
#[inline]
pub fn decode_length(prefix: &[u8]) -> Option<u32> {
    let bytes: [u8; LENGTH_PREFIX_SIZE] = prefix.get(..LENGTH_PREFIX_SIZE)?.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}
