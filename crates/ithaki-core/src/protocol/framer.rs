//! Terminator-based message framing
//!
//! The station does not length-prefix its responses. A message ends where a
//! known terminator sequence appears, so the framer reads one byte at a time
//! and stops at the first complete occurrence of the terminator.

use super::{Channel, ProtocolError};

/// Read from `channel` until the accumulated bytes contain `terminator`.
///
/// Returns everything read, terminator included. Since the buffer grows one
/// byte per read, the first occurrence always ends at the newest byte, which
/// makes the result the shortest prefix of the stream that ends with the
/// terminator. An empty terminator matches immediately and reads nothing.
///
/// Blocks until the terminator arrives; the only way out otherwise is a read
/// error (including the channel's own timeout), which is returned as is.
pub fn read_until(channel: &mut dyn Channel, terminator: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let mut message = Vec::new();
    if terminator.is_empty() {
        return Ok(message);
    }

    loop {
        message.push(channel.read_byte()?);
        if message.ends_with(terminator) {
            return Ok(message);
        }
    }
}
