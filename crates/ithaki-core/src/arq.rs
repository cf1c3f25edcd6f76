//! ARQ packet validation
//!
//! An ARQ packet looks like
//!
//! ```text
//! PSTART 18-10-2026 12:00:00 01 <held message 16c> 123 PSTOP
//! ```
//!
//! The leading part varies in length, so both fields are located by their
//! distance from the end of the packet. The frame check sequence (FCS) is the
//! XOR of the held message's character codes, written as three decimal digits.

use crate::protocol::ProtocolError;

/// Held message starts this many bytes before the end of the packet
pub const HELD_MESSAGE_START_FROM_END: usize = 27;

/// Held message ends this many bytes before the end of the packet
pub const HELD_MESSAGE_END_FROM_END: usize = 11;

/// Length of the held message
pub const HELD_MESSAGE_LEN: usize = HELD_MESSAGE_START_FROM_END - HELD_MESSAGE_END_FROM_END;

/// FCS starts this many bytes before the end of the packet
pub const FCS_START_FROM_END: usize = 9;

/// FCS ends this many bytes before the end of the packet
pub const FCS_END_FROM_END: usize = 6;

/// Length of the FCS field
pub const FCS_LEN: usize = FCS_START_FROM_END - FCS_END_FROM_END;

/// Shortest packet both fields can be extracted from
pub const MIN_ARQ_PACKET_LEN: usize = HELD_MESSAGE_START_FROM_END;

/// XOR of all character codes
pub fn checksum(held_message: &[u8]) -> u32 {
    held_message
        .iter()
        .fold(0u32, |acc, &byte| acc ^ u32::from(byte))
}

/// Fields of an ARQ packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArqFrame<'a> {
    held_message: &'a [u8],
    fcs: u32,
}

impl<'a> ArqFrame<'a> {
    /// Extract the held message and FCS from a framed packet
    pub fn parse(packet: &'a [u8]) -> Result<Self, ProtocolError> {
        let len = packet.len();
        if len < MIN_ARQ_PACKET_LEN {
            return Err(ProtocolError::MessageTooShort {
                required: MIN_ARQ_PACKET_LEN,
                actual: len,
            });
        }

        let held_message = &packet[len - HELD_MESSAGE_START_FROM_END..len - HELD_MESSAGE_END_FROM_END];
        let fcs_field = &packet[len - FCS_START_FROM_END..len - FCS_END_FROM_END];

        if !fcs_field.iter().all(u8::is_ascii_digit) {
            return Err(ProtocolError::InvalidChecksumField(
                String::from_utf8_lossy(fcs_field).into_owned(),
            ));
        }
        let fcs = fcs_field
            .iter()
            .fold(0u32, |acc, &d| acc * 10 + u32::from(d - b'0'));

        Ok(Self { held_message, fcs })
    }

    pub fn held_message(&self) -> &'a [u8] {
        self.held_message
    }

    /// Checksum declared by the station
    pub fn fcs(&self) -> u32 {
        self.fcs
    }

    /// Checksum recomputed from the held message
    pub fn computed_checksum(&self) -> u32 {
        checksum(self.held_message)
    }

    pub fn is_valid(&self) -> bool {
        self.computed_checksum() == self.fcs
    }
}

/// Whether the packet's held message matches its FCS
pub fn is_valid(packet: &[u8]) -> Result<bool, ProtocolError> {
    ArqFrame::parse(packet).map(|frame| frame.is_valid())
}
