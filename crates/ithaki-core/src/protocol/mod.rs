//! Station Protocol Communication
//!
//! Implements the terminator-framed ASCII protocol spoken by the Ithaki station.
//!
//! Every request is a fixed five character code, optionally followed by
//! parameters, and terminated with a carriage return. Responses are read one
//! byte at a time until a known terminator sequence shows up.

pub mod channel;
pub mod commands;
mod error;
pub mod framer;
pub mod serial;
mod session;

pub use channel::{Channel, ChannelFactory, SerialChannel, TcpChannel};
pub use commands::{Request, RequestCode, RequestCodes, RequestKind};
pub use error::ProtocolError;
pub use framer::read_until;
pub use serial::{list_ports, PortInfo};
pub use session::{Session, SessionConfig};

/// Default bit rate for the station link
pub const DEFAULT_BAUD_RATE: u32 = 80_000;

/// Default channel read timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Name of the station link opened by every session
pub const DEFAULT_LINK_NAME: &str = "ithaki";

/// Last bytes of the connection banner sent after the link opens
pub const GREETING_TERMINATOR: &[u8] = b"tested.\r\n\n\n";

/// Terminator of echo and ARQ packets
pub const PACKET_TERMINATOR: &[u8] = b"PSTOP";

/// First line of a GPS track response
pub const GPS_START_MARKER: &str = "START ITHAKI GPS TRACKING\r\n";

/// Last line of a GPS track response
pub const GPS_STOP_MARKER: &str = "STOP ITHAKI GPS TRACKING\r\n";
