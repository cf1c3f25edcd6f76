//! Protocol errors

use thiserror::Error;

/// Errors that can occur while talking to the station
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Serial port error: {0}")]
    SerialError(String),

    #[error("Channel read timed out")]
    Timeout,

    #[error("Channel is not open")]
    NotConnected,

    #[error("Channel already open")]
    AlreadyConnected,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Channel closed by peer")]
    ChannelClosed,

    #[error("Invalid request code '{code}': {reason}")]
    InvalidRequestCode { code: String, reason: &'static str },

    #[error("Message too short: need at least {required} bytes, got {actual}")]
    MessageTooShort { required: usize, actual: usize },

    #[error("Invalid checksum field '{0}'")]
    InvalidChecksumField(String),

    #[error("Malformed GPS sample on line {line}: {reason}")]
    MalformedSample { line: usize, reason: String },

    #[error("GPS track contains no samples")]
    EmptyTrack,

    #[error("Port not found: {0}")]
    PortNotFound(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<serialport::Error> for ProtocolError {
    fn from(e: serialport::Error) -> Self {
        match e.kind() {
            serialport::ErrorKind::NoDevice => ProtocolError::PortNotFound(e.to_string()),
            _ => ProtocolError::SerialError(e.to_string()),
        }
    }
}
