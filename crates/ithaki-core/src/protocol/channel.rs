//! Byte-level communication channels
//!
//! A [`Channel`] is the transport a [`Session`](super::Session) drives. It is
//! configured (speed, timeout) before it is opened and delivers one byte per
//! read. Reads block until a byte arrives or the configured timeout expires.

use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use super::serial::{configure_port, open_port};
use super::{ProtocolError, DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT_MS};

/// Abstraction over the station link (serial port, TCP socket or simulator)
pub trait Channel: Send {
    /// Set the bit rate used when the link is opened
    fn set_speed(&mut self, baud_rate: u32) -> Result<(), ProtocolError>;

    /// Set the timeout applied to every read
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), ProtocolError>;

    /// Open the named link
    fn open(&mut self, name: &str) -> Result<(), ProtocolError>;

    /// Read a single byte, blocking until one arrives or the timeout expires
    fn read_byte(&mut self) -> Result<u8, ProtocolError>;

    /// Write the whole buffer to the link
    fn write_all(&mut self, data: &[u8]) -> Result<(), ProtocolError>;

    /// Close the link
    fn close(&mut self) -> Result<(), ProtocolError>;

    /// Whether the link is currently open
    fn is_open(&self) -> bool;
}

/// Creates a fresh, unopened channel for every session
pub trait ChannelFactory {
    fn create(&self) -> Box<dyn Channel>;
}

impl<F> ChannelFactory for F
where
    F: Fn() -> Box<dyn Channel>,
{
    fn create(&self) -> Box<dyn Channel> {
        self()
    }
}

fn map_read_error(e: io::Error) -> ProtocolError {
    match e.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ProtocolError::Timeout,
        _ => ProtocolError::IoError(e),
    }
}

/// Serial port channel
pub struct SerialChannel {
    port: Option<Box<dyn SerialPort>>,
    baud_rate: u32,
    timeout: Duration,
}

impl SerialChannel {
    pub fn new() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl Default for SerialChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Channel for SerialChannel {
    fn set_speed(&mut self, baud_rate: u32) -> Result<(), ProtocolError> {
        self.baud_rate = baud_rate;
        if let Some(port) = self.port.as_mut() {
            port.set_baud_rate(baud_rate)?;
        }
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), ProtocolError> {
        self.timeout = timeout;
        if let Some(port) = self.port.as_mut() {
            port.set_timeout(timeout)?;
        }
        Ok(())
    }

    fn open(&mut self, name: &str) -> Result<(), ProtocolError> {
        if self.port.is_some() {
            return Err(ProtocolError::AlreadyConnected);
        }
        let mut port = open_port(name, self.baud_rate, self.timeout)?;
        configure_port(port.as_mut())?;
        self.port = Some(port);
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, ProtocolError> {
        let port = self.port.as_mut().ok_or(ProtocolError::NotConnected)?;
        let mut buf = [0u8; 1];
        match port.read(&mut buf) {
            Ok(0) => Err(ProtocolError::ChannelClosed),
            Ok(_) => Ok(buf[0]),
            Err(e) => Err(map_read_error(e)),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        let port = self.port.as_mut().ok_or(ProtocolError::NotConnected)?;
        port.write_all(data)?;
        port.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), ProtocolError> {
        // Dropping the handle releases the device
        self.port.take().ok_or(ProtocolError::NotConnected)?;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }
}

/// TCP channel, for stations reachable through a `host:port` bridge
///
/// The bit rate is recorded but has no effect on a socket.
pub struct TcpChannel {
    stream: Option<TcpStream>,
    baud_rate: u32,
    timeout: Duration,
}

impl TcpChannel {
    pub fn new() -> Self {
        Self {
            stream: None,
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    /// Bit rate requested by the session
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

impl Default for TcpChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Channel for TcpChannel {
    fn set_speed(&mut self, baud_rate: u32) -> Result<(), ProtocolError> {
        self.baud_rate = baud_rate;
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), ProtocolError> {
        self.timeout = timeout;
        if let Some(stream) = self.stream.as_ref() {
            stream.set_read_timeout(Some(timeout))?;
            stream.set_write_timeout(Some(timeout))?;
        }
        Ok(())
    }

    fn open(&mut self, name: &str) -> Result<(), ProtocolError> {
        if self.stream.is_some() {
            return Err(ProtocolError::AlreadyConnected);
        }
        let stream = TcpStream::connect(name)
            .map_err(|e| ProtocolError::ConnectionFailed(format!("{}: {}", name, e)))?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;
        stream.set_nodelay(true)?;
        self.stream = Some(stream);
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, ProtocolError> {
        let stream = self.stream.as_mut().ok_or(ProtocolError::NotConnected)?;
        let mut buf = [0u8; 1];
        match stream.read(&mut buf) {
            Ok(0) => Err(ProtocolError::ChannelClosed),
            Ok(_) => Ok(buf[0]),
            Err(e) => Err(map_read_error(e)),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        let stream = self.stream.as_mut().ok_or(ProtocolError::NotConnected)?;
        stream.write_all(data)?;
        stream.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), ProtocolError> {
        let stream = self.stream.take().ok_or(ProtocolError::NotConnected)?;
        // The peer may already have hung up
        let _ = stream.shutdown(std::net::Shutdown::Both);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}
