//! Session management
//!
//! A session owns one channel for the duration of one top-level operation.
//! The station link misbehaves when a handle is reused across unrelated
//! operations, so every operation establishes its own session and the channel
//! is closed exactly once when the session ends.

use std::time::Duration;

use super::{
    framer, Channel, ProtocolError, Request, DEFAULT_BAUD_RATE, DEFAULT_LINK_NAME,
    DEFAULT_TIMEOUT_MS, GREETING_TERMINATOR,
};

/// Settings applied to every freshly created channel
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Link name passed to [`Channel::open`]
    pub link: String,
    /// Bit rate
    pub baud_rate: u32,
    /// Read timeout
    pub timeout: Duration,
    /// Terminator of the connection banner
    pub greeting_terminator: Vec<u8>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            link: DEFAULT_LINK_NAME.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            greeting_terminator: GREETING_TERMINATOR.to_vec(),
        }
    }
}

/// An established session with the station
pub struct Session {
    channel: Box<dyn Channel>,
    closed: bool,
    tx_bytes: u64,
    rx_bytes: u64,
    tx_requests: u64,
}

impl Session {
    /// Configure and open `channel`, then consume the connection banner.
    ///
    /// On success the next byte read is the first byte of a protocol
    /// response. If the banner cannot be read the channel is closed before
    /// the error is returned.
    pub fn establish(
        mut channel: Box<dyn Channel>,
        config: &SessionConfig,
    ) -> Result<Self, ProtocolError> {
        channel.set_speed(config.baud_rate)?;
        channel.set_timeout(config.timeout)?;
        channel.open(&config.link)?;

        let mut session = Self {
            channel,
            closed: false,
            tx_bytes: 0,
            rx_bytes: 0,
            tx_requests: 0,
        };

        match session.read_until(&config.greeting_terminator) {
            Ok(banner) => {
                tracing::debug!(
                    link = %config.link,
                    banner_len = banner.len(),
                    "session established"
                );
                Ok(session)
            }
            Err(e) => {
                if let Err(close_err) = session.shutdown() {
                    tracing::warn!("failed to close channel after banner error: {}", close_err);
                }
                Err(e)
            }
        }
    }

    /// Write a request to the station
    pub fn send(&mut self, request: &Request) -> Result<(), ProtocolError> {
        let bytes = request.to_bytes();
        tracing::trace!(request = %request, "sending request");
        self.channel.write_all(&bytes)?;
        self.tx_bytes = self.tx_bytes.saturating_add(bytes.len() as u64);
        self.tx_requests = self.tx_requests.saturating_add(1);
        Ok(())
    }

    /// Read a single byte
    pub fn read_byte(&mut self) -> Result<u8, ProtocolError> {
        let byte = self.channel.read_byte()?;
        self.rx_bytes = self.rx_bytes.saturating_add(1);
        Ok(byte)
    }

    /// Frame the next message ending with `terminator`
    pub fn read_until(&mut self, terminator: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        let message = framer::read_until(self.channel.as_mut(), terminator)?;
        self.rx_bytes = self.rx_bytes.saturating_add(message.len() as u64);
        Ok(message)
    }

    /// Send a request and frame its response
    pub fn exchange(
        &mut self,
        request: &Request,
        terminator: &[u8],
    ) -> Result<Vec<u8>, ProtocolError> {
        self.send(request)?;
        self.read_until(terminator)
    }

    /// Cumulative (tx bytes, rx bytes, tx requests)
    pub fn counters(&self) -> (u64, u64, u64) {
        (self.tx_bytes, self.rx_bytes, self.tx_requests)
    }

    /// Close the session's channel
    pub fn close(mut self) -> Result<(), ProtocolError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), ProtocolError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        tracing::debug!(
            tx_bytes = self.tx_bytes,
            rx_bytes = self.rx_bytes,
            "closing session"
        );
        self.channel.close()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!("failed to close channel: {}", e);
        }
    }
}
