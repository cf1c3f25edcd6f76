//! Scripted channel used by the unit tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::protocol::{Channel, ProtocolError};

#[derive(Debug, Default)]
pub(crate) struct MockState {
    pub incoming: VecDeque<u8>,
    pub written: Vec<u8>,
    pub requests: Vec<String>,
    pub responses: VecDeque<Vec<u8>>,
    pub fallback: Option<Vec<u8>>,
    pub pending: Vec<u8>,
    pub open: bool,
    pub speed: Option<u32>,
    pub timeout: Option<Duration>,
    pub link: Option<String>,
    pub close_count: usize,
}

/// Channel fed from a byte script; each `\r`-terminated request queues the
/// next scripted response (or the fallback once the script runs out)
pub(crate) struct MockChannel {
    state: Arc<Mutex<MockState>>,
}

impl MockChannel {
    pub fn with_incoming(bytes: &[u8]) -> Self {
        let state = MockState {
            incoming: bytes.iter().copied().collect(),
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn respond_with(self, response: &[u8]) -> Self {
        self.state
            .lock()
            .unwrap()
            .responses
            .push_back(response.to_vec());
        self
    }

    pub fn respond_always(self, response: &[u8]) -> Self {
        self.state.lock().unwrap().fallback = Some(response.to_vec());
        self
    }

    pub fn probe(&self) -> Arc<Mutex<MockState>> {
        Arc::clone(&self.state)
    }

    pub fn remaining(&self) -> Vec<u8> {
        self.state.lock().unwrap().incoming.iter().copied().collect()
    }
}

impl Channel for MockChannel {
    fn set_speed(&mut self, baud_rate: u32) -> Result<(), ProtocolError> {
        self.state.lock().unwrap().speed = Some(baud_rate);
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), ProtocolError> {
        self.state.lock().unwrap().timeout = Some(timeout);
        Ok(())
    }

    fn open(&mut self, name: &str) -> Result<(), ProtocolError> {
        let mut state = self.state.lock().unwrap();
        if state.open {
            return Err(ProtocolError::AlreadyConnected);
        }
        state.open = true;
        state.link = Some(name.to_string());
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, ProtocolError> {
        self.state
            .lock()
            .unwrap()
            .incoming
            .pop_front()
            .ok_or(ProtocolError::Timeout)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        let mut state = self.state.lock().unwrap();
        state.written.extend_from_slice(data);
        for &byte in data {
            if byte != b'\r' {
                state.pending.push(byte);
                continue;
            }
            let request = String::from_utf8_lossy(&state.pending).into_owned();
            state.pending.clear();
            state.requests.push(request);
            let response = state.responses.pop_front().or_else(|| state.fallback.clone());
            if let Some(response) = response {
                state.incoming.extend(response);
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), ProtocolError> {
        let mut state = self.state.lock().unwrap();
        if !state.open {
            return Err(ProtocolError::NotConnected);
        }
        state.open = false;
        state.close_count += 1;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.lock().unwrap().open
    }
}
