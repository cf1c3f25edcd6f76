//! Demo Mode - Simulated station for running without hardware
//!
//! Speaks the same protocol as the real station: greets on open, answers echo
//! requests, serves ARQ packets (a configurable share of them with a corrupt
//! FCS), GPS tracks and small JPEG images.

use chrono::Local;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::time::Duration;

use crate::arq;
use crate::image::END_OF_IMAGE;
use crate::protocol::{
    Channel, ProtocolError, RequestKind, GPS_START_MARKER, GPS_STOP_MARKER,
};

const GREETING: &str = "Welcome to the Ithaki demo station\r\nConnection tested.\r\n\n\n";

/// JPEG start-of-image marker
const START_OF_IMAGE: [u8; 2] = [0xFF, 0xD8];

/// Time of day the simulated route begins
const ROUTE_START_SECS: u32 = 12 * 3600;

/// Reference point of simulated tracks, degrees and decimal minutes
const TRACK_ORIGIN_LAT: f64 = 4037.6000;
const TRACK_ORIGIN_LON: f64 = 2257.5000;

/// Simulated station
pub struct DemoStation {
    rng: StdRng,
    corruption_rate: f64,
    open: bool,
    outgoing: VecDeque<u8>,
    pending: Vec<u8>,
    packet_counter: u32,
    arq_message: [u8; arq::HELD_MESSAGE_LEN],
}

impl Default for DemoStation {
    fn default() -> Self {
        Self::new(None, 0.2)
    }
}

impl DemoStation {
    /// Create a station; `seed` makes the generated data reproducible
    pub fn new(seed: Option<u64>, corruption_rate: f64) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            corruption_rate: corruption_rate.clamp(0.0, 1.0),
            open: false,
            outgoing: VecDeque::new(),
            pending: Vec::new(),
            packet_counter: 0,
            arq_message: [b'0'; arq::HELD_MESSAGE_LEN],
        }
    }

    fn queue(&mut self, bytes: &[u8]) {
        self.outgoing.extend(bytes.iter().copied());
    }

    fn header(&mut self) -> String {
        self.packet_counter = (self.packet_counter + 1) % 100;
        let now = Local::now();
        format!(
            "PSTART {} {:02}",
            now.format("%d-%m-%Y %H:%M:%S"),
            self.packet_counter
        )
    }

    fn echo_packet(&mut self) -> String {
        format!("{} PSTOP", self.header())
    }

    fn arq_packet(&mut self, fresh: bool) -> String {
        if fresh {
            for byte in self.arq_message.iter_mut() {
                *byte = self.rng.gen_range(b'A'..=b'Z');
            }
        }
        let mut fcs = arq::checksum(&self.arq_message);
        if self.rng.gen_bool(self.corruption_rate) {
            fcs = (fcs + self.rng.gen_range(1..256)) % 256;
        }
        format!(
            "{} <{}> {:03} PSTOP",
            self.header(),
            String::from_utf8_lossy(&self.arq_message),
            fcs
        )
    }

    /// Track for a route parameter `R=XPPPPLL`: LL samples starting PPPP
    /// seconds into the route
    fn gps_track(&self, route: &str) -> String {
        let digits = route.trim_start_matches("R=");
        let (start, count) = match (digits.get(1..5), digits.get(5..7)) {
            (Some(p), Some(l)) => (p.parse().unwrap_or(0u32), l.parse().unwrap_or(99u32)),
            _ => (0, 99),
        };

        let mut track = String::from(GPS_START_MARKER);
        for i in 0..count.max(1) {
            let t = ROUTE_START_SECS + start + i;
            let drift = f64::from(start + i) * 0.0011;
            track.push_str(&format!(
                "$GPGGA,{:02}{:02}{:02}.000,{:09.4},N,{:010.4},E,1,08,0.9,57.0,M,36.1,M,,0000*00\r\n",
                t / 3600,
                t / 60 % 60,
                t % 60,
                TRACK_ORIGIN_LAT + drift,
                TRACK_ORIGIN_LON + drift * 1.5,
            ));
        }
        track.push_str(GPS_STOP_MARKER);
        track
    }

    fn image(&mut self, size: usize) -> Vec<u8> {
        let mut image = START_OF_IMAGE.to_vec();
        for _ in 0..size {
            // Avoid emitting the end marker early
            image.push(self.rng.gen_range(0x00..0xFF));
        }
        image.extend_from_slice(&END_OF_IMAGE);
        image
    }

    fn respond(&mut self, request: &str) {
        let kind = request.chars().next().and_then(RequestKind::from_letter);
        let parameters = request.get(5..).unwrap_or("");
        tracing::trace!(request, ?kind, "demo station request");

        match kind {
            Some(RequestKind::Echo) => {
                let packet = self.echo_packet();
                self.queue(packet.as_bytes());
            }
            Some(RequestKind::Ack) => {
                let packet = self.arq_packet(true);
                self.queue(packet.as_bytes());
            }
            Some(RequestKind::Nack) => {
                let packet = self.arq_packet(false);
                self.queue(packet.as_bytes());
            }
            Some(RequestKind::Gps) if parameters.starts_with("R=") => {
                let track = self.gps_track(parameters);
                self.queue(track.as_bytes());
            }
            Some(RequestKind::Gps) => {
                let pins = parameters.matches("T=").count();
                let image = self.image(512 + 64 * pins);
                self.queue(&image);
            }
            Some(RequestKind::Image) | Some(RequestKind::DamagedImage) => {
                let image = self.image(2048);
                self.queue(&image);
            }
            None => tracing::warn!(request, "demo station ignoring unknown request"),
        }
    }
}

impl Channel for DemoStation {
    fn set_speed(&mut self, _baud_rate: u32) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn set_timeout(&mut self, _timeout: Duration) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn open(&mut self, _name: &str) -> Result<(), ProtocolError> {
        if self.open {
            return Err(ProtocolError::AlreadyConnected);
        }
        self.open = true;
        self.queue(GREETING.as_bytes());
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, ProtocolError> {
        if !self.open {
            return Err(ProtocolError::NotConnected);
        }
        // Nothing queued means the real station would stay silent
        self.outgoing.pop_front().ok_or(ProtocolError::Timeout)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        if !self.open {
            return Err(ProtocolError::NotConnected);
        }
        for &byte in data {
            if byte == b'\r' {
                let request = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                self.respond(&request);
            } else {
                self.pending.push(byte);
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), ProtocolError> {
        if !self.open {
            return Err(ProtocolError::NotConnected);
        }
        self.open = false;
        self.outgoing.clear();
        self.pending.clear();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
