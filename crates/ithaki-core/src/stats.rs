//! Timed measurement loops
//!
//! Both loops repeat a request/response exchange until a wall-clock window
//! has elapsed, recording one [`StatsRecord`] per iteration:
//!
//! - **Echo**: latency of every echo packet, measured from the request being
//!   written to the full packet being framed.
//! - **ARQ**: packets are checked against their FCS. A corrupt packet is
//!   requested again with a NACK; latency of a packet is measured from the
//!   first ACK that asked for it, so retries are included.
//!
//! Neither loop has an iteration or failure cap. The window is checked before
//! each iteration only, so the loop never stops early.

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::time::{Duration, Instant};

use crate::arq;
use crate::protocol::{ProtocolError, Request, Session, PACKET_TERMINATOR};

/// Default measurement window
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(6 * 60);

/// Source of monotonic time for measurement windows and latencies
pub trait Clock {
    fn now(&self) -> Instant;
}

/// The system monotonic clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that advances by a fixed step every time it is read.
///
/// Makes window expiry and latencies deterministic in simulations and tests.
#[derive(Debug)]
pub struct ManualClock {
    current: Cell<Instant>,
    step: Duration,
}

impl ManualClock {
    pub fn new(step: Duration) -> Self {
        Self {
            current: Cell::new(Instant::now()),
            step,
        }
    }

    /// Move the clock forward without reading it
    pub fn advance(&self, by: Duration) {
        self.current.set(self.current.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let now = self.current.get();
        self.current.set(now + self.step);
        now
    }
}

/// Which loop produced a set of records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsKind {
    Echo,
    Arq,
}

/// Result of one iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Packet received (and valid, for ARQ)
    Delivered { latency_ms: u64 },
    /// ARQ packet failed its checksum
    Failed,
}

/// One row of a measurement run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsRecord {
    /// Packet sequence number, starting at 1
    pub sequence: u32,
    pub outcome: Outcome,
    /// ARQ only: failed attempts of this packet so far
    pub fail_count: Option<u32>,
    /// Response text with surrounding whitespace removed
    pub message: String,
}

impl StatsRecord {
    pub fn latency(&self) -> Option<Duration> {
        match self.outcome {
            Outcome::Delivered { latency_ms } => Some(Duration::from_millis(latency_ms)),
            Outcome::Failed => None,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn trimmed_text(message: &[u8]) -> String {
    String::from_utf8_lossy(message).trim().to_string()
}

/// Aggregate figures of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    pub iterations: usize,
    pub delivered: usize,
    pub failed: usize,
    pub min_latency_ms: Option<u64>,
    pub max_latency_ms: Option<u64>,
    pub mean_latency_ms: Option<f64>,
}

/// Records of one measurement run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub kind: StatsKind,
    pub records: Vec<StatsRecord>,
}

impl Statistics {
    pub fn new(kind: StatsKind) -> Self {
        Self {
            kind,
            records: Vec::new(),
        }
    }

    pub fn summary(&self) -> StatsSummary {
        let latencies: Vec<u64> = self
            .records
            .iter()
            .filter_map(|r| match r.outcome {
                Outcome::Delivered { latency_ms } => Some(latency_ms),
                Outcome::Failed => None,
            })
            .collect();

        let mean_latency_ms = if latencies.is_empty() {
            None
        } else {
            Some(latencies.iter().sum::<u64>() as f64 / latencies.len() as f64)
        };

        StatsSummary {
            iterations: self.records.len(),
            delivered: latencies.len(),
            failed: self.records.len() - latencies.len(),
            min_latency_ms: latencies.iter().copied().min(),
            max_latency_ms: latencies.iter().copied().max(),
            mean_latency_ms,
        }
    }
}

/// Run the echo loop until `window` has elapsed
pub fn collect_echo(
    session: &mut Session,
    echo: &Request,
    window: Duration,
    clock: &dyn Clock,
) -> Result<Statistics, ProtocolError> {
    let mut stats = Statistics::new(StatsKind::Echo);
    let start = clock.now();
    let mut sequence = 0u32;

    while clock.now().duration_since(start) < window {
        sequence += 1;
        let sent_at = clock.now();
        let response = session.exchange(echo, PACKET_TERMINATOR)?;
        let latency = clock.now().duration_since(sent_at);

        let message = trimmed_text(&response);
        tracing::debug!(sequence, latency_ms = millis(latency), %message, "echo packet");

        stats.records.push(StatsRecord {
            sequence,
            outcome: Outcome::Delivered {
                latency_ms: millis(latency),
            },
            fail_count: None,
            message,
        });
    }

    Ok(stats)
}

/// State of the ARQ loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArqState {
    /// Last packet was valid (or none yet): ACK and move to a new packet
    AwaitingNewPacket,
    /// Last packet was corrupt: NACK and get the same packet again
    Retrying,
}

/// ARQ bookkeeping: packet counter, failure streak, first-attempt timestamp
#[derive(Debug, Clone)]
pub struct ArqTracker {
    state: ArqState,
    sequence: u32,
    fails: u32,
    first_attempt: Option<Instant>,
}

impl Default for ArqTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ArqTracker {
    pub fn new() -> Self {
        Self {
            state: ArqState::AwaitingNewPacket,
            sequence: 0,
            fails: 0,
            first_attempt: None,
        }
    }

    pub fn state(&self) -> ArqState {
        self.state
    }

    /// Sequence number of the packet being requested
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Failed attempts of the current packet
    pub fn fails(&self) -> u32 {
        self.fails
    }

    /// Note that a request is about to go out.
    ///
    /// A new packet (ACK) bumps the sequence number and restarts the latency
    /// clock; a retry (NACK) leaves both untouched.
    pub fn begin_attempt(&mut self, now: Instant) {
        if self.state == ArqState::AwaitingNewPacket {
            self.sequence += 1;
            self.first_attempt = Some(now);
        }
    }

    /// Apply the validation outcome of the response and build its record
    pub fn complete_attempt(&mut self, valid: bool, now: Instant, message: String) -> StatsRecord {
        if valid {
            let latency = self
                .first_attempt
                .map(|first| now.duration_since(first))
                .unwrap_or_default();
            let record = StatsRecord {
                sequence: self.sequence,
                outcome: Outcome::Delivered {
                    latency_ms: millis(latency),
                },
                fail_count: Some(self.fails),
                message,
            };
            self.fails = 0;
            self.state = ArqState::AwaitingNewPacket;
            record
        } else {
            self.fails += 1;
            self.state = ArqState::Retrying;
            StatsRecord {
                sequence: self.sequence,
                outcome: Outcome::Failed,
                fail_count: Some(self.fails),
                message,
            }
        }
    }
}

/// Run the ARQ loop until `window` has elapsed
pub fn collect_arq(
    session: &mut Session,
    ack: &Request,
    nack: &Request,
    window: Duration,
    clock: &dyn Clock,
) -> Result<Statistics, ProtocolError> {
    let mut stats = Statistics::new(StatsKind::Arq);
    let mut tracker = ArqTracker::new();
    let start = clock.now();

    while clock.now().duration_since(start) < window {
        let request = match tracker.state() {
            ArqState::AwaitingNewPacket => ack,
            ArqState::Retrying => nack,
        };
        tracker.begin_attempt(clock.now());

        let response = session.exchange(request, PACKET_TERMINATOR)?;
        let valid = arq::is_valid(&response)?;
        let record = tracker.complete_attempt(valid, clock.now(), trimmed_text(&response));

        if valid {
            tracing::debug!(
                sequence = record.sequence,
                latency_ms = ?record.latency().map(millis),
                "ARQ packet delivered"
            );
        } else {
            tracing::warn!(
                sequence = record.sequence,
                fails = tracker.fails(),
                "ARQ packet failed checksum, requesting again"
            );
        }
        stats.records.push(record);
    }

    Ok(stats)
}
