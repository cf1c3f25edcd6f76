//! # Ithaki Core Library
//!
//! Core functionality for talking to the Ithaki network station.

#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Byte channels to the station (serial, TCP, simulated)
//! - Message framing and per-operation sessions
//! - ARQ checksum validation
//! - GPS track sampling and pin encoding
//! - Echo and ARQ latency statistics
//! - Camera and map image retrieval
//!
//! ## Example
//!
//! ```rust,no_run
//! use ithaki_core::prelude::*;
//!
//! let mut config = ClientConfig::default();
//! config.connection.transport = Transport::Demo;
//! config.measurement.window_secs = 5;
//!
//! let client = Client::from_config(config);
//! let echo = client.echo_statistics()?;
//! println!("{} packets", echo.data.records.len());
//! # Ok::<(), ithaki_core::protocol::ProtocolError>(())
//! ```

pub mod arq;
pub mod client;
pub mod config;
pub mod demo;
pub mod gps;
pub mod image;
pub mod protocol;
pub mod report;
pub mod stats;

#[cfg(test)]
mod test_support;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::client::{Client, GpsTrack, OperationReport, TransportFactory};
    pub use crate::config::{ClientConfig, ConfigError, Transport};
    pub use crate::demo::DemoStation;
    pub use crate::gps::{GpsSample, Pin};
    pub use crate::image::ImageKind;
    pub use crate::protocol::{
        Channel, ChannelFactory, ProtocolError, Request, RequestCode, RequestKind, Session,
        SessionConfig,
    };
    pub use crate::report::{OperationSummary, RunSummary};
    pub use crate::stats::{Clock, ManualClock, Statistics, StatsKind, StatsRecord, SystemClock};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
