//! Station client
//!
//! Runs the top-level operations against the station. Every operation opens
//! its own session, closes it once the exchange is over and only then writes
//! its result files. A failure to write a result is logged and leaves the
//! operation successful with no artifact.

use std::cell::Cell;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::{ClientConfig, DemoSettings, Transport};
use crate::demo::DemoStation;
use crate::gps::{self, GpsSample, Pin};
use crate::image::{self, ImageKind};
use crate::protocol::{
    Channel, ChannelFactory, ProtocolError, Request, RequestKind, SerialChannel, Session,
    TcpChannel, GPS_STOP_MARKER,
};
use crate::report::{self, OperationSummary, RunSummary};
use crate::stats::{self, Clock, Statistics, SystemClock};

/// File name of the GPS map image
pub const GPS_IMAGE_FILE: &str = "gpsimage.jpg";

/// Result of an operation plus the file it was saved to, if saving worked
#[derive(Debug, Clone)]
pub struct OperationReport<T> {
    pub data: T,
    pub artifact: Option<PathBuf>,
}

/// Result of GPS tracking
#[derive(Debug, Clone, PartialEq)]
pub struct GpsTrack {
    pub samples: Vec<GpsSample>,
    pub pins: Vec<Pin>,
    /// Image request encoding the pins
    pub request: Request,
}

/// Creates channels for the configured transport
pub struct TransportFactory {
    transport: Transport,
    demo: DemoSettings,
    sessions: Cell<u64>,
}

impl TransportFactory {
    pub fn new(transport: Transport, demo: DemoSettings) -> Self {
        Self {
            transport,
            demo,
            sessions: Cell::new(0),
        }
    }
}

impl ChannelFactory for TransportFactory {
    fn create(&self) -> Box<dyn Channel> {
        match self.transport {
            Transport::Serial => Box::new(SerialChannel::new()),
            Transport::Tcp => Box::new(TcpChannel::new()),
            Transport::Demo => {
                // Each session gets its own stream of data, still reproducible
                let session = self.sessions.get();
                self.sessions.set(session + 1);
                let seed = self.demo.seed.map(|seed| seed.wrapping_add(session));
                Box::new(DemoStation::new(seed, self.demo.corruption_rate))
            }
        }
    }
}

/// Client for the station
pub struct Client {
    config: ClientConfig,
    factory: Box<dyn ChannelFactory>,
    clock: Box<dyn Clock>,
}

impl Client {
    /// Client reaching the station through `factory`
    pub fn new(config: ClientConfig, factory: Box<dyn ChannelFactory>) -> Self {
        Self {
            config,
            factory,
            clock: Box::new(SystemClock),
        }
    }

    /// Client using the transport named in the configuration
    pub fn from_config(config: ClientConfig) -> Self {
        let factory = TransportFactory::new(config.connection.transport, config.demo.clone());
        Self::new(config, Box::new(factory))
    }

    /// Replace the clock used for measurement windows and latencies
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn open_session(&self) -> Result<Session, ProtocolError> {
        Session::establish(self.factory.create(), &self.config.session())
    }

    fn request(&self, kind: RequestKind) -> Result<Request, ProtocolError> {
        Ok(self.config.codes.get(kind)?.request())
    }

    /// Write a result file into the output directory.
    ///
    /// Failures are logged and yield `None`.
    fn persist<F>(&self, file_name: &str, write: F) -> Option<PathBuf>
    where
        F: FnOnce(&Path) -> io::Result<()>,
    {
        let dir = &self.config.output_dir;
        let path = dir.join(file_name);
        match report::ensure_dir(dir).and_then(|_| write(&path)) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "result saved");
                Some(path)
            }
            Err(e) => {
                tracing::error!(path = %path.display(), "failed to save result: {}", e);
                None
            }
        }
    }

    /// Measure echo packet latencies for the configured window
    pub fn echo_statistics(&self) -> Result<OperationReport<Statistics>, ProtocolError> {
        let echo = self.request(RequestKind::Echo)?;
        tracing::info!(window_secs = self.config.measurement.window_secs, "echo statistics started");

        let mut session = self.open_session()?;
        let stats = stats::collect_echo(&mut session, &echo, self.config.window(), self.clock.as_ref())?;
        close(session);

        tracing::info!(packets = stats.records.len(), "echo statistics finished");
        let artifact = self.persist(report::ECHO_REPORT, |path| {
            report::write_statistics(path, &stats)
        });
        Ok(OperationReport {
            data: stats,
            artifact,
        })
    }

    /// Measure ARQ delivery for the configured window
    pub fn arq_statistics(&self) -> Result<OperationReport<Statistics>, ProtocolError> {
        let ack = self.request(RequestKind::Ack)?;
        let nack = self.request(RequestKind::Nack)?;
        tracing::info!(window_secs = self.config.measurement.window_secs, "ARQ statistics started");

        let mut session = self.open_session()?;
        let stats = stats::collect_arq(
            &mut session,
            &ack,
            &nack,
            self.config.window(),
            self.clock.as_ref(),
        )?;
        close(session);

        let summary = stats.summary();
        tracing::info!(
            attempts = summary.iterations,
            delivered = summary.delivered,
            failed = summary.failed,
            "ARQ statistics finished"
        );
        let artifact = self.persist(report::ARQ_REPORT, |path| {
            report::write_statistics(path, &stats)
        });
        Ok(OperationReport {
            data: stats,
            artifact,
        })
    }

    /// Fetch a camera image
    pub fn receive_image(&self, kind: ImageKind) -> Result<OperationReport<Vec<u8>>, ProtocolError> {
        let request = self.request(kind.request_kind())?;
        tracing::info!(?kind, "image request started");

        let mut session = self.open_session()?;
        let image = image::receive_image(&mut session, &request, self.config.images.camera_limit)?;
        close(session);

        let file_name = format!("{}.jpg", kind.file_stem());
        let artifact = self.persist(&file_name, |path| report::write_image(path, &image));
        Ok(OperationReport {
            data: image,
            artifact,
        })
    }

    /// Fetch a GPS track for `route` and build the image request for its pins
    pub fn gps_tracking(
        &self,
        route: &str,
        pins: usize,
        time_gap_secs: u64,
    ) -> Result<GpsTrack, ProtocolError> {
        let code = self.config.codes.get(RequestKind::Gps)?;
        let track_request = code.with_suffix(route.to_string());
        tracing::info!(route, pins, time_gap_secs, "GPS tracking started");

        let mut session = self.open_session()?;
        let raw = session.exchange(&track_request, GPS_STOP_MARKER.as_bytes())?;
        close(session);

        let samples = gps::parse_track(&raw)?;
        if samples.is_empty() {
            return Err(ProtocolError::EmptyTrack);
        }
        let pins = gps::select_pins(&samples, pins, time_gap_secs);
        let request = gps::pin_image_request(&code, &pins);
        tracing::info!(samples = samples.len(), pins = pins.len(), %request, "GPS tracking finished");

        Ok(GpsTrack {
            samples,
            pins,
            request,
        })
    }

    /// Fetch the map image for a pin request built by [`Client::gps_tracking`]
    pub fn gps_image(&self, request: &Request) -> Result<OperationReport<Vec<u8>>, ProtocolError> {
        let mut session = self.open_session()?;
        let image = image::receive_image(&mut session, request, self.config.images.gps_limit)?;
        close(session);

        let artifact = self.persist(GPS_IMAGE_FILE, |path| report::write_image(path, &image));
        Ok(OperationReport {
            data: image,
            artifact,
        })
    }

    /// Run every operation in order: echo statistics, image, damaged image,
    /// GPS tracking with its map image, ARQ statistics.
    ///
    /// Writes `summary.json` to the output directory at the end.
    pub fn run_all(&self) -> Result<RunSummary, ProtocolError> {
        let mut summary = RunSummary::start();

        let echo = self.echo_statistics()?;
        summary.push(OperationSummary::Echo {
            stats: echo.data.summary(),
            artifact: echo.artifact,
        });

        for kind in [ImageKind::Clear, ImageKind::Damaged] {
            let image = self.receive_image(kind)?;
            summary.push(image_summary(kind.file_stem(), &image));
        }

        let gps_settings = &self.config.gps;
        let track = self.gps_tracking(&gps_settings.route, gps_settings.pins, gps_settings.time_gap_secs)?;
        let map = self.gps_image(&track.request)?;
        summary.push(OperationSummary::Gps {
            samples: track.samples.len(),
            pins: track.pins,
            request: track.request.to_string(),
        });
        summary.push(image_summary("gpsimage", &map));

        let arq = self.arq_statistics()?;
        summary.push(OperationSummary::Arq {
            stats: arq.data.summary(),
            artifact: arq.artifact,
        });

        summary.finish();
        self.persist(report::SUMMARY_REPORT, |path| summary.save(path));
        Ok(summary)
    }
}

fn image_summary(name: &str, received: &OperationReport<Vec<u8>>) -> OperationSummary {
    OperationSummary::Image {
        name: name.to_string(),
        bytes: received.data.len(),
        complete: received.data.ends_with(&image::END_OF_IMAGE),
        artifact: received.artifact.clone(),
    }
}

fn close(session: Session) {
    if let Err(e) = session.close() {
        tracing::warn!("failed to close session: {}", e);
    }
}
