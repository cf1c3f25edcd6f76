//! Client configuration
//!
//! Stored as JSON. Every field has a default matching the station's usual
//! operating values, so an empty object `{}` is a valid configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::image::{CAMERA_IMAGE_LIMIT, GPS_IMAGE_LIMIT};
use crate::protocol::{
    ProtocolError, RequestCodes, SessionConfig, DEFAULT_BAUD_RATE, DEFAULT_LINK_NAME,
    DEFAULT_TIMEOUT_MS, GREETING_TERMINATOR,
};
use crate::stats::DEFAULT_WINDOW;

/// Errors loading or saving a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] ProtocolError),

    #[error("No configuration directory available on this platform")]
    NoConfigDir,
}

/// How channels reach the station
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Serial device; the link name is the port path
    #[default]
    Serial,
    /// TCP bridge; the link name is `host:port`
    Tcp,
    /// Built-in simulated station
    Demo,
}

/// Connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    pub transport: Transport,
    /// Port path, `host:port`, or the station link name
    pub link: String,
    pub baud_rate: u32,
    pub timeout_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            transport: Transport::Serial,
            link: DEFAULT_LINK_NAME.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Measurement loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementSettings {
    /// Length of each echo/ARQ measurement window
    pub window_secs: u64,
}

impl Default for MeasurementSettings {
    fn default() -> Self {
        Self {
            window_secs: DEFAULT_WINDOW.as_secs(),
        }
    }
}

/// Image size limits in bytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    pub camera_limit: usize,
    pub gps_limit: usize,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            camera_limit: CAMERA_IMAGE_LIMIT,
            gps_limit: GPS_IMAGE_LIMIT,
        }
    }
}

/// GPS tracking settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpsSettings {
    /// Route parameter appended to the GPS request, e.g. `R=1028090`
    pub route: String,
    /// Number of pins on the GPS image
    pub pins: usize,
    /// Pins must be more than this many seconds apart
    pub time_gap_secs: u64,
}

impl Default for GpsSettings {
    fn default() -> Self {
        Self {
            route: "R=1028090".to_string(),
            pins: 6,
            time_gap_secs: 9,
        }
    }
}

/// Simulated station settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoSettings {
    /// RNG seed; a fixed seed makes runs reproducible
    pub seed: Option<u64>,
    /// Probability that an ARQ packet is sent with a corrupted FCS
    pub corruption_rate: f64,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            seed: None,
            corruption_rate: 0.2,
        }
    }
}

/// Complete client configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub connection: ConnectionSettings,
    pub codes: RequestCodes,
    pub measurement: MeasurementSettings,
    pub images: ImageSettings,
    pub gps: GpsSettings,
    pub demo: DemoSettings,
    /// Directory result files are written to
    pub output_dir: PathBuf,
}

impl ClientConfig {
    /// Default location: `<config dir>/ithaki/config.json`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("ithaki").join("config.json"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ClientConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| io_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        fs::write(path, content).map_err(io_err)
    }

    /// Check the request codes
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.codes.validate()?;
        Ok(())
    }

    /// Settings for every session opened by the client
    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            link: self.connection.link.clone(),
            baud_rate: self.connection.baud_rate,
            timeout: Duration::from_millis(self.connection.timeout_ms),
            greeting_terminator: GREETING_TERMINATOR.to_vec(),
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.measurement.window_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.connection.baud_rate, 80_000);
        assert_eq!(config.connection.timeout_ms, 2000);
        assert_eq!(config.connection.link, "ithaki");
        assert_eq!(config.window(), Duration::from_secs(360));
        assert_eq!(config.images.camera_limit, 81_000);
        assert_eq!(config.images.gps_limit, 150_000);
        assert_eq!(config.gps.pins, 6);
        assert_eq!(config.gps.time_gap_secs, 9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_object_is_default() {
        let config: ClientConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_partial_config() {
        let json = r#"{
            "connection": { "transport": "tcp", "link": "127.0.0.1:9000" },
            "codes": { "echo": "E4821", "ack": "Q1155" },
            "measurement": { "window_secs": 30 }
        }"#;
        let config: ClientConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.connection.transport, Transport::Tcp);
        assert_eq!(config.connection.baud_rate, 80_000);
        assert_eq!(config.codes.echo, "E4821");
        assert_eq!(config.codes.nack, "RXXXX");
        assert_eq!(config.window(), Duration::from_secs(30));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = ClientConfig::default();
        config.codes.image = "M0042".into();
        config.output_dir = PathBuf::from("results");
        config.save(&path).unwrap();

        let loaded = ClientConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_rejects_bad_code() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "codes": { "gps": "Q1234" } }"#).unwrap();

        assert!(matches!(
            ClientConfig::load(&path),
            Err(ConfigError::Invalid(ProtocolError::InvalidRequestCode { .. }))
        ));
    }

    #[test]
    fn test_load_reports_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            ClientConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            ClientConfig::load(&dir.path().join("absent.json")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_session_config() {
        let mut config = ClientConfig::default();
        config.connection.timeout_ms = 500;
        let session = config.session();
        assert_eq!(session.timeout, Duration::from_millis(500));
        assert_eq!(session.greeting_terminator, GREETING_TERMINATOR.to_vec());
    }
}
