//! GPS track sampling
//!
//! The station answers a GPS request with a block of NMEA-style records
//! between start and stop marker lines:
//!
//! ```text
//! START ITHAKI GPS TRACKING
//! $GPGGA,045208.000,4037.6331,N,02257.5633,E,1,07,1.5,57.8,M,36.1,M,,0000*6D
//! ...
//! STOP ITHAKI GPS TRACKING
//! ```
//!
//! A handful of samples spaced apart in time are promoted to pins. Each pin's
//! coordinates are converted from degrees and decimal minutes into whole
//! degrees, minutes and seconds, then encoded as `T=` parameters of a GPS
//! image request.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::protocol::{ProtocolError, Request, RequestCode, GPS_START_MARKER, GPS_STOP_MARKER};

/// Field holding the time of day (`HHMMSS[.sss]`)
pub const TIME_FIELD: usize = 1;

/// Field holding the longitude (degrees and decimal minutes)
pub const LONGITUDE_FIELD: usize = 2;

/// Field holding the latitude (degrees and decimal minutes)
pub const LATITUDE_FIELD: usize = 4;

/// Fields a record needs for all of the above to be present
pub const MIN_SAMPLE_FIELDS: usize = LATITUDE_FIELD + 1;

/// Prefix of each encoded pin in an image request
pub const PIN_PREFIX: &str = "T=";

/// Fraction digits kept when parsing; finer digits cannot move whole seconds
const MAX_FRACTION_DIGITS: u32 = 9;

/// Non-negative decimal number kept as whole part plus exact fraction.
///
/// Keeping the digits avoids binary floating point artefacts: `3723.45`
/// must yield 27 seconds, while `3723.45 % 1.0 * 60.0` in `f64` gives 26.99..
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decimal {
    whole: u64,
    fraction: u64,
    scale: u64,
}

impl Decimal {
    /// Parse digits with an optional fractional part, e.g. `4037.6331`
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (whole_digits, fraction_digits) = match text.split_once('.') {
            Some((w, f)) => (w, f),
            None => (text, ""),
        };
        if whole_digits.is_empty() && fraction_digits.is_empty() {
            return None;
        }
        let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(whole_digits) || !all_digits(fraction_digits) {
            return None;
        }

        let whole = if whole_digits.is_empty() {
            0
        } else {
            whole_digits.parse().ok()?
        };

        let mut fraction = 0u64;
        let mut scale = 1u64;
        for digit in fraction_digits.bytes().take(MAX_FRACTION_DIGITS as usize) {
            fraction = fraction * 10 + u64::from(digit - b'0');
            scale *= 10;
        }

        Some(Self {
            whole,
            fraction,
            scale,
        })
    }

    /// Integer part
    pub fn whole(&self) -> u64 {
        self.whole
    }

    /// `floor(fractional part * factor)`
    pub fn scaled_fraction(&self, factor: u64) -> u64 {
        self.fraction * factor / self.scale
    }
}

/// Seconds since midnight from a compact `HHMMSS` value
pub fn seconds_of_day(hhmmss: u64) -> u64 {
    (hhmmss / 10_000) * 3600 + ((hhmmss / 100) % 100) * 60 + hhmmss % 100
}

/// Whole degrees, minutes and seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dms {
    pub degrees: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl Dms {
    /// Convert a degrees-and-decimal-minutes value (`DDMM.mmmm`)
    pub fn from_degree_minutes(value: Decimal) -> Self {
        Self {
            degrees: (value.whole() / 100) as u32,
            minutes: (value.whole() % 100) as u32,
            seconds: value.scaled_fraction(60) as u32,
        }
    }
}

impl fmt::Display for Dms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°{:02}'{:02}\"", self.degrees, self.minutes, self.seconds)
    }
}

/// One record of a GPS track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpsSample {
    /// Seconds since midnight
    pub time: u64,
    pub latitude: Decimal,
    pub longitude: Decimal,
}

impl GpsSample {
    /// Parse a comma-separated record
    pub fn parse(record: &str) -> Result<Self, String> {
        let fields: Vec<&str> = record.split(',').collect();
        if fields.len() < MIN_SAMPLE_FIELDS {
            return Err(format!(
                "expected at least {} fields, found {}",
                MIN_SAMPLE_FIELDS,
                fields.len()
            ));
        }

        let decimal = |index: usize, name: &str| {
            Decimal::parse(fields[index])
                .ok_or_else(|| format!("invalid {} '{}'", name, fields[index]))
        };

        Ok(Self {
            time: seconds_of_day(decimal(TIME_FIELD, "time")?.whole()),
            latitude: decimal(LATITUDE_FIELD, "latitude")?,
            longitude: decimal(LONGITUDE_FIELD, "longitude")?,
        })
    }
}

/// Parse the framed response of a GPS track request
pub fn parse_track(raw: &[u8]) -> Result<Vec<GpsSample>, ProtocolError> {
    let text = String::from_utf8_lossy(raw)
        .replace(GPS_START_MARKER, "")
        .replace(GPS_STOP_MARKER, "");

    let mut samples = Vec::new();
    for (index, line) in text.split('\n').enumerate() {
        let record = line.trim();
        if record.is_empty() {
            continue;
        }
        let sample = GpsSample::parse(record).map_err(|reason| ProtocolError::MalformedSample {
            line: index + 1,
            reason,
        })?;
        samples.push(sample);
    }
    Ok(samples)
}

/// Indices of the samples promoted to pins.
///
/// The first sample is always pin 0. Each following pin is the next sample
/// whose time exceeds the previous pin's time by more than `min_gap_secs`.
/// Stops once `count` pins are chosen; a short track yields fewer pins.
pub fn select_pin_indices(samples: &[GpsSample], count: usize, min_gap_secs: u64) -> Vec<usize> {
    let Some(first) = samples.first() else {
        return Vec::new();
    };
    if count == 0 {
        return Vec::new();
    }

    let mut selected = vec![0];
    let mut last_time = first.time;
    for (index, sample) in samples.iter().enumerate().skip(1) {
        if selected.len() == count {
            break;
        }
        if sample.time > last_time + min_gap_secs {
            last_time = sample.time;
            selected.push(index);
        }
    }
    selected
}

/// A sample promoted to a map pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pin {
    /// Index of the sample in its track
    pub sample: usize,
    pub latitude: Dms,
    pub longitude: Dms,
}

impl Pin {
    pub fn from_sample(index: usize, sample: &GpsSample) -> Self {
        Self {
            sample: index,
            latitude: Dms::from_degree_minutes(sample.latitude),
            longitude: Dms::from_degree_minutes(sample.longitude),
        }
    }

    /// `T=` followed by six two-digit fields: latitude d/m/s, longitude d/m/s
    pub fn encode(&self) -> String {
        format!(
            "{}{:02}{:02}{:02}{:02}{:02}{:02}",
            PIN_PREFIX,
            self.latitude.degrees,
            self.latitude.minutes,
            self.latitude.seconds,
            self.longitude.degrees,
            self.longitude.minutes,
            self.longitude.seconds,
        )
    }
}

/// Select up to `count` pins spaced more than `min_gap_secs` apart
pub fn select_pins(samples: &[GpsSample], count: usize, min_gap_secs: u64) -> Vec<Pin> {
    select_pin_indices(samples, count, min_gap_secs)
        .into_iter()
        .map(|index| Pin::from_sample(index, &samples[index]))
        .collect()
}

/// Concatenated `T=` parameters for all pins, in pin order
pub fn encode_pins(pins: &[Pin]) -> String {
    pins.iter().map(Pin::encode).collect()
}

/// GPS image request showing the given pins
pub fn pin_image_request(gps_code: &RequestCode, pins: &[Pin]) -> Request {
    gps_code.with_suffix(encode_pins(pins))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RequestKind;
    use pretty_assertions::assert_eq;

    fn record(time: &str, lon: &str, lat: &str) -> String {
        format!("$GPGGA,{},{},N,{},E,1,07,1.5,57.8,M,36.1,M,,0000*6D", time, lon, lat)
    }

    fn sample_at(hhmmss: &str) -> GpsSample {
        GpsSample::parse(&record(hhmmss, "4037.6331", "02257.5633")).unwrap()
    }

    #[test]
    fn test_decimal_parse() {
        let d = Decimal::parse("3723.45").unwrap();
        assert_eq!(d.whole(), 3723);
        assert_eq!(d.scaled_fraction(60), 27);
        assert_eq!(Decimal::parse("045208.000").unwrap().whole(), 45208);
        assert_eq!(Decimal::parse("12").unwrap().scaled_fraction(60), 0);
        assert_eq!(Decimal::parse(".5").unwrap().scaled_fraction(60), 30);
        assert!(Decimal::parse("").is_none());
        assert!(Decimal::parse(".").is_none());
        assert!(Decimal::parse("-12.5").is_none());
        assert!(Decimal::parse("1.2.3").is_none());
        assert!(Decimal::parse("N").is_none());
    }

    #[test]
    fn test_dms_conversion() {
        let dms = Dms::from_degree_minutes(Decimal::parse("3723.45").unwrap());
        assert_eq!(
            dms,
            Dms {
                degrees: 37,
                minutes: 23,
                seconds: 27
            }
        );
        assert_eq!(dms.to_string(), "37°23'27\"");
    }

    #[test]
    fn test_seconds_of_day() {
        assert_eq!(seconds_of_day(0), 0);
        assert_eq!(seconds_of_day(45208), 4 * 3600 + 52 * 60 + 8);
        assert_eq!(seconds_of_day(235959), 86399);
    }

    #[test]
    fn test_sample_fields() {
        let sample = GpsSample::parse(&record("045208.000", "4037.6331", "02257.5633")).unwrap();
        assert_eq!(sample.time, 4 * 3600 + 52 * 60 + 8);
        assert_eq!(sample.latitude, Decimal::parse("02257.5633").unwrap());
        assert_eq!(sample.longitude, Decimal::parse("4037.6331").unwrap());
    }

    #[test]
    fn test_pin_encoding() {
        let sample = GpsSample::parse(&record("045208.000", "4037.6331", "02257.5633")).unwrap();
        let pin = Pin::from_sample(0, &sample);
        assert_eq!(pin.encode(), "T=225733403737");
    }

    #[test]
    fn test_encoding_pads_single_digits() {
        let sample = GpsSample::parse(&record("000001", "0105.0500", "0203.1000")).unwrap();
        assert_eq!(Pin::from_sample(0, &sample).encode(), "T=020306010503");
    }

    #[test]
    fn test_selection_respects_gap() {
        let samples: Vec<GpsSample> = ["120000", "120005", "120012", "120020", "120030"]
            .iter()
            .map(|t| sample_at(t))
            .collect();
        assert_eq!(select_pin_indices(&samples, 3, 9), vec![0, 2, 4]);
    }

    #[test]
    fn test_selection_gap_is_strict() {
        let samples: Vec<GpsSample> = ["120000", "120009", "120010"]
            .iter()
            .map(|t| sample_at(t))
            .collect();
        assert_eq!(select_pin_indices(&samples, 2, 9), vec![0, 2]);
    }

    #[test]
    fn test_selection_stops_at_count() {
        let samples: Vec<GpsSample> = (0..20)
            .map(|i| sample_at(&format!("1200{:02}", i * 2)))
            .collect();
        assert_eq!(select_pin_indices(&samples, 4, 3), vec![0, 2, 4, 6]);
    }

    #[test]
    fn test_short_track_yields_fewer_pins() {
        let samples: Vec<GpsSample> = ["120000", "120003", "120030"]
            .iter()
            .map(|t| sample_at(t))
            .collect();
        assert_eq!(select_pin_indices(&samples, 6, 9), vec![0, 2]);
        assert!(select_pin_indices(&[], 6, 9).is_empty());
        assert!(select_pin_indices(&samples, 0, 9).is_empty());
    }

    #[test]
    fn test_parse_track_strips_markers() {
        let raw = format!(
            "{}{}\r\n{}\r\n{}",
            GPS_START_MARKER,
            record("120000.000", "4037.6331", "02257.5633"),
            record("120015.000", "4037.6400", "02257.5700"),
            GPS_STOP_MARKER
        );
        let samples = parse_track(raw.as_bytes()).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].time, 12 * 3600 + 15);
    }

    #[test]
    fn test_parse_track_reports_bad_line() {
        let raw = format!("{}$GPGGA,120000\r\n{}", GPS_START_MARKER, GPS_STOP_MARKER);
        match parse_track(raw.as_bytes()) {
            Err(ProtocolError::MalformedSample { line, .. }) => assert_eq!(line, 1),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_pin_image_request() {
        let sample = GpsSample::parse(&record("045208.000", "4037.6331", "02257.5633")).unwrap();
        let pins = vec![Pin::from_sample(0, &sample), Pin::from_sample(0, &sample)];
        let request = pin_image_request(&RequestCode::base(RequestKind::Gps), &pins);
        assert_eq!(request.to_string(), "PXXXXT=225733403737T=225733403737");
    }
}
