//! Time-series API: request URL and response decoding.
//!
//! A response looks like
//!
//! ```text
//! { "site_name": "Likir", "site_type": "drip", "active": true,
//!   "timezone_offset": 19800, "query_time": 1763856000,
//!   "current":  { "dt": ..., "timestamp": "...", "temperature": ..., ... },
//!   "readings": [ { ...newest... }, ..., { ...oldest... } ] }
//! ```
//!
//! Decoding is all-or-nothing: any malformed or implausible value rejects
//! the whole payload, so a bad response never reaches the site cache.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;

use log::{debug, warn};
use serde::Deserialize;
use thiserror_no_std::Error;

use crate::storage::reading::{Channel, Reading, SiteInfo, SiteKind, truncated};
use crate::storage::{MAX_READINGS, ReadingSeries};

/// Capacity of a request URL
pub const URL_LEN: usize = 256;

/// Error types for payload decoding
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// Body is not valid JSON of the expected shape
    #[error("Malformed JSON at line {line}, column {column}")]
    Json {
        /// Line of the first error
        line: usize,
        /// Column of the first error
        column: usize,
    },

    /// A channel value is outside its plausible physical range
    #[error("Value of {field} out of range in reading {index:?}")]
    OutOfRange {
        /// API field name
        field: &'static str,
        /// Position in the newest-first readings array; `None` for `current`
        index: Option<usize>,
    },

    /// The request URL did not fit its buffer
    #[error("Request URL exceeds {max} bytes")]
    UrlTooLong {
        /// Buffer capacity
        max: usize,
    },
}

/// Decoded response for one site.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SitePayload {
    pub info: SiteInfo,
    pub current: Option<Reading>,
    pub readings: ReadingSeries,
}

#[derive(Deserialize)]
struct WireReading {
    #[serde(default)]
    dt: i64,
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    temperature: f32,
    #[serde(default)]
    water_temp: f32,
    #[serde(default)]
    pressure: f32,
    #[serde(default)]
    voltage: f32,
    #[serde(default)]
    counter: u32,
}

#[derive(Deserialize)]
struct WirePayload {
    #[serde(default)]
    site_name: String,
    #[serde(default)]
    site_type: String,
    #[serde(default)]
    active: bool,
    #[serde(default)]
    timezone_offset: i32,
    #[serde(default)]
    query_time: i64,
    #[serde(default)]
    current: Option<WireReading>,
    #[serde(default)]
    readings: Vec<WireReading>,
}

impl WireReading {
    fn into_reading(self, index: Option<usize>) -> Result<Reading, PayloadError> {
        let reading = Reading {
            epoch: self.dt,
            timestamp: truncated(&self.timestamp),
            air_temperature: self.temperature,
            water_temperature: self.water_temp,
            pressure: self.pressure,
            voltage: self.voltage,
            counter: self.counter,
        };

        for channel in [
            Channel::AirTemperature,
            Channel::WaterTemperature,
            Channel::Pressure,
            Channel::Voltage,
        ] {
            let (lo, hi) = channel.plausible_range();
            let value = reading.value(channel);
            if !value.is_finite() || value < lo || value > hi {
                return Err(PayloadError::OutOfRange {
                    field: channel.wire_name(),
                    index,
                });
            }
        }

        Ok(reading)
    }
}

/// Decode a response body.
pub fn decode_payload(body: &[u8]) -> Result<SitePayload, PayloadError> {
    let wire: WirePayload = serde_json::from_slice(body).map_err(|e| {
        warn!("Payload rejected: {}", e);
        PayloadError::Json {
            line: e.line(),
            column: e.column(),
        }
    })?;

    let current = wire.current.map(|r| r.into_reading(None)).transpose()?;

    if wire.readings.len() > MAX_READINGS {
        debug!(
            "Payload has {} readings, keeping newest {}",
            wire.readings.len(),
            MAX_READINGS
        );
    }

    let mut readings = ReadingSeries::new();
    for (index, wire_reading) in wire.readings.into_iter().take(MAX_READINGS).enumerate() {
        let reading = wire_reading.into_reading(Some(index))?;
        // Bounded by `take`
        readings.push_older(reading).ok();
    }

    let info = SiteInfo {
        name: truncated(&wire.site_name),
        kind: SiteKind::from_wire(&wire.site_type),
        active: wire.active,
        utc_offset_secs: wire.timezone_offset,
        query_time: wire.query_time,
    };

    debug!(
        "Decoded payload for {} ({:?}): {} readings",
        info.name,
        info.kind,
        readings.len()
    );

    Ok(SitePayload {
        info,
        current,
        readings,
    })
}

/// Build `<path>?site_name=<site>&count=<count>`, the request target.
pub fn request_target(
    path: &str,
    site: &str,
    count: u16,
) -> Result<heapless::String<URL_LEN>, PayloadError> {
    let mut target = heapless::String::new();
    let too_long = |_| PayloadError::UrlTooLong { max: URL_LEN };

    write!(target, "{}?site_name=", path).map_err(too_long)?;
    for byte in site.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            target
                .push(byte as char)
                .map_err(|_| PayloadError::UrlTooLong { max: URL_LEN })?;
        } else {
            write!(target, "%{:02X}", byte).map_err(too_long)?;
        }
    }
    write!(target, "&count={}", count).map_err(too_long)?;

    Ok(target)
}

/// Build `http://<host><path>?site_name=<site>&count=<count>`.
pub fn request_url(
    host: &str,
    path: &str,
    site: &str,
    count: u16,
) -> Result<heapless::String<URL_LEN>, PayloadError> {
    let target = request_target(path, site, count)?;
    let mut url = heapless::String::new();
    write!(url, "http://{}{}", host, target).map_err(|_| PayloadError::UrlTooLong { max: URL_LEN })?;
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    const SAMPLE: &str = r#"{
        "site_name": "Likir",
        "site_type": "drip",
        "active": true,
        "timezone_offset": 19800,
        "query_time": 1763856000,
        "current": {
            "dt": 1763855700, "timestamp": "2025-11-23 05:25",
            "temperature": -3.5, "water_temp": 1.2, "pressure": 0.9,
            "voltage": 4.05, "counter": 1201
        },
        "readings": [
            { "dt": 1763855700, "temperature": -3.5, "water_temp": 1.2, "pressure": 0.9, "voltage": 4.05, "counter": 1201 },
            { "dt": 1763855400, "temperature": -3.0, "water_temp": 1.1, "pressure": 0.8, "voltage": 4.05, "counter": 1200 }
        ]
    }"#;

    #[test]
    fn test_decode_sample() {
        let payload = decode_payload(SAMPLE.as_bytes()).unwrap();

        assert_eq!(payload.info.name.as_str(), "Likir");
        assert_eq!(payload.info.kind, SiteKind::Drip);
        assert!(payload.info.active);
        assert_eq!(payload.info.utc_offset_secs, 19_800);
        assert_eq!(payload.current.as_ref().map(|r| r.counter), Some(1201));
        assert_eq!(payload.readings.len(), 2);
        assert_eq!(payload.readings.latest().map(|r| r.counter), Some(1201));
        assert_eq!(
            payload.readings.oldest_first().next().map(|r| r.air_temperature),
            Some(-3.0)
        );
    }

    #[test]
    fn test_missing_fields_default() {
        let payload = decode_payload(br#"{ "site_name": "Igoo" }"#).unwrap();
        assert_eq!(payload.info.kind, SiteKind::Unknown);
        assert!(payload.current.is_none());
        assert!(payload.readings.is_empty());
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            decode_payload(b"{ \"readings\": [ {"),
            Err(PayloadError::Json { .. })
        ));
        assert!(matches!(
            decode_payload(br#"{ "readings": [ { "temperature": "warm" } ] }"#),
            Err(PayloadError::Json { .. })
        ));
        assert!(matches!(decode_payload(b"42"), Err(PayloadError::Json { .. })));
    }

    #[test]
    fn test_out_of_range_value_rejected() {
        let body = br#"{ "readings": [ { "temperature": 1.0 }, { "pressure": -4.0 } ] }"#;
        assert_eq!(
            decode_payload(body),
            Err(PayloadError::OutOfRange {
                field: "pressure",
                index: Some(1)
            })
        );
    }

    #[test]
    fn test_oversized_array_keeps_newest() {
        let items: Vec<String> = (0..MAX_READINGS + 20)
            .map(|i| format!("{{ \"counter\": {} }}", 10_000 - i))
            .collect();
        let body = format!("{{ \"readings\": [{}] }}", items.join(","));

        let payload = decode_payload(body.as_bytes()).unwrap();
        assert_eq!(payload.readings.len(), MAX_READINGS);
        assert_eq!(payload.readings.latest().map(|r| r.counter), Some(10_000));
    }

    #[test]
    fn test_request_url() {
        let url = request_url("api.example.org", "/v1/readings", "Chanigund", 288).unwrap();
        assert_eq!(
            url.as_str(),
            "http://api.example.org/v1/readings?site_name=Chanigund&count=288"
        );

        let target = request_target("/p", "Two Words", 12).unwrap();
        assert_eq!(target.as_str(), "/p?site_name=Two%20Words&count=12");
    }

    #[test]
    fn test_request_url_too_long() {
        let host = "x".repeat(URL_LEN);
        assert_eq!(
            request_url(&host, "/", "Sakti", 1),
            Err(PayloadError::UrlTooLong { max: URL_LEN })
        );
    }
}
