//! Device configuration and the fixed list of known sites.

use serde::{Deserialize, Serialize};

/// Sites in the order the Up/Down buttons cycle through them.
pub const SITES: [&str; 8] = [
    "Sakti",
    "Likir",
    "Baroo",
    "Tuna",
    "Ayee",
    "Chanigund",
    "Stakmo",
    "Igoo",
];

/// Site selected when nothing valid has been persisted.
pub const DEFAULT_SITE_INDEX: usize = 0;

/// Readings requested per fetch: 24 hours at a 5 minute cadence.
pub const DEFAULT_READING_COUNT: u16 = 288;

/// India Standard Time, the local time for every known site.
pub const DEFAULT_UTC_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(bound(deserialize = "'de: 'a"))]
pub struct Config<'a> {
    pub internet: InternetConfig<'a>,
    pub api: ApiConfig<'a>,
    #[serde(default)]
    pub display: DisplayConfig<'a>,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InternetConfig<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}

/// Location of the time-series API.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiConfig<'a> {
    /// Host name, optionally with `:port`
    pub host: &'a str,
    /// Request path, starting with `/`
    pub path: &'a str,
    #[serde(default = "default_reading_count")]
    pub reading_count: u16,
}

impl Default for ApiConfig<'_> {
    fn default() -> Self {
        Self {
            host: "localhost",
            path: "/api/readings",
            reading_count: DEFAULT_READING_COUNT,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayConfig<'a> {
    /// Appended to the site name in the screen header
    pub region: &'a str,
}

impl Default for DisplayConfig<'_> {
    fn default() -> Self {
        Self { region: "Ladakh" }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Slot length for periodic refresh. `None` waits for buttons only.
    #[serde(default)]
    pub refresh_slot_minutes: Option<u32>,
    #[serde(default = "default_utc_offset")]
    pub utc_offset_secs: i32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            refresh_slot_minutes: None,
            utc_offset_secs: DEFAULT_UTC_OFFSET_SECS,
        }
    }
}

fn default_reading_count() -> u16 {
    DEFAULT_READING_COUNT
}

fn default_utc_offset() -> i32 {
    DEFAULT_UTC_OFFSET_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserializes_with_defaults() {
        let json = br#"{
            "internet": { "ssid": "field-ap", "password": "hunter2" },
            "api": { "host": "192.168.1.20:8080", "path": "/v1/site" }
        }"#;
        let config: Config = serde_json::from_slice(json).unwrap();

        assert_eq!(config.internet.ssid, "field-ap");
        assert_eq!(config.api.reading_count, DEFAULT_READING_COUNT);
        assert_eq!(config.display.region, "Ladakh");
        assert_eq!(config.schedule.refresh_slot_minutes, None);
        assert_eq!(config.schedule.utc_offset_secs, DEFAULT_UTC_OFFSET_SECS);
    }

    #[test]
    fn test_config_schedule_override() {
        let json = br#"{
            "internet": { "ssid": "a", "password": "b" },
            "api": { "host": "h", "path": "/p", "reading_count": 144 },
            "schedule": { "refresh_slot_minutes": 30, "utc_offset_secs": 0 }
        }"#;
        let config: Config = serde_json::from_slice(json).unwrap();

        assert_eq!(config.api.reading_count, 144);
        assert_eq!(config.schedule.refresh_slot_minutes, Some(30));
        assert_eq!(config.schedule.utc_offset_secs, 0);
    }
}
