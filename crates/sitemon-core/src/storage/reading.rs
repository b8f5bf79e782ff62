//! Single sensor readings and the site record that accompanies them.

use heapless::String;

/// Longest human-readable timestamp kept per reading, in bytes.
pub const TIMESTAMP_LEN: usize = 24;

/// Longest site name kept in a [`SiteInfo`], in bytes.
pub const SITE_NAME_LEN: usize = 16;

/// Numeric channel carried by every [`Reading`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Ambient air temperature in °C
    AirTemperature,
    /// Water temperature in °C
    WaterTemperature,
    /// Line pressure in bar
    Pressure,
    /// Logger supply voltage in V
    Voltage,
}

impl Channel {
    /// Chart title for this channel
    pub const fn label(self) -> &'static str {
        match self {
            Self::AirTemperature => "Air Temp",
            Self::WaterTemperature => "Water Temp",
            Self::Pressure => "Pressure",
            Self::Voltage => "Voltage",
        }
    }

    /// Field name used by the API for this channel
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::AirTemperature => "temperature",
            Self::WaterTemperature => "water_temp",
            Self::Pressure => "pressure",
            Self::Voltage => "voltage",
        }
    }

    /// Axis range used when no data is present to autoscale from
    pub const fn default_range(self) -> (f32, f32) {
        match self {
            Self::AirTemperature => (-10.0, 10.0),
            Self::WaterTemperature => (0.0, 10.0),
            Self::Pressure => (0.0, 2.0),
            Self::Voltage => (3.0, 5.0),
        }
    }

    /// Physically plausible bounds; anything outside is a corrupt payload.
    pub const fn plausible_range(self) -> (f32, f32) {
        match self {
            Self::AirTemperature | Self::WaterTemperature => (-80.0, 80.0),
            Self::Pressure => (0.0, 20.0),
            Self::Voltage => (0.0, 30.0),
        }
    }
}

/// One timestamped sample from a site logger. Immutable once received.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reading {
    /// Unix epoch seconds
    pub epoch: i64,
    /// Timestamp as formatted by the API, truncated to [`TIMESTAMP_LEN`]
    pub timestamp: String<TIMESTAMP_LEN>,
    pub air_temperature: f32,
    pub water_temperature: f32,
    pub pressure: f32,
    pub voltage: f32,
    /// Logger sequence number, increasing with every sample
    pub counter: u32,
}

impl Reading {
    /// Value of the given channel
    pub fn value(&self, channel: Channel) -> f32 {
        match channel {
            Channel::AirTemperature => self.air_temperature,
            Channel::WaterTemperature => self.water_temperature,
            Channel::Pressure => self.pressure,
            Channel::Voltage => self.voltage,
        }
    }
}

/// Kind of installation at a site. Determines which channels are charted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SiteKind {
    /// Weather station: air temperature only, plus supply voltage
    Air,
    /// Drip irrigation line with water temperature and pressure sensors
    Drip,
    #[default]
    Unknown,
}

impl SiteKind {
    /// Parse the API's `site_type` field. Unrecognised values map to `Unknown`.
    pub fn from_wire(kind: &str) -> Self {
        match kind {
            "air" => Self::Air,
            "drip" => Self::Drip,
            _ => Self::Unknown,
        }
    }

    /// Channels charted for this kind, top to bottom.
    pub const fn channels(self) -> &'static [Channel] {
        match self {
            Self::Air => &[Channel::AirTemperature, Channel::Voltage],
            Self::Drip | Self::Unknown => &[
                Channel::AirTemperature,
                Channel::WaterTemperature,
                Channel::Pressure,
            ],
        }
    }
}

/// Site metadata returned alongside every successful fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteInfo {
    pub name: String<SITE_NAME_LEN>,
    pub kind: SiteKind,
    pub active: bool,
    /// Offset of the site's local time from UTC, in seconds
    pub utc_offset_secs: i32,
    /// Server time of the query, Unix epoch seconds
    pub query_time: i64,
}

/// Copy `src` into a bounded string, cutting at the last char boundary that fits.
pub(crate) fn truncated<const N: usize>(src: &str) -> String<N> {
    let mut end = src.len().min(N);
    while !src.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::new();
    // Cannot fail: `end <= N`.
    out.push_str(&src[..end]).ok();
    out
}
