//! Wall-clock time: network sync, local calendar fields and display strings.
//!
//! The device has no battery-backed clock. Every fetch cycle starts a sync
//! with the network time server and polls a bounded number of times; data is
//! only fetched once the clock reads a plausible year.

use core::fmt::Write;

use embedded_hal_async::delay::DelayNs;
use heapless::String;
use log::{debug, info, warn};
use thiserror_no_std::Error;

/// Maximum polls while waiting for the clock to be set
pub const NTP_MAX_POLLS: u32 = 20;

/// Delay between sync polls in milliseconds
pub const NTP_POLL_INTERVAL_MS: u32 = 500;

/// Clocks reading an earlier year have not been synchronised
pub const MIN_PLAUSIBLE_YEAR: i32 = 2020;

const SECS_PER_DAY: i64 = 86_400;

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// `HH:MM:SS`
pub type TimeString = String<8>;
/// `Sun, 23. Nov 2025`
pub type DateString = String<20>;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TimeSyncError {
    /// The clock never reached a plausible time
    #[error("Time not synchronized after {polls} polls")]
    Timeout { polls: u32 },
}

/// Platform clock.
#[allow(async_fn_in_trait)]
pub trait TimeSource {
    /// Start (or restart) synchronisation with the network time server.
    async fn start_sync(&mut self);

    /// Current Unix time in seconds, if the clock has been set
    fn now_unix(&self) -> Option<i64>;

    /// Monotonic milliseconds since boot
    fn uptime_ms(&self) -> u64;
}

/// Broken-down local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTime {
    pub year: i32,
    /// 1..=12
    pub month: u8,
    /// 1..=31
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// 0 = Sunday
    pub weekday: u8,
}

impl LocalTime {
    /// Convert Unix seconds to local calendar fields at a fixed UTC offset.
    pub fn from_unix(epoch: i64, utc_offset_secs: i32) -> Self {
        let local = epoch + utc_offset_secs as i64;
        let days = local.div_euclid(SECS_PER_DAY);
        let secs_of_day = local.rem_euclid(SECS_PER_DAY);

        let (year, month, day) = civil_from_days(days);

        Self {
            year,
            month,
            day,
            hour: (secs_of_day / 3600) as u8,
            minute: (secs_of_day % 3600 / 60) as u8,
            second: (secs_of_day % 60) as u8,
            // 1970-01-01 was a Thursday
            weekday: (days + 4).rem_euclid(7) as u8,
        }
    }

    pub fn is_plausible(&self) -> bool {
        self.year >= MIN_PLAUSIBLE_YEAR
    }

    pub fn time_str(&self) -> TimeString {
        let mut s = String::new();
        write!(s, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second).ok();
        s
    }

    pub fn date_str(&self) -> DateString {
        let mut s = String::new();
        write!(
            s,
            "{}, {:02}. {} {:04}",
            WEEKDAYS[self.weekday as usize % 7],
            self.day,
            month_name(self.month),
            self.year
        )
        .ok();
        s
    }
}

/// Short `HH:MM` form of a captured `HH:MM:SS` string.
pub fn header_time(time_str: &str) -> &str {
    time_str.get(..5).unwrap_or(time_str)
}

/// Short `23-Nov` form of a captured `Sun, 23. Nov 2025` string.
pub fn header_date(date_str: &str) -> String<8> {
    let mut s = String::new();
    let mut parts = date_str.split_whitespace().skip(1);
    if let (Some(day), Some(month)) = (parts.next(), parts.next()) {
        write!(s, "{}-{}", day.trim_end_matches('.'), month).ok();
    }
    s
}

fn month_name(month: u8) -> &'static str {
    MONTHS
        .get((month as usize).wrapping_sub(1))
        .copied()
        .unwrap_or("???")
}

/// Days since 1970-01-01 to (year, month, day) in the proleptic Gregorian calendar.
fn civil_from_days(days: i64) -> (i32, u8, u8) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year as i32, month as u8, day as u8)
}

/// Current local time if the clock is trustworthy.
pub fn local_now<T: TimeSource>(source: &T, utc_offset_secs: i32) -> Option<LocalTime> {
    source
        .now_unix()
        .map(|now| LocalTime::from_unix(now, utc_offset_secs))
        .filter(LocalTime::is_plausible)
}

/// Start a sync and poll until the clock is plausible.
pub async fn wait_for_sync<T, D>(
    source: &mut T,
    delay: &mut D,
    utc_offset_secs: i32,
) -> Result<LocalTime, TimeSyncError>
where
    T: TimeSource,
    D: DelayNs,
{
    info!("Synchronizing time");
    source.start_sync().await;

    for poll in 1..=NTP_MAX_POLLS {
        if let Some(local) = local_now(source, utc_offset_secs) {
            info!("Local time: {} {}", local.date_str(), local.time_str());
            return Ok(local);
        }
        debug!("Waiting for time sync... ({})", poll);
        delay.delay_ms(NTP_POLL_INTERVAL_MS).await;
    }

    warn!("Time sync failed after {} polls", NTP_MAX_POLLS);
    Err(TimeSyncError::Timeout {
        polls: NTP_MAX_POLLS,
    })
}

// ============================================================================
// SNTP wire format
// ============================================================================

/// SNTP server port
pub const NTP_PORT: u16 = 123;

/// Length of an SNTP packet without extensions
pub const NTP_PACKET_LEN: usize = 48;

/// Seconds from 1900-01-01 (NTP era 0) to 1970-01-01
const NTP_UNIX_OFFSET: i64 = 2_208_988_800;

/// Client request: LI = 0, version 3, mode 3.
pub fn ntp_request() -> [u8; NTP_PACKET_LEN] {
    let mut packet = [0u8; NTP_PACKET_LEN];
    packet[0] = 0x1B;
    packet
}

/// Unix seconds from a server reply's transmit timestamp.
///
/// Rejects short packets, non-server modes and the zero timestamp of an
/// unsynchronised server.
pub fn parse_ntp_response(packet: &[u8]) -> Option<i64> {
    if packet.len() < NTP_PACKET_LEN {
        return None;
    }
    let mode = packet[0] & 0x07;
    if mode != 4 {
        return None;
    }
    let secs = u32::from_be_bytes([packet[40], packet[41], packet[42], packet[43]]);
    if secs == 0 {
        return None;
    }
    Some(i64::from(secs) - NTP_UNIX_OFFSET)
}
