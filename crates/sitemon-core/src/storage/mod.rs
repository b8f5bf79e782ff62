//! Per-site reading storage and hourly aggregation.
//!
//! Readings arrive from the API as a newest-first series sampled every five
//! minutes. They are kept per site in a volatile [`SiteCache`], and collapsed
//! into a fixed 24-slot [`HourlySeries`] for charting.

pub mod cache;
pub mod hourly;
pub mod persist;
pub mod reading;
pub mod series;

pub use cache::{SiteCache, SiteSnapshot};
pub use hourly::HourlySeries;
pub use persist::{SiteIndexStore, StoreError};
pub use reading::{Channel, Reading, SiteInfo, SiteKind};
pub use series::ReadingSeries;

/// Readings per hour at the 5 minute cadence.
pub const READINGS_PER_HOUR: usize = 12;

/// Hourly slots shown on every chart.
pub const HOURS_PER_DAY: usize = 24;

/// Capacity of a reading series: one day of 5 minute readings.
pub const MAX_READINGS: usize = READINGS_PER_HOUR * HOURS_PER_DAY;
