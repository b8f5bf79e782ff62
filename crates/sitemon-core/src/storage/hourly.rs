//! Hourly aggregation of 5 minute readings.
//!
//! A series of `n` oldest-first values becomes exactly [`HOURS_PER_DAY`]
//! slots. Each complete block of [`READINGS_PER_HOUR`] values is averaged
//! into one slot, and the resulting hours are right-aligned so that the
//! newest complete hour always sits in slot 23. Trailing readings that do
//! not fill a whole hour are dropped, never averaged into a partial slot.

use super::{HOURS_PER_DAY, READINGS_PER_HOUR};

/// Fixed 24-slot hourly series. Slot 0 is the oldest hour.
///
/// Absent slots carry no value at all, so they cannot be drawn as data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourlySeries {
    slots: [Option<f32>; HOURS_PER_DAY],
    available_hours: usize,
}

impl HourlySeries {
    /// A series with every slot absent
    pub const fn empty() -> Self {
        Self {
            slots: [None; HOURS_PER_DAY],
            available_hours: 0,
        }
    }

    /// Aggregate oldest-first 5 minute values into hourly averages.
    pub fn aggregate(values: &[f32]) -> Self {
        let n = values.len();
        let mut series = Self::empty();
        if n < READINGS_PER_HOUR {
            return series;
        }

        let available_hours = (n / READINGS_PER_HOUR).min(HOURS_PER_DAY);
        let first_slot = HOURS_PER_DAY - available_hours;

        for hour in 0..available_hours {
            let start = hour * READINGS_PER_HOUR;
            let end = (start + READINGS_PER_HOUR).min(n);

            let (sum, count) = values[start..end]
                .iter()
                .fold((0.0f32, 0usize), |(sum, count), v| (sum + v, count + 1));

            if count > 0 {
                series.slots[first_slot + hour] = Some(sum / count as f32);
            }
        }

        series.available_hours = available_hours;
        series
    }

    /// Number of complete hours the raw data covered
    pub fn available_hours(&self) -> usize {
        self.available_hours
    }

    /// Value of slot `index`, or `None` if absent or out of range
    pub fn get(&self, index: usize) -> Option<f32> {
        self.slots.get(index).copied().flatten()
    }

    pub fn is_present(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    /// Index of the oldest present slot
    pub fn first_present(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_some)
    }

    /// Index and value of the newest present slot
    pub fn latest_present(&self) -> Option<(usize, f32)> {
        self.present().last()
    }

    /// Present slots as `(index, value)`, oldest first
    pub fn present(&self) -> impl DoubleEndedIterator<Item = (usize, f32)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.map(|v| (i, v)))
    }

    /// Smallest and largest present value
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.present().fold(None, |acc, (_, v)| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

impl Default for HourlySeries {
    fn default() -> Self {
        Self::empty()
    }
}
