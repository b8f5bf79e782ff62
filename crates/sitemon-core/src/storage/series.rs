//! Bounded reading series in API arrival order.

use alloc::collections::TryReserveError;
use alloc::vec::Vec;

use super::MAX_READINGS;
use super::reading::{Channel, Reading};

/// Up to [`MAX_READINGS`] readings, stored newest-first as received.
///
/// Appending goes towards older readings, so once the series is full any
/// further reading is older than everything kept and is dropped. This keeps
/// the most recent window regardless of how much the API sends.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingSeries {
    readings: Vec<Reading>,
}

impl ReadingSeries {
    pub const fn new() -> Self {
        Self {
            readings: Vec::new(),
        }
    }

    /// Build a series from a newest-first sequence, keeping the most recent
    /// [`MAX_READINGS`] entries.
    pub fn from_newest_first<I>(readings: I) -> Self
    where
        I: IntoIterator<Item = Reading>,
    {
        let mut series = Self::new();
        for reading in readings.into_iter().take(MAX_READINGS) {
            // Bounded by `take`
            series.push_older(reading).ok();
        }
        series
    }

    /// Append a reading older than every stored one.
    ///
    /// Returns the reading back if the series is already full.
    pub fn push_older(&mut self, reading: Reading) -> Result<(), Reading> {
        if self.readings.len() >= MAX_READINGS {
            return Err(reading);
        }
        self.readings.push(reading);
        debug_assert!(self.readings.len() <= MAX_READINGS);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn clear(&mut self) {
        self.readings.clear();
    }

    /// Most recent reading, if any
    pub fn latest(&self) -> Option<&Reading> {
        self.readings.first()
    }

    pub fn newest_first(&self) -> impl DoubleEndedIterator<Item = &Reading> + '_ {
        self.readings.iter()
    }

    pub fn oldest_first(&self) -> impl DoubleEndedIterator<Item = &Reading> + '_ {
        self.readings.iter().rev()
    }

    /// Values of one channel, oldest first, in a freshly allocated buffer.
    pub fn channel_values(&self, channel: Channel) -> Result<Vec<f32>, TryReserveError> {
        let mut values = Vec::new();
        values.try_reserve_exact(self.readings.len())?;
        values.extend(self.oldest_first().map(|r| r.value(channel)));
        Ok(values)
    }
}
