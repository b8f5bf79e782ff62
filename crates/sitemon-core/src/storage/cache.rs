//! Volatile per-site cache of the last successful fetch.
//!
//! There is exactly one entry per known site, created empty at startup.
//! A successful fetch overwrites the entry in place; nothing is ever evicted
//! otherwise. The consumer loop owns the cache, so no locking is involved.

use alloc::vec::Vec;
use log::{debug, warn};

use super::reading::{Reading, SiteInfo};
use super::series::ReadingSeries;
use crate::time::{DateString, TimeString};

/// Everything needed to redraw a site without touching the network.
///
/// The consumer keeps one of these as its working copy; the cache holds one
/// per site.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteSnapshot {
    pub info: SiteInfo,
    /// Latest reading reported separately by the API
    pub current: Option<Reading>,
    pub series: ReadingSeries,
    /// Local time of the fetch, `HH:MM:SS`
    pub time_str: TimeString,
    /// Local date of the fetch, `Sun, 23. Nov 2025`
    pub date_str: DateString,
}

impl SiteSnapshot {
    pub fn clear(&mut self) {
        self.info = SiteInfo::default();
        self.current = None;
        self.series.clear();
        self.time_str.clear();
        self.date_str.clear();
    }

    pub fn has_readings(&self) -> bool {
        !self.series.is_empty()
    }
}

#[derive(Debug, Default)]
struct CacheEntry {
    has_data: bool,
    snapshot: SiteSnapshot,
}

/// One [`SiteSnapshot`] slot per known site.
#[derive(Debug)]
pub struct SiteCache {
    entries: Vec<CacheEntry>,
}

impl SiteCache {
    /// Create an empty cache for `num_sites` sites
    pub fn new(num_sites: usize) -> Self {
        let mut entries = Vec::with_capacity(num_sites);
        entries.resize_with(num_sites, CacheEntry::default);
        Self { entries }
    }

    pub fn num_sites(&self) -> usize {
        self.entries.len()
    }

    /// Copy `snapshot` into the entry for `site`, replacing what was there.
    ///
    /// Returns `false` if `site` is out of range.
    pub fn save(&mut self, site: usize, snapshot: &SiteSnapshot) -> bool {
        let Some(entry) = self.entries.get_mut(site) else {
            warn!("Cache save for unknown site index {}", site);
            return false;
        };
        entry.snapshot.clone_from(snapshot);
        entry.has_data = true;
        debug!(
            "Cached site {} ({} readings, {})",
            site,
            snapshot.series.len(),
            snapshot.time_str
        );
        true
    }

    /// Copy the entry for `site` into `working`.
    ///
    /// If the site has never been populated, `working` is cleared and `false`
    /// is returned.
    pub fn restore(&self, site: usize, working: &mut SiteSnapshot) -> bool {
        match self.entries.get(site) {
            Some(entry) if entry.has_data => {
                working.clone_from(&entry.snapshot);
                debug!("Restored site {} from cache", site);
                true
            }
            _ => {
                working.clear();
                debug!("No cached data for site {}", site);
                false
            }
        }
    }

    pub fn is_populated(&self, site: usize) -> bool {
        self.entries.get(site).is_some_and(|e| e.has_data)
    }

    /// Whether any site has been fetched since startup
    pub fn any_populated(&self) -> bool {
        self.entries.iter().any(|e| e.has_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::reading::SiteKind;

    fn snapshot(counter: u32) -> SiteSnapshot {
        let reading = Reading {
            counter,
            air_temperature: counter as f32,
            ..Default::default()
        };
        let mut snapshot = SiteSnapshot {
            current: Some(reading.clone()),
            series: ReadingSeries::from_newest_first([reading]),
            ..Default::default()
        };
        snapshot.info.kind = SiteKind::Drip;
        snapshot.time_str.push_str("10:15:00").unwrap();
        snapshot.date_str.push_str("Sun, 23. Nov 2025").unwrap();
        snapshot
    }

    #[test]
    fn test_new_cache_is_cold() {
        let cache = SiteCache::new(8);
        assert_eq!(cache.num_sites(), 8);
        assert!(!cache.any_populated());
    }

    #[test]
    fn test_save_then_restore_roundtrip() {
        let mut cache = SiteCache::new(4);
        let saved = snapshot(7);
        assert!(cache.save(2, &saved));

        let mut working = SiteSnapshot::default();
        assert!(cache.restore(2, &mut working));
        assert_eq!(working, saved);
        assert!(cache.any_populated());
        assert!(cache.is_populated(2));
        assert!(!cache.is_populated(1));
    }

    #[test]
    fn test_restore_unpopulated_clears_working() {
        let cache = SiteCache::new(4);
        let mut working = snapshot(3);

        assert!(!cache.restore(1, &mut working));
        assert!(!working.has_readings());
        assert!(working.current.is_none());
        assert!(working.time_str.is_empty());
    }

    #[test]
    fn test_save_overwrites_previous_snapshot() {
        let mut cache = SiteCache::new(2);
        cache.save(0, &snapshot(1));
        cache.save(0, &snapshot(2));

        let mut working = SiteSnapshot::default();
        cache.restore(0, &mut working);
        assert_eq!(working.current.map(|r| r.counter), Some(2));
    }

    #[test]
    fn test_out_of_range_site() {
        let mut cache = SiteCache::new(2);
        assert!(!cache.save(5, &snapshot(1)));
        assert!(!cache.any_populated());

        let mut working = snapshot(1);
        assert!(!cache.restore(5, &mut working));
        assert!(!working.has_readings());
    }
}
