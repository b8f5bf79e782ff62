//! Site selection kept in RTC fast memory.
//!
//! The bytes survive deep sleep but not a power cycle. Garbage left over from
//! power-up fails the magic check in [`decode_selection`] and is ignored.

use log::debug;
use sitemon_core::storage::persist::{SELECTION_BUF_LEN, decode_selection, encode_selection};
use sitemon_core::storage::{SiteIndexStore, StoreError};

#[esp_hal::ram(unstable(rtc_fast, persistent))]
static mut SELECTION: [u8; SELECTION_BUF_LEN] = [0; SELECTION_BUF_LEN];

/// [`SiteIndexStore`] backed by RTC fast memory.
#[derive(Debug, Default)]
pub struct RtcSiteStore;

impl SiteIndexStore for RtcSiteStore {
    fn load(&mut self) -> Option<usize> {
        // Single consumer task; nothing else touches SELECTION.
        let bytes = unsafe { *(&raw const SELECTION) };
        decode_selection(&bytes)
    }

    fn save(&mut self, site_index: usize) -> Result<(), StoreError> {
        let mut buf = [0u8; SELECTION_BUF_LEN];
        let used = encode_selection(site_index, &mut buf)?.len();
        unsafe {
            *(&raw mut SELECTION) = buf;
        }
        debug!("Stored site {} in RTC memory ({} bytes)", site_index, used);
        Ok(())
    }
}
