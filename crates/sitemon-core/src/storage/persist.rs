//! Durable storage of the selected site index.
//!
//! The site index is the only state that survives a restart. Platforms
//! provide a [`SiteIndexStore`]; the encoding below is shared so every
//! backend rejects corrupt or foreign bytes the same way.

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

/// Marks a valid encoded selection
pub const SELECTION_MAGIC: u32 = 0x5173_1D01;

/// Buffer size that always fits an encoded selection
pub const SELECTION_BUF_LEN: usize = 16;

/// Error types for persisting the site index
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// Serialization into the output buffer failed
    #[error("Failed to encode site selection")]
    Encode,

    /// The backing medium rejected the write
    #[error("Failed to write site selection: {reason}")]
    Write {
        /// Backend-specific description
        reason: &'static str,
    },
}

/// Platform storage for the last selected site.
pub trait SiteIndexStore {
    /// Previously saved index, or `None` if nothing valid is stored
    fn load(&mut self) -> Option<usize>;

    /// Persist `site_index`
    fn save(&mut self, site_index: usize) -> Result<(), StoreError>;
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct PersistedSelection {
    magic: u32,
    site_index: u16,
}

/// Encode `site_index` into `buf`, returning the used prefix.
pub fn encode_selection(site_index: usize, buf: &mut [u8]) -> Result<&mut [u8], StoreError> {
    let site_index = u16::try_from(site_index).map_err(|_| StoreError::Encode)?;
    let selection = PersistedSelection {
        magic: SELECTION_MAGIC,
        site_index,
    };
    postcard::to_slice(&selection, buf).map_err(|_| StoreError::Encode)
}

/// Decode bytes written by [`encode_selection`].
pub fn decode_selection(bytes: &[u8]) -> Option<usize> {
    match postcard::from_bytes::<PersistedSelection>(bytes) {
        Ok(sel) if sel.magic == SELECTION_MAGIC => Some(sel.site_index as usize),
        _ => None,
    }
}

/// Pick the boot site: the stored index if it is in range, else the default.
pub fn resolve_site_index(stored: Option<usize>, num_sites: usize) -> usize {
    match stored {
        Some(index) if index < num_sites => index,
        Some(index) => {
            warn!(
                "Stored site index {} out of range, using {}",
                index,
                crate::config::DEFAULT_SITE_INDEX
            );
            crate::config::DEFAULT_SITE_INDEX
        }
        None => crate::config::DEFAULT_SITE_INDEX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_roundtrip() {
        let mut buf = [0u8; SELECTION_BUF_LEN];
        let used = encode_selection(5, &mut buf).unwrap().len();
        assert_eq!(decode_selection(&buf[..used]), Some(5));
    }

    #[test]
    fn test_decode_rejects_foreign_bytes() {
        assert_eq!(decode_selection(&[]), None);
        assert_eq!(decode_selection(&[0u8; SELECTION_BUF_LEN]), None);
        assert_eq!(decode_selection(&[0xFF; 3]), None);
    }

    #[test]
    fn test_encode_rejects_huge_index() {
        let mut buf = [0u8; SELECTION_BUF_LEN];
        assert_eq!(encode_selection(70_000, &mut buf), Err(StoreError::Encode));
    }

    #[test]
    fn test_resolve_site_index_clamps_to_default() {
        assert_eq!(resolve_site_index(Some(3), 8), 3);
        assert_eq!(resolve_site_index(Some(8), 8), 0);
        assert_eq!(resolve_site_index(None, 8), 0);
    }
}
