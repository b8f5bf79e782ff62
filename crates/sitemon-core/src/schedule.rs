//! Wake-up scheduling aligned to fixed slots past the hour.
//!
//! The sleep timer drifts, so sleeping a fixed slot length from "now" would
//! slowly walk the wake-ups away from the slot boundaries. Instead, the next
//! sleep is measured from the nearest boundary: a device that woke late sleeps
//! a little less, and one that woke early (closer to the next boundary than
//! half a slot) sleeps a little more.

use crate::time::LocalTime;

/// Seconds to sleep so the next wake lands on a `slot_minutes` boundary.
///
/// A `slot_minutes` of zero is treated as one minute.
pub fn next_wake_seconds(slot_minutes: u32, minute: u32, second: u32) -> u32 {
    let slot_secs = slot_minutes.max(1) as i64 * 60;

    let mut elapsed = (minute as i64 % slot_minutes.max(1) as i64) * 60 + second as i64;
    if elapsed > slot_secs / 2 {
        elapsed -= slot_secs;
    }

    u32::try_from(slot_secs - elapsed).unwrap_or(u32::MAX)
}

/// [`next_wake_seconds`] for a local time.
pub fn next_wake_for(slot_minutes: u32, now: &LocalTime) -> u32 {
    next_wake_seconds(slot_minutes, now.minute as u32, now.second as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_early_wake_sleeps_longer() {
        // 1790 s past the boundary is past half a slot: treat as 10 s early
        assert_eq!(next_wake_seconds(30, 29, 50), 1810);
    }

    #[test]
    fn test_late_wake_sleeps_shorter() {
        assert_eq!(next_wake_seconds(30, 0, 5), 1795);
        assert_eq!(next_wake_seconds(30, 31, 0), 1740);
    }

    #[test]
    fn test_exact_boundary() {
        assert_eq!(next_wake_seconds(30, 0, 0), 1800);
        assert_eq!(next_wake_seconds(15, 45, 0), 900);
    }

    #[test]
    fn test_half_slot_threshold_is_exclusive() {
        // Exactly half a slot elapsed is not corrected
        assert_eq!(next_wake_seconds(30, 15, 0), 900);
        // One second past half a slot is
        assert_eq!(next_wake_seconds(30, 15, 1), 2699);
    }

    #[test]
    fn test_zero_slot_uses_one_minute() {
        assert_eq!(next_wake_seconds(0, 10, 10), 50);
    }

    #[test]
    fn test_result_within_one_and_a_half_slots() {
        for slot in [5u32, 10, 15, 30, 60] {
            for minute in 0..60 {
                for second in [0u32, 1, 29, 30, 59] {
                    let sleep = next_wake_seconds(slot, minute, second);
                    assert!(sleep >= slot * 30, "slot {slot} at {minute}:{second}");
                    assert!(sleep < slot * 90, "slot {slot} at {minute}:{second}");
                }
            }
        }
    }

    #[test]
    fn test_huge_slot_saturates() {
        assert_eq!(next_wake_seconds(u32::MAX, 0, 0), u32::MAX);
        assert_eq!(next_wake_seconds(80_000_000, 10, 0), u32::MAX);
    }

    #[test]
    fn test_next_wake_for_local_time() {
        let now = LocalTime::from_unix(1_763_856_000 + 29 * 60 + 50, 0);
        assert_eq!(next_wake_for(30, &now), 1810);
    }
}
