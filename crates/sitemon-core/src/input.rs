//! Button events and the queue between interrupt context and the consumer.
//!
//! Producers only ever call [`signal`], which never blocks and never
//! allocates: if the queue is full the press is dropped. The consumer loop
//! is the only reader.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::debug;

/// Capacity of the input queue
pub const INPUT_QUEUE_DEPTH: usize = 10;

/// Repeats of the same button within this window are ignored
pub const DEBOUNCE_MS: u64 = 200;

/// Logical button events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// Select the next site
    Up,
    /// Select the previous site
    Down,
    /// Fetch the selected site
    Fetch,
    /// Fetch every site in turn
    BulkFetch,
    /// Power down until the next slot boundary
    Sleep,
}

impl InputEvent {
    const COUNT: usize = 5;

    const fn index(self) -> usize {
        match self {
            Self::Up => 0,
            Self::Down => 1,
            Self::Fetch => 2,
            Self::BulkFetch => 3,
            Self::Sleep => 4,
        }
    }
}

pub type InputQueue = Channel<CriticalSectionRawMutex, InputEvent, INPUT_QUEUE_DEPTH>;

/// Queue shared by the platform's button producers and the consumer loop.
pub static INPUT_EVENTS: InputQueue = Channel::new();

/// Enqueue an event without blocking. Returns `false` if the queue was full.
pub fn signal(queue: &InputQueue, event: InputEvent) -> bool {
    queue.try_send(event).is_ok()
}

/// Discard every queued event, returning how many were dropped.
pub fn drain(queue: &InputQueue) -> usize {
    let mut dropped = 0;
    while queue.try_receive().is_ok() {
        dropped += 1;
    }
    if dropped > 0 {
        debug!("Discarded {} queued input events", dropped);
    }
    dropped
}

/// Per-button debounce on the consumer side.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window_ms: u64,
    last_accepted: [Option<u64>; InputEvent::COUNT],
}

impl Debouncer {
    pub const fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            last_accepted: [None; InputEvent::COUNT],
        }
    }

    /// Whether `event` at `now_ms` should be acted on.
    pub fn accept(&mut self, event: InputEvent, now_ms: u64) -> bool {
        let slot = &mut self.last_accepted[event.index()];
        if let Some(last) = *slot
            && now_ms.saturating_sub(last) < self.window_ms
        {
            debug!("Debounced {:?}", event);
            return false;
        }
        *slot = Some(now_ms);
        true
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEBOUNCE_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debounce_same_button() {
        let mut debouncer = Debouncer::default();
        assert!(debouncer.accept(InputEvent::Up, 1_000));
        assert!(!debouncer.accept(InputEvent::Up, 1_150));
        assert!(debouncer.accept(InputEvent::Up, 1_200));
    }

    #[test]
    fn test_debounce_is_per_button() {
        let mut debouncer = Debouncer::default();
        assert!(debouncer.accept(InputEvent::Up, 1_000));
        assert!(debouncer.accept(InputEvent::Down, 1_010));
        assert!(debouncer.accept(InputEvent::Fetch, 1_020));
        assert!(!debouncer.accept(InputEvent::Down, 1_050));
    }

    #[test]
    fn test_rejected_press_does_not_extend_window() {
        let mut debouncer = Debouncer::new(100);
        assert!(debouncer.accept(InputEvent::Fetch, 0));
        assert!(!debouncer.accept(InputEvent::Fetch, 90));
        assert!(debouncer.accept(InputEvent::Fetch, 100));
    }

    #[test]
    fn test_signal_drops_when_full() {
        let queue = InputQueue::new();
        for _ in 0..INPUT_QUEUE_DEPTH {
            assert!(signal(&queue, InputEvent::Up));
        }
        assert!(!signal(&queue, InputEvent::Down));
        assert_eq!(drain(&queue), INPUT_QUEUE_DEPTH);
        assert_eq!(drain(&queue), 0);
    }

    #[test]
    fn test_queue_preserves_order() {
        let queue = InputQueue::new();
        signal(&queue, InputEvent::Down);
        signal(&queue, InputEvent::Fetch);
        assert_eq!(queue.try_receive().ok(), Some(InputEvent::Down));
        assert_eq!(queue.try_receive().ok(), Some(InputEvent::Fetch));
    }
}
