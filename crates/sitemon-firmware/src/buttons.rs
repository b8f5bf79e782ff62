//! Button edge detection.
//!
//! One task per button waits for a falling edge and forwards the logical
//! event to the input queue. Debouncing happens on the consumer side.

use esp_hal::gpio::Input;
use log::warn;
use sitemon_core::input::{INPUT_EVENTS, InputEvent, signal};

/// Buttons on the board; one task is spawned for each.
pub const BUTTON_COUNT: usize = 5;

#[embassy_executor::task(pool_size = BUTTON_COUNT)]
pub async fn button_task(mut pin: Input<'static>, event: InputEvent) {
    loop {
        pin.wait_for_falling_edge().await;
        if !signal(&INPUT_EVENTS, event) {
            warn!("Input queue full, dropped {:?}", event);
        }
    }
}
