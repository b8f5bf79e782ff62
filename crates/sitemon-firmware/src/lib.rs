//! ESP32-S3 firmware-specific modules for sitemon
//!
//! This crate contains hardware-specific code that cannot compile on desktop
//! targets: the SSD1683 e-paper driver, WiFi and HTTP plumbing, SNTP, button
//! interrupts, and RTC-memory persistence of the selected site.

#![no_std]

extern crate alloc;

pub mod buttons;
pub mod epd;
pub mod net;
pub mod rtc_store;
pub mod sntp;
