//! Hardware-independent core library for sitemon
//!
//! This crate contains all platform-agnostic logic for the multi-site sensor
//! display: the per-site reading cache, hourly aggregation, fetch/retry
//! orchestration, chart rendering to draw commands, the wake-up scheduler,
//! and the single consumer loop that ties them together.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets (ESP32-S3) and desktop hosts (for the simulator and tests).

#![no_std]

extern crate alloc;

pub mod api;
pub mod app;
pub mod config;
pub mod display;
pub mod fetch;
pub mod http;
pub mod input;
pub mod schedule;
pub mod storage;
pub mod time;
