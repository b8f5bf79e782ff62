//! Desktop simulator for the sitemon multi-site e-paper display.
//!
//! Runs the real sitemon-core consumer loop on a worker thread against a
//! mock API, and shows every panel refresh in an SDL2 window via
//! `embedded-graphics-simulator`. The selected site is persisted to a file
//! the same way the device keeps it in RTC memory.
//!
//! # Usage
//!
//! `sitemon-simulator [config.json]`
//!
//! # Key bindings
//!
//! | Key         | Action                         |
//! |-------------|--------------------------------|
//! | Up / Right  | Next site                      |
//! | Down / Left | Previous site                  |
//! | F           | Fetch the selected site        |
//! | B           | Fetch every site               |
//! | S           | Sleep (the simulator exits)    |
//! | Q / Esc     | Quit                           |

use std::f64::consts::TAU;
use std::future::poll_fn;
use std::path::PathBuf;
use std::pin::pin;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::task::{Context, Poll, Waker};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics_simulator::{
    BinaryColorTheme, OutputSettingsBuilder, SimulatorDisplay, SimulatorEvent, Window,
    sdl2::Keycode,
};
use embedded_hal_async::delay::DelayNs;
use log::{error, info, warn};
use serde_json::json;

use sitemon_core::api::{SitePayload, decode_payload};
use sitemon_core::app::{App, Control};
use sitemon_core::config::{Config, DEFAULT_UTC_OFFSET_SECS};
use sitemon_core::display::{DISPLAY_HEIGHT_PX, DISPLAY_WIDTH_PX, FrameBuffer, Panel, RenderError};
use sitemon_core::fetch::{FetchError, SiteFetcher};
use sitemon_core::input::{INPUT_EVENTS, InputEvent, signal};
use sitemon_core::storage::persist::{SELECTION_BUF_LEN, decode_selection, encode_selection};
use sitemon_core::storage::{SiteIndexStore, StoreError};
use sitemon_core::time::{LocalTime, TimeSource};

// ---------------------------------------------------------------------------
// Simulation constants
// ---------------------------------------------------------------------------

/// Pixel scale factor for the simulator window.
const WINDOW_SCALE: u32 = 2;

/// Target frame duration (~30 FPS).
const FRAME_DURATION: Duration = Duration::from_millis(33);

/// Interval between polls of the consumer loop.
const POLL_TICK: Duration = Duration::from_millis(1);

/// Round trip of one mock API request.
const MOCK_LATENCY: Duration = Duration::from_millis(400);

/// Time an e-paper full refresh takes.
const PANEL_REFRESH: Duration = Duration::from_millis(300);

/// Sites whose logger never answers.
const OFFLINE_SITES: [&str; 1] = ["Igoo"];

/// Sites that only report part of the day, leaving leading gaps.
const PARTIAL_SITES: [&str; 1] = ["Stakmo"];

/// Weather stations; everything else reports as a drip line.
const AIR_SITES: [&str; 3] = ["Sakti", "Baroo", "Ayee"];

const READING_INTERVAL_SECS: i64 = 300;

const SELECTION_FILE: &str = "sitemon-selection.bin";

// ---------------------------------------------------------------------------
// Platform doubles
// ---------------------------------------------------------------------------

/// Drive `fut` to completion on this thread, re-polling it every tick
/// instead of waiting for a wake-up.
fn run_paced<F: Future>(fut: F) -> F::Output {
    let mut fut = pin!(fut);
    let mut cx = Context::from_waker(Waker::noop());
    loop {
        if let Poll::Ready(output) = fut.as_mut().poll(&mut cx) {
            return output;
        }
        thread::sleep(POLL_TICK);
    }
}

/// Resolve once `deadline` has passed.
async fn until(deadline: Instant) {
    poll_fn(|_| {
        if Instant::now() >= deadline {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    })
    .await
}

/// Wall-clock delay that still lets `select` poll its other branch.
struct StdDelay;

impl DelayNs for StdDelay {
    async fn delay_ns(&mut self, ns: u32) {
        until(Instant::now() + Duration::from_nanos(ns.into())).await
    }

    async fn delay_ms(&mut self, ms: u32) {
        until(Instant::now() + Duration::from_millis(ms.into())).await
    }
}

/// Host clock. Reads as unset until the first sync, like the device.
struct SystemClock {
    boot: Instant,
    synced: bool,
}

impl SystemClock {
    fn new() -> Self {
        Self {
            boot: Instant::now(),
            synced: false,
        }
    }
}

impl TimeSource for SystemClock {
    async fn start_sync(&mut self) {
        self.synced = true;
    }

    fn now_unix(&self) -> Option<i64> {
        self.synced.then(unix_now)
    }

    fn uptime_ms(&self) -> u64 {
        self.boot.elapsed().as_millis() as u64
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Site selection kept in a file next to the working directory.
struct FileStore {
    path: PathBuf,
}

impl SiteIndexStore for FileStore {
    fn load(&mut self) -> Option<usize> {
        let bytes = std::fs::read(&self.path).ok()?;
        decode_selection(&bytes)
    }

    fn save(&mut self, site_index: usize) -> Result<(), StoreError> {
        let mut buf = [0u8; SELECTION_BUF_LEN];
        let encoded = encode_selection(site_index, &mut buf)?;
        std::fs::write(&self.path, encoded).map_err(|e| {
            warn!("Writing {}: {}", self.path.display(), e);
            StoreError::Write {
                reason: "file write failed",
            }
        })
    }
}

/// Hands finished frames to the window thread.
struct WindowPanel {
    frames: Sender<Vec<u8>>,
}

impl Panel for WindowPanel {
    async fn show(&mut self, frame: &FrameBuffer) -> Result<(), RenderError> {
        until(Instant::now() + PANEL_REFRESH).await;
        self.frames
            .send(frame.as_bytes().to_vec())
            .map_err(|_| RenderError::Panel)
    }
}

// ---------------------------------------------------------------------------
// Mock API
// ---------------------------------------------------------------------------

/// Serves synthetic readings through the real payload decoder.
struct MockFetcher {
    requests: u32,
}

impl SiteFetcher for MockFetcher {
    async fn ensure_connected(&mut self) -> Result<(), FetchError> {
        Ok(())
    }

    async fn fetch(&mut self, site: &str, count: u16) -> Result<SitePayload, FetchError> {
        self.requests += 1;
        until(Instant::now() + MOCK_LATENCY).await;

        if OFFLINE_SITES.contains(&site) {
            return Err(FetchError::Network {
                reason: "host unreachable",
            });
        }

        let body = mock_body(site, count, unix_now());
        info!(
            "Mock request {} for {}: {} bytes",
            self.requests,
            site,
            body.len()
        );
        Ok(decode_payload(&body)?)
    }
}

fn mock_body(site: &str, count: u16, now: i64) -> Vec<u8> {
    let phase = site.bytes().map(f64::from).sum::<f64>() / 100.0;
    let count = if PARTIAL_SITES.contains(&site) {
        count / 2
    } else {
        count
    };
    let latest = now - now.rem_euclid(READING_INTERVAL_SECS);

    let readings: Vec<_> = (0..i64::from(count))
        .map(|i| mock_reading(latest - i * READING_INTERVAL_SECS, i as u32, phase))
        .collect();

    json!({
        "site_name": site,
        "site_type": if AIR_SITES.contains(&site) { "air" } else { "drip" },
        "active": true,
        "timezone_offset": DEFAULT_UTC_OFFSET_SECS,
        "query_time": now,
        "current": readings.first(),
        "readings": readings,
    })
    .to_string()
    .into_bytes()
}

fn mock_reading(dt: i64, age: u32, phase: f64) -> serde_json::Value {
    let day = dt as f64 / 86_400.0;
    let local = LocalTime::from_unix(dt, DEFAULT_UTC_OFFSET_SECS);

    json!({
        "dt": dt,
        "timestamp": format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            local.year, local.month, local.day, local.hour, local.minute, local.second
        ),
        // Cold nights, mild afternoons
        "temperature": 2.0 + 9.0 * (TAU * day + phase).sin(),
        "water_temp": 5.0 + 3.0 * (TAU * day + phase - 0.8).sin(),
        "pressure": 1.1 + 0.4 * (TAU * 3.0 * day + phase).cos(),
        "voltage": 3.9 + 0.2 * (TAU * day + phase).sin(),
        "counter": 100_000 - age,
    })
}

// ---------------------------------------------------------------------------
// Setup helpers
// ---------------------------------------------------------------------------

/// Config from the JSON file given as the first argument, or the defaults.
fn load_config() -> Config<'static> {
    let Some(path) = std::env::args().nth(1) else {
        return Config::default();
    };

    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) => {
            error!("Reading {}: {}, using defaults", path, e);
            return Config::default();
        }
    };

    // Borrowed fields live for the rest of the process
    let text: &'static str = Box::leak(text.into_boxed_str());
    match serde_json::from_str(text) {
        Ok(config) => {
            info!("Loaded config from {}", path);
            config
        }
        Err(e) => {
            error!("Parsing {}: {}, using defaults", path, e);
            Config::default()
        }
    }
}

/// Map an SDL keycode to a button event.
fn keycode_to_event(keycode: Keycode) -> Option<InputEvent> {
    match keycode {
        Keycode::Up | Keycode::Right => Some(InputEvent::Up),
        Keycode::Down | Keycode::Left => Some(InputEvent::Down),
        Keycode::F => Some(InputEvent::Fetch),
        Keycode::B => Some(InputEvent::BulkFetch),
        Keycode::S => Some(InputEvent::Sleep),
        _ => None,
    }
}

/// Copy panel bytes (set bit = white) into the window buffer.
fn blit<D: DrawTarget<Color = BinaryColor>>(display: &mut D, bytes: &[u8]) {
    let row_bytes = DISPLAY_WIDTH_PX as usize / 8;
    let pixels = bytes.iter().enumerate().flat_map(|(i, byte)| {
        let y = (i / row_bytes) as i32;
        let x0 = ((i % row_bytes) * 8) as i32;
        (0..8).map(move |bit| {
            let color = if byte & (0x80u8 >> bit) == 0 {
                BinaryColor::On
            } else {
                BinaryColor::Off
            };
            Pixel(Point::new(x0 + bit, y), color)
        })
    });
    let _ = display.draw_iter(pixels);
}

fn spawn_consumer(config: Config<'static>, frames: Sender<Vec<u8>>) -> thread::JoinHandle<Control> {
    thread::Builder::new()
        .name("consumer".into())
        .spawn(move || {
            let mut app = App::new(
                config,
                MockFetcher { requests: 0 },
                SystemClock::new(),
                FileStore {
                    path: PathBuf::from(SELECTION_FILE),
                },
                WindowPanel { frames },
                StdDelay,
            );

            run_paced(async {
                if let Err(e) = app.boot(&INPUT_EVENTS).await {
                    error!("Boot failed: {}", e);
                }
                app.run(&INPUT_EVENTS).await
            })
        })
        .expect("Failed to spawn consumer thread")
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    env_logger::init();
    info!("Starting sitemon simulator");
    info!(
        "Display: {}×{} (scale {}×)",
        DISPLAY_WIDTH_PX, DISPLAY_HEIGHT_PX, WINDOW_SCALE
    );
    info!("Keys: Up/Down=Site  F=Fetch  B=Fetch all  S=Sleep  Q=Quit");

    let config = load_config();

    let mut display = SimulatorDisplay::<BinaryColor>::new(Size::new(
        DISPLAY_WIDTH_PX as u32,
        DISPLAY_HEIGHT_PX as u32,
    ));
    let output_settings = OutputSettingsBuilder::new()
        .scale(WINDOW_SCALE)
        .theme(BinaryColorTheme::LcdWhite)
        .build();
    let mut window = Window::new("Sitemon Simulator", &output_settings);

    let (tx, frames): (Sender<Vec<u8>>, Receiver<Vec<u8>>) = mpsc::channel();
    let consumer = spawn_consumer(config, tx);

    // The SDL window is lazily initialized on the first `update()` call.
    // We must call `update()` once before `events()` or it will panic.
    let _ = display.clear(BinaryColor::Off);
    window.update(&display);

    'running: loop {
        let frame_start = Instant::now();

        for event in window.events() {
            match event {
                SimulatorEvent::Quit => break 'running,
                SimulatorEvent::KeyDown { keycode, .. } => {
                    if keycode == Keycode::Q || keycode == Keycode::Escape {
                        break 'running;
                    }
                    if let Some(input) = keycode_to_event(keycode)
                        && !signal(&INPUT_EVENTS, input)
                    {
                        warn!("Input queue full, dropped {:?}", input);
                    }
                }
                _ => {}
            }
        }

        loop {
            match frames.try_recv() {
                Ok(bytes) => blit(&mut display, &bytes),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    window.update(&display);
                    match consumer.join() {
                        Ok(Control::Sleep { seconds }) => {
                            info!("Device would sleep for {} s, exiting", seconds)
                        }
                        Ok(Control::Continue) => {}
                        Err(_) => error!("Consumer thread panicked"),
                    }
                    return;
                }
            }
        }

        window.update(&display);

        let elapsed = frame_start.elapsed();
        if elapsed < FRAME_DURATION {
            thread::sleep(FRAME_DURATION - elapsed);
        }
    }

    info!("Simulator exiting");
}
