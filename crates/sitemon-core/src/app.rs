//! The single consumer loop.
//!
//! [`App`] owns the site cache, the working [`SiteSnapshot`] and the frame
//! buffer. Everything runs sequentially on one task: button events come in
//! through the input queue, fetches and panel refreshes are awaited in
//! place, and nothing else ever touches the cache.

use alloc::vec::Vec;

use embassy_futures::select::{Either, select};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_hal_async::delay::DelayNs;
use log::{debug, error, info, warn};
use thiserror_no_std::Error;

use crate::api::SitePayload;
use crate::config::{Config, SITES};
use crate::display::screens::{self, Header};
use crate::display::{FrameBuffer, Panel, RenderError, execute};
use crate::fetch::{FetchError, RetryPolicy, SiteFetcher, fetch_with_retry};
use crate::input::{Debouncer, InputEvent, InputQueue, drain};
use crate::schedule::next_wake_for;
use crate::storage::persist::resolve_site_index;
use crate::storage::{SiteCache, SiteIndexStore, SiteSnapshot};
use crate::time::{LocalTime, TimeSource, TimeSyncError, local_now, wait_for_sync};

/// Pause between sites during a bulk fetch
pub const BULK_FETCH_THROTTLE_MS: u32 = 500;

/// Sleep slot used when no refresh slot is configured
pub const DEFAULT_SLEEP_SLOT_MINUTES: u32 = 30;

/// Commands reserved up front for a message screen
const MESSAGE_COMMAND_CAPACITY: usize = 16;

/// Errors surfaced by one event. None of them is fatal.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AppError {
    #[error("Fetch failed: {0}")]
    Fetch(FetchError),
    #[error("Time sync failed: {0}")]
    TimeSync(TimeSyncError),
    #[error("Render failed: {0}")]
    Render(RenderError),
}

impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        Self::Fetch(err)
    }
}

impl From<TimeSyncError> for AppError {
    fn from(err: TimeSyncError) -> Self {
        Self::TimeSync(err)
    }
}

impl From<RenderError> for AppError {
    fn from(err: RenderError) -> Self {
        Self::Render(err)
    }
}

/// What the panel currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// Charts for a site with readings
    SiteData { site: usize },
    /// Placeholder for a site with nothing to show
    NoData { site: usize },
    /// Placeholder after an explicit fetch ran out of attempts
    FetchFailed { site: usize },
    /// The access point could not be joined
    WifiError,
}

/// Outcome of handling one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    /// Power down for `seconds`, then start over
    Sleep { seconds: u32 },
}

pub struct App<'a, F, T, S, P, D>
where
    F: SiteFetcher,
    T: TimeSource,
    S: SiteIndexStore,
    P: Panel,
    D: DelayNs,
{
    config: Config<'a>,
    fetcher: F,
    clock: T,
    store: S,
    panel: P,
    delay: D,
    retry: RetryPolicy,
    cache: SiteCache,
    /// Working copy for the selected site
    working: SiteSnapshot,
    site_index: usize,
    /// Scratch buffer each screen is drawn into
    frame: FrameBuffer,
    /// Last frame the panel accepted
    shown: Option<FrameBuffer>,
    debouncer: Debouncer,
    screen: Option<Screen>,
}

impl<'a, F, T, S, P, D> App<'a, F, T, S, P, D>
where
    F: SiteFetcher,
    T: TimeSource,
    S: SiteIndexStore,
    P: Panel,
    D: DelayNs,
{
    pub fn new(config: Config<'a>, fetcher: F, clock: T, store: S, panel: P, delay: D) -> Self {
        Self {
            config,
            fetcher,
            clock,
            store,
            panel,
            delay,
            retry: RetryPolicy::default(),
            cache: SiteCache::new(SITES.len()),
            working: SiteSnapshot::default(),
            site_index: 0,
            frame: FrameBuffer::new(),
            shown: None,
            debouncer: Debouncer::default(),
            screen: None,
        }
    }

    /// Replace the default retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn site_index(&self) -> usize {
        self.site_index
    }

    pub fn screen(&self) -> Option<Screen> {
        self.screen
    }

    pub fn cache(&self) -> &SiteCache {
        &self.cache
    }

    /// Restore the persisted selection and populate the cache if it is cold.
    ///
    /// Button tasks may already be running; anything they queue during the
    /// cold-start fetch is dropped.
    pub async fn boot(&mut self, queue: &InputQueue) -> Result<(), AppError> {
        self.site_index = resolve_site_index(self.store.load(), SITES.len());
        info!(
            "Booting with site {} ({})",
            self.site_index, SITES[self.site_index]
        );

        if self.cache.any_populated() {
            return self.show_selected().await;
        }

        info!("Cold start, fetching every site");
        let result = self.bulk_cold_start_fetch().await;
        drain(queue);
        result
    }

    /// Wait for events and handle them until one asks to sleep.
    ///
    /// With a refresh slot configured, the selected site is refetched
    /// whenever a slot boundary passes without input.
    ///
    /// Presses queued while a bulk fetch ran are discarded rather than
    /// replayed.
    pub async fn run(&mut self, queue: &InputQueue) -> Control {
        loop {
            let event = match self.config.schedule.refresh_slot_minutes {
                Some(_) => {
                    let wait_ms = self.wake_delay_secs().saturating_mul(1_000);
                    match select(queue.receive(), self.delay.delay_ms(wait_ms)).await {
                        Either::First(event) => event,
                        Either::Second(()) => {
                            info!("Refresh slot reached");
                            InputEvent::Fetch
                        }
                    }
                }
                None => queue.receive().await,
            };

            if !self.debouncer.accept(event, self.clock.uptime_ms()) {
                continue;
            }

            match self.handle_event(event).await {
                Ok(Control::Continue) => {}
                Ok(control) => return control,
                Err(e) => error!("{:?} failed: {}", event, e),
            }

            if event == InputEvent::BulkFetch {
                drain(queue);
            }
        }
    }

    /// Handle one (already debounced) event.
    pub async fn handle_event(&mut self, event: InputEvent) -> Result<Control, AppError> {
        debug!("Handling {:?}", event);
        match event {
            InputEvent::Up => self.select_site(1).await?,
            InputEvent::Down => self.select_site(SITES.len() - 1).await?,
            InputEvent::Fetch => self.fetch_selected().await?,
            InputEvent::BulkFetch => self.bulk_cold_start_fetch().await?,
            InputEvent::Sleep => {
                let seconds = self.wake_delay_secs();
                info!("Sleeping for {} s", seconds);
                return Ok(Control::Sleep { seconds });
            }
        }
        Ok(Control::Continue)
    }

    /// Fetch every site in order, showing each as it arrives, then return
    /// to the originally selected site.
    pub async fn bulk_cold_start_fetch(&mut self) -> Result<(), AppError> {
        if !self.ensure_connected().await {
            return Ok(());
        }
        let synced = wait_for_sync(
            &mut self.clock,
            &mut self.delay,
            self.config.schedule.utc_offset_secs,
        )
        .await?;

        let original = self.site_index;
        let mut fetched = 0;

        for (site, name) in SITES.iter().enumerate() {
            self.site_index = site;
            let result = fetch_with_retry(
                &mut self.fetcher,
                &mut self.delay,
                name,
                self.config.api.reading_count,
                self.retry,
            )
            .await;

            let screen = match result {
                Ok(payload) => {
                    let now = self.local_time().unwrap_or(synced);
                    self.apply_payload(payload, &now);
                    self.cache.save(site, &self.working);
                    fetched += 1;
                    Screen::SiteData { site }
                }
                Err(_) => {
                    self.working.clear();
                    self.working.time_str = synced.time_str();
                    self.working.date_str = synced.date_str();
                    Screen::NoData { site }
                }
            };
            if let Err(e) = self.render(screen).await {
                warn!("Bulk fetch: rendering site {} failed: {}", site, e);
            }

            if site + 1 < SITES.len() {
                self.delay.delay_ms(BULK_FETCH_THROTTLE_MS).await;
            }
        }

        info!("Bulk fetch done: {} of {} sites", fetched, SITES.len());
        self.site_index = original;
        self.show_selected().await
    }

    async fn select_site(&mut self, step: usize) -> Result<(), AppError> {
        self.site_index = (self.site_index + step) % SITES.len();
        info!("Selected site {} ({})", self.site_index, SITES[self.site_index]);

        if let Err(e) = self.store.save(self.site_index) {
            warn!("Could not persist site index: {}", e);
        }
        self.show_selected().await
    }

    async fn fetch_selected(&mut self) -> Result<(), AppError> {
        if !self.ensure_connected().await {
            return Ok(());
        }
        let now = wait_for_sync(
            &mut self.clock,
            &mut self.delay,
            self.config.schedule.utc_offset_secs,
        )
        .await?;

        let site = self.site_index;
        match fetch_with_retry(
            &mut self.fetcher,
            &mut self.delay,
            SITES[site],
            self.config.api.reading_count,
            self.retry,
        )
        .await
        {
            Ok(payload) => {
                self.apply_payload(payload, &now);
                self.cache.save(site, &self.working);
                self.render(Screen::SiteData { site }).await?;
            }
            Err(e) => {
                self.render(Screen::FetchFailed { site }).await?;
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Restore the selected site from the cache and draw it.
    async fn show_selected(&mut self) -> Result<(), AppError> {
        let site = self.site_index;
        let screen = if self.cache.restore(site, &mut self.working) && self.working.has_readings()
        {
            Screen::SiteData { site }
        } else {
            Screen::NoData { site }
        };
        self.render(screen).await
    }

    async fn ensure_connected(&mut self) -> bool {
        match self.fetcher.ensure_connected().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Network unavailable: {}", e);
                if let Err(e) = self.render(Screen::WifiError).await {
                    warn!("Could not show WiFi error: {}", e);
                }
                false
            }
        }
    }

    fn apply_payload(&mut self, payload: SitePayload, now: &LocalTime) {
        self.working.info = payload.info;
        self.working.current = payload.current;
        self.working.series = payload.readings;
        self.working.time_str = now.time_str();
        self.working.date_str = now.date_str();
    }

    fn local_time(&self) -> Option<LocalTime> {
        local_now(&self.clock, self.config.schedule.utc_offset_secs)
    }

    /// Seconds until the next slot boundary, or a whole slot without a clock.
    fn wake_delay_secs(&self) -> u32 {
        let slot = self
            .config
            .schedule
            .refresh_slot_minutes
            .unwrap_or(DEFAULT_SLEEP_SLOT_MINUTES)
            .max(1);
        match self.local_time() {
            Some(now) => next_wake_for(slot, &now),
            None => {
                debug!("Clock not set, sleeping a full slot");
                slot.saturating_mul(60)
            }
        }
    }

    async fn render(&mut self, screen: Screen) -> Result<(), AppError> {
        let mut commands = Vec::new();
        commands
            .try_reserve(MESSAGE_COMMAND_CAPACITY)
            .map_err(|_| RenderError::Allocation)?;

        let site = match screen {
            Screen::SiteData { site } | Screen::NoData { site } | Screen::FetchFailed { site } => {
                site
            }
            Screen::WifiError => self.site_index,
        };
        let header = Header {
            site: SITES[site],
            region: self.config.display.region,
            time_str: &self.working.time_str,
            date_str: &self.working.date_str,
        };

        match screen {
            Screen::SiteData { .. } => screens::site_screen(&header, &self.working, &mut commands)?,
            Screen::NoData { .. } => screens::no_data_screen(&header, &mut commands),
            Screen::FetchFailed { .. } => screens::fetch_failed_screen(&header, &mut commands),
            Screen::WifiError => screens::wifi_error_screen(self.config.internet.ssid, &mut commands),
        }

        let Ok(()) = self.frame.clear(BinaryColor::Off);
        let Ok(()) = execute(&commands, &mut self.frame);
        drop(commands);

        let changed = match &self.shown {
            Some(shown) => shown.diff(&self.frame),
            None => Some(self.frame.bounding_box()),
        };
        match changed {
            Some(region) => {
                debug!("Refreshing panel for {:?}, changed {:?}", screen, region);
                self.panel.show(&self.frame).await?;
                // The old frame becomes the next scratch buffer
                match &mut self.shown {
                    Some(shown) => core::mem::swap(shown, &mut self.frame),
                    None => self.shown = Some(core::mem::take(&mut self.frame)),
                }
            }
            None => debug!("{:?} unchanged, skipping refresh", screen),
        }
        self.screen = Some(screen);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;
    use core::cell::Cell;
    use embassy_futures::block_on;
    use embedded_graphics::primitives::Rectangle;

    use crate::api::PayloadError;
    use crate::input::signal;
    use crate::storage::StoreError;
    use crate::storage::{Reading, ReadingSeries, SiteInfo, SiteKind};

    /// 2025-11-23 00:29:50 UTC
    const NOW: i64 = 1_763_856_000 + 29 * 60 + 50;

    struct FakeFetcher<'q> {
        connected: bool,
        failing: Vec<&'static str>,
        error: FetchError,
        readings: usize,
        calls: Vec<String>,
        /// Queue that receives `Up` on each of the first 8 fetches, then `Sleep`
        presses: Option<&'q InputQueue>,
    }

    impl FakeFetcher<'_> {
        fn new() -> Self {
            Self {
                connected: true,
                failing: Vec::new(),
                error: FetchError::Network { reason: "refused" },
                readings: 48,
                calls: Vec::new(),
                presses: None,
            }
        }

        fn failing(sites: &[&'static str]) -> Self {
            Self {
                failing: sites.to_vec(),
                ..Self::new()
            }
        }
    }

    impl SiteFetcher for FakeFetcher<'_> {
        async fn ensure_connected(&mut self) -> Result<(), FetchError> {
            if self.connected {
                Ok(())
            } else {
                Err(FetchError::NotConnected)
            }
        }

        async fn fetch(&mut self, site: &str, count: u16) -> Result<SitePayload, FetchError> {
            assert_eq!(count, 288);
            self.calls.push(site.into());
            if let Some(queue) = self.presses {
                let event = if self.calls.len() <= SITES.len() {
                    InputEvent::Up
                } else {
                    InputEvent::Sleep
                };
                signal(queue, event);
            }
            if self.failing.iter().any(|s| *s == site) {
                return Err(self.error.clone());
            }

            let readings = ReadingSeries::from_newest_first((0..self.readings).map(|i| Reading {
                epoch: NOW - 300 * i as i64,
                air_temperature: 2.0 - i as f32 / 100.0,
                counter: (self.readings - i) as u32,
                ..Default::default()
            }));
            Ok(SitePayload {
                info: SiteInfo {
                    kind: SiteKind::Drip,
                    active: true,
                    ..Default::default()
                },
                current: readings.latest().cloned(),
                readings,
            })
        }
    }

    struct FakeClock {
        now: Option<i64>,
        uptime: Cell<u64>,
    }

    impl FakeClock {
        fn at(now: Option<i64>) -> Self {
            Self {
                now,
                uptime: Cell::new(0),
            }
        }
    }

    impl TimeSource for FakeClock {
        async fn start_sync(&mut self) {}

        fn now_unix(&self) -> Option<i64> {
            self.now
        }

        fn uptime_ms(&self) -> u64 {
            // Far enough apart that nothing is debounced
            let t = self.uptime.get() + 1_000;
            self.uptime.set(t);
            t
        }
    }

    #[derive(Default)]
    struct MemStore {
        stored: Option<usize>,
        writes: Vec<usize>,
    }

    impl SiteIndexStore for MemStore {
        fn load(&mut self) -> Option<usize> {
            self.stored
        }

        fn save(&mut self, site_index: usize) -> Result<(), StoreError> {
            self.stored = Some(site_index);
            self.writes.push(site_index);
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingPanel {
        shows: u32,
        /// Refreshes to reject before accepting again
        failures: u32,
        /// Ink in the header clock area of each accepted frame
        clock_ink: Vec<usize>,
    }

    impl Panel for CountingPanel {
        async fn show(&mut self, frame: &FrameBuffer) -> Result<(), RenderError> {
            assert_eq!(frame.as_bytes().len(), 400 * 300 / 8);
            if self.failures > 0 {
                self.failures -= 1;
                return Err(RenderError::Panel);
            }
            self.shows += 1;
            let clock = Rectangle::new(Point::zero(), Size::new(60, 24));
            self.clock_ink.push(frame.ink_in(&clock));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingDelay(Vec<u32>);

    impl DelayNs for RecordingDelay {
        async fn delay_ns(&mut self, _ns: u32) {}

        async fn delay_ms(&mut self, ms: u32) {
            self.0.push(ms);
        }
    }

    type TestApp<'q> = App<'static, FakeFetcher<'q>, FakeClock, MemStore, CountingPanel, RecordingDelay>;

    fn config() -> Config<'static> {
        let mut config = Config::default();
        config.internet.ssid = "field-ap";
        config.schedule.utc_offset_secs = 0;
        config
    }

    fn app_with<'q>(fetcher: FakeFetcher<'q>, stored: Option<usize>) -> TestApp<'q> {
        App::new(
            config(),
            fetcher,
            FakeClock::at(Some(NOW)),
            MemStore {
                stored,
                ..Default::default()
            },
            CountingPanel::default(),
            RecordingDelay::default(),
        )
    }

    #[test]
    fn test_cold_boot_populates_every_site() {
        let mut app = app_with(FakeFetcher::new(), Some(3));
        block_on(app.boot(&InputQueue::new())).unwrap();

        assert_eq!(app.fetcher.calls, SITES);
        assert!((0..SITES.len()).all(|s| app.cache.is_populated(s)));
        assert_eq!(app.site_index(), 3);
        assert_eq!(app.screen(), Some(Screen::SiteData { site: 3 }));
        assert_eq!(app.working.series.len(), 48);
        assert_eq!(app.working.time_str.as_str(), "00:29:50");

        let throttles = app.delay.0.iter().filter(|&&ms| ms == 500).count();
        assert_eq!(throttles, SITES.len() - 1);
    }

    #[test]
    fn test_bulk_fetch_restores_selection_after_failures() {
        let mut app = app_with(FakeFetcher::failing(&["Tuna", "Igoo"]), Some(3));
        block_on(app.boot(&InputQueue::new())).unwrap();

        // Every site was attempted twice on failure
        assert_eq!(app.fetcher.calls.len(), SITES.len() + 2);
        assert_eq!(app.site_index(), 3);
        assert!(!app.cache.is_populated(3));
        assert!(!app.cache.is_populated(7));
        assert!(app.cache.is_populated(4));
        assert_eq!(app.screen(), Some(Screen::NoData { site: 3 }));
        assert!(app.working.series.is_empty());
    }

    #[test]
    fn test_restart_is_cold_again() {
        let mut first = app_with(FakeFetcher::new(), None);
        block_on(first.boot(&InputQueue::new())).unwrap();
        let stored = first.store.stored;

        let mut second = app_with(FakeFetcher::new(), stored);
        block_on(second.boot(&InputQueue::new())).unwrap();
        assert_eq!(second.fetcher.calls.len(), SITES.len());
    }

    #[test]
    fn test_out_of_range_stored_index_clamped() {
        let mut app = app_with(FakeFetcher::new(), Some(42));
        block_on(app.boot(&InputQueue::new())).unwrap();
        assert_eq!(app.site_index(), 0);
    }

    #[test]
    fn test_switching_back_shows_cached_data_after_failed_fetch() {
        let mut app = app_with(FakeFetcher::new(), Some(0));
        block_on(app.boot(&InputQueue::new())).unwrap();
        let cached = app.working.clone();

        app.fetcher.failing = SITES.to_vec();
        let result = block_on(app.handle_event(InputEvent::Fetch));
        assert!(matches!(result, Err(AppError::Fetch(_))));
        assert_eq!(app.screen(), Some(Screen::FetchFailed { site: 0 }));

        block_on(app.handle_event(InputEvent::Up)).unwrap();
        assert_eq!(app.screen(), Some(Screen::SiteData { site: 1 }));
        block_on(app.handle_event(InputEvent::Down)).unwrap();
        assert_eq!(app.screen(), Some(Screen::SiteData { site: 0 }));
        assert_eq!(app.working, cached);
    }

    #[test]
    fn test_malformed_payload_leaves_cache_untouched() {
        let mut app = app_with(FakeFetcher::new(), Some(2));
        block_on(app.boot(&InputQueue::new())).unwrap();
        let cached = app.working.clone();

        app.fetcher.failing = alloc::vec!["Baroo"];
        app.fetcher.error = FetchError::Payload(PayloadError::Json { line: 1, column: 7 });
        app.fetcher.readings = 5;
        assert!(block_on(app.handle_event(InputEvent::Fetch)).is_err());

        let mut restored = SiteSnapshot::default();
        assert!(app.cache.restore(2, &mut restored));
        assert_eq!(restored, cached);
    }

    #[test]
    fn test_successful_fetch_overwrites_cache() {
        let mut app = app_with(FakeFetcher::new(), Some(5));
        block_on(app.boot(&InputQueue::new())).unwrap();

        app.fetcher.readings = 100;
        block_on(app.handle_event(InputEvent::Fetch)).unwrap();

        let mut restored = SiteSnapshot::default();
        assert!(app.cache.restore(5, &mut restored));
        assert_eq!(restored.series.len(), 100);
        assert_eq!(app.screen(), Some(Screen::SiteData { site: 5 }));
    }

    #[test]
    fn test_time_sync_failure_skips_fetch() {
        let mut app = app_with(FakeFetcher::new(), None);
        block_on(app.show_selected()).unwrap();
        let shows = app.panel.shows;
        app.clock.now = None;

        let result = block_on(app.handle_event(InputEvent::Fetch));

        assert!(matches!(result, Err(AppError::TimeSync(_))));
        assert!(app.fetcher.calls.is_empty());
        assert_eq!(app.panel.shows, shows);
        assert_eq!(app.screen(), Some(Screen::NoData { site: 0 }));
    }

    #[test]
    fn test_wifi_failure_shows_error_screen() {
        let mut fetcher = FakeFetcher::new();
        fetcher.connected = false;
        let mut app = app_with(fetcher, None);

        block_on(app.handle_event(InputEvent::Fetch)).unwrap();
        assert_eq!(app.screen(), Some(Screen::WifiError));
        assert!(app.fetcher.calls.is_empty());
    }

    #[test]
    fn test_site_switch_wraps_and_persists() {
        let mut app = app_with(FakeFetcher::new(), None);
        block_on(app.handle_event(InputEvent::Down)).unwrap();
        assert_eq!(app.site_index(), SITES.len() - 1);
        block_on(app.handle_event(InputEvent::Up)).unwrap();
        assert_eq!(app.site_index(), 0);
        block_on(app.handle_event(InputEvent::Up)).unwrap();

        assert_eq!(app.store.writes, [SITES.len() - 1, 0, 1]);
        // Nothing cached, no network
        assert_eq!(app.screen(), Some(Screen::NoData { site: 1 }));
        assert!(app.fetcher.calls.is_empty());
    }

    #[test]
    fn test_sleep_until_next_slot() {
        let mut app = app_with(FakeFetcher::new(), None);
        let control = block_on(app.handle_event(InputEvent::Sleep)).unwrap();
        assert_eq!(control, Control::Sleep { seconds: 1810 });

        app.clock.now = None;
        let control = block_on(app.handle_event(InputEvent::Sleep)).unwrap();
        assert_eq!(control, Control::Sleep { seconds: 1800 });
    }

    #[test]
    fn test_run_discards_presses_queued_during_bulk_fetch() {
        let queue = InputQueue::new();
        let mut fetcher = FakeFetcher::new();
        fetcher.presses = Some(&queue);
        let mut app = app_with(fetcher, None);
        app.config.schedule.refresh_slot_minutes = Some(30);

        signal(&queue, InputEvent::BulkFetch);
        let control = block_on(app.run(&queue));

        // 8 bulk fetches, then one periodic refresh that queued Sleep
        assert_eq!(app.fetcher.calls.len(), SITES.len() + 1);
        assert_eq!(app.site_index(), 0);
        assert_eq!(control, Control::Sleep { seconds: 1810 });
    }

    #[test]
    fn test_boot_discards_presses_queued_during_cold_fetch() {
        let queue = InputQueue::new();
        let mut fetcher = FakeFetcher::new();
        fetcher.presses = Some(&queue);
        let mut app = app_with(fetcher, None);

        block_on(app.boot(&queue)).unwrap();
        assert!(queue.try_receive().is_err());

        signal(&queue, InputEvent::Sleep);
        let control = block_on(app.run(&queue));

        assert!(app.store.writes.is_empty());
        assert_eq!(app.site_index(), 0);
        assert_eq!(control, Control::Sleep { seconds: 1810 });
    }

    #[test]
    fn test_identical_render_skips_panel_refresh() {
        let mut app = app_with(FakeFetcher::new(), None);
        block_on(app.show_selected()).unwrap();
        block_on(app.show_selected()).unwrap();
        assert_eq!(app.panel.shows, 1);

        // A different screen refreshes again
        block_on(app.handle_event(InputEvent::Up)).unwrap();
        assert_eq!(app.panel.shows, 2);
    }

    #[test]
    fn test_failed_refresh_is_retried() {
        let mut app = app_with(FakeFetcher::new(), None);
        app.panel.failures = 1;

        let result = block_on(app.show_selected());
        assert_eq!(result, Err(AppError::Render(RenderError::Panel)));
        assert_eq!(app.panel.shows, 0);

        block_on(app.show_selected()).unwrap();
        assert_eq!(app.panel.shows, 1);
    }

    #[test]
    fn test_failed_bulk_site_keeps_sync_time_in_header() {
        let mut app = app_with(FakeFetcher::failing(&["Tuna"]), Some(3));
        block_on(app.boot(&InputQueue::new())).unwrap();

        // First frame is the "no data" placeholder for the failed site
        assert!(!app.cache.is_populated(0));
        assert!(app.panel.clock_ink[0] > 0);
    }
}
