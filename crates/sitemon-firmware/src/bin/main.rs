#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use core::time::Duration as CoreDuration;

use embassy_executor::Spawner;
use embassy_net::StackResources;
use embassy_time::{Delay, Duration, Timer};
use embedded_hal_bus::spi::ExclusiveDevice;
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::rng::Rng;
use esp_hal::rtc_cntl::Rtc;
use esp_hal::rtc_cntl::sleep::TimerWakeupSource;
use esp_hal::spi::Mode;
use esp_hal::spi::master::{Config as SpiConfig, Spi};
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use log::{error, info};
use sitemon_core::app::{App, Control};
use sitemon_core::config::{
    ApiConfig, Config, DEFAULT_READING_COUNT, DisplayConfig, InternetConfig, ScheduleConfig,
};
use sitemon_core::input::{INPUT_EVENTS, InputEvent};
use sitemon_firmware::buttons::button_task;
use sitemon_firmware::epd::{EpdPanel, Ssd1683};
use sitemon_firmware::net::{WifiFetcher, net_task};
use sitemon_firmware::rtc_store::RtcSiteStore;
use sitemon_firmware::sntp::NetworkClock;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

macro_rules! mk_static {
    ($t:ty,$val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        #[deny(unused_attributes)]
        let x = STATIC_CELL.uninit().write(($val));
        x
    }};
}

const WIFI_SSID: &str = env!("WIFI_SSID");
const WIFI_PASS: &str = env!("WIFI_PASS");
const API_HOST: &str = env!("API_HOST");
const API_PATH: &str = env!("API_PATH");
const SITE_REGION: &str = env!("SITE_REGION");
const REFRESH_SLOT_MINUTES: &str = env!("REFRESH_SLOT_MINUTES");

fn device_config() -> Config<'static> {
    Config {
        internet: InternetConfig {
            ssid: WIFI_SSID,
            password: WIFI_PASS,
        },
        api: ApiConfig {
            host: API_HOST,
            path: API_PATH,
            reading_count: DEFAULT_READING_COUNT,
        },
        display: DisplayConfig {
            region: SITE_REGION,
        },
        schedule: ScheduleConfig {
            refresh_slot_minutes: REFRESH_SLOT_MINUTES.parse().ok().filter(|m| *m > 0),
            ..Default::default()
        },
    }
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);
    // Response bodies and the site cache live in PSRAM
    esp_alloc::psram_allocator!(peripherals.PSRAM, esp_hal::psram);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized!");

    // Buttons: active low with internal pull-ups
    let button_config = InputConfig::default().with_pull(Pull::Up);
    let buttons = [
        (Input::new(peripherals.GPIO1, button_config), InputEvent::Up),
        (Input::new(peripherals.GPIO2, button_config), InputEvent::Down),
        (Input::new(peripherals.GPIO3, button_config), InputEvent::Fetch),
        (Input::new(peripherals.GPIO4, button_config), InputEvent::BulkFetch),
        (Input::new(peripherals.GPIO5, button_config), InputEvent::Sleep),
    ];
    for (pin, event) in buttons {
        spawner.spawn(button_task(pin, event)).ok();
    }

    // E-paper panel: SCK=GPIO12, MOSI=GPIO11, CS=GPIO10, DC=GPIO9,
    // RST=GPIO8, BUSY=GPIO7, panel power switch=GPIO6
    let spi = Spi::new(
        peripherals.SPI2,
        SpiConfig::default()
            .with_frequency(Rate::from_mhz(10))
            .with_mode(Mode::_0),
    )
    .expect("SPI init failed")
    .with_sck(peripherals.GPIO12)
    .with_mosi(peripherals.GPIO11);

    let cs = Output::new(peripherals.GPIO10, Level::High, OutputConfig::default());
    let spi_device = ExclusiveDevice::new_no_delay(spi, cs).expect("SPI device init failed");
    let dc = Output::new(peripherals.GPIO9, Level::Low, OutputConfig::default());
    let rst = Output::new(peripherals.GPIO8, Level::High, OutputConfig::default());
    let busy = Input::new(peripherals.GPIO7, InputConfig::default());
    let power = Output::new(peripherals.GPIO6, Level::Low, OutputConfig::default());

    let panel = EpdPanel::new(Ssd1683::new(spi_device, dc, rst, busy), power, Delay);

    // WiFi and network stack
    let radio = &*mk_static!(
        esp_radio::Controller<'static>,
        esp_radio::init().expect("Failed to initialize Wi-Fi/BLE controller")
    );
    let (controller, interfaces) = esp_radio::wifi::new(radio, peripherals.WIFI, Default::default())
        .expect("Failed to initialize Wi-Fi controller");

    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;

    // DNS, TCP and SNTP each hold a socket
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        mk_static!(StackResources<4>, StackResources::<4>::new()),
        seed,
    );
    spawner.spawn(net_task(runner)).ok();

    let device = device_config();
    let fetcher = WifiFetcher::new(controller, stack, device.internet, device.api);
    let clock = NetworkClock::new(stack);

    let mut app = App::new(device, fetcher, clock, RtcSiteStore, panel, Delay);

    if let Err(e) = app.boot(&INPUT_EVENTS).await {
        error!("Boot failed: {}", e);
    }

    let seconds = match app.run(&INPUT_EVENTS).await {
        Control::Sleep { seconds } => seconds,
        Control::Continue => 0,
    };

    info!("Entering deep sleep for {} s", seconds);
    // Let RTT drain
    Timer::after(Duration::from_millis(100)).await;

    let mut rtc = Rtc::new(peripherals.LPWR);
    let timer = TimerWakeupSource::new(CoreDuration::from_secs(u64::from(seconds.max(1))));
    rtc.sleep_deep(&[&timer])
}
