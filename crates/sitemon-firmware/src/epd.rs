//! SSD1683 driver for the 4.2" 400x300 black/white panel (GDEY042T81).
//!
//! Only full refreshes are used. The controller is powered, initialised,
//! written, refreshed and put back into deep sleep for every frame, so the
//! panel draws no current between updates.

use embassy_futures::select::{Either, select};
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiDevice;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::digital::Wait;
use log::{debug, error};
use sitemon_core::display::{DISPLAY_HEIGHT_PX, DISPLAY_WIDTH_PX, FrameBuffer, Panel, RenderError};
use thiserror_no_std::Error;

/// A full refresh takes about 3.5 s; anything past this is a stuck panel.
const BUSY_TIMEOUT_MS: u32 = 10_000;

mod cmd {
    pub const DRIVER_OUTPUT_CONTROL: u8 = 0x01;
    pub const DEEP_SLEEP: u8 = 0x10;
    pub const DATA_ENTRY_MODE: u8 = 0x11;
    pub const SW_RESET: u8 = 0x12;
    pub const TEMPERATURE_SENSOR: u8 = 0x18;
    pub const MASTER_ACTIVATION: u8 = 0x20;
    pub const DISPLAY_UPDATE_CONTROL_1: u8 = 0x21;
    pub const DISPLAY_UPDATE_CONTROL_2: u8 = 0x22;
    pub const WRITE_RAM_BW: u8 = 0x24;
    pub const BORDER_WAVEFORM: u8 = 0x3C;
    pub const RAM_X_RANGE: u8 = 0x44;
    pub const RAM_Y_RANGE: u8 = 0x45;
    pub const RAM_X_COUNTER: u8 = 0x4E;
    pub const RAM_Y_COUNTER: u8 = 0x4F;
}

/// Error types for the panel driver
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EpdError {
    #[error("SPI transfer failed")]
    Spi,
    #[error("GPIO access failed")]
    Pin,
    #[error("Panel stayed busy for {ms} ms")]
    BusyTimeout { ms: u32 },
}

pub struct Ssd1683<SPI, DC, RST, BUSY> {
    spi: SPI,
    dc: DC,
    rst: RST,
    busy: BUSY,
}

impl<SPI, DC, RST, BUSY> Ssd1683<SPI, DC, RST, BUSY>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
    BUSY: Wait,
{
    pub fn new(spi: SPI, dc: DC, rst: RST, busy: BUSY) -> Self {
        Self { spi, dc, rst, busy }
    }

    /// Hardware reset followed by the controller setup sequence.
    pub async fn init<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), EpdError> {
        self.rst.set_low().map_err(|_| EpdError::Pin)?;
        delay.delay_ms(10).await;
        self.rst.set_high().map_err(|_| EpdError::Pin)?;
        delay.delay_ms(10).await;
        self.wait_idle(delay).await?;

        self.command(cmd::SW_RESET, &[])?;
        delay.delay_ms(10).await;
        self.wait_idle(delay).await?;

        let last_row = DISPLAY_HEIGHT_PX - 1;
        let last_col_byte = (DISPLAY_WIDTH_PX / 8 - 1) as u8;
        let [row_lo, row_hi] = last_row.to_le_bytes();

        self.command(cmd::DRIVER_OUTPUT_CONTROL, &[row_lo, row_hi, 0x00])?;
        // Normal RAM for black/white, bypass the red plane
        self.command(cmd::DISPLAY_UPDATE_CONTROL_1, &[0x40, 0x00])?;
        self.command(cmd::BORDER_WAVEFORM, &[0x05])?;
        // Internal temperature sensor
        self.command(cmd::TEMPERATURE_SENSOR, &[0x80])?;
        // X then Y increment
        self.command(cmd::DATA_ENTRY_MODE, &[0x03])?;
        self.command(cmd::RAM_X_RANGE, &[0x00, last_col_byte])?;
        self.command(cmd::RAM_Y_RANGE, &[0x00, 0x00, row_lo, row_hi])?;
        self.command(cmd::RAM_X_COUNTER, &[0x00])?;
        self.command(cmd::RAM_Y_COUNTER, &[0x00, 0x00])?;
        self.wait_idle(delay).await
    }

    /// Load a full 1 bpp frame (set bit = white) into black/white RAM.
    pub fn write_frame(&mut self, bytes: &[u8]) -> Result<(), EpdError> {
        self.command(cmd::RAM_X_COUNTER, &[0x00])?;
        self.command(cmd::RAM_Y_COUNTER, &[0x00, 0x00])?;
        self.command(cmd::WRITE_RAM_BW, bytes)
    }

    /// Full waveform refresh from RAM.
    pub async fn refresh<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), EpdError> {
        self.command(cmd::DISPLAY_UPDATE_CONTROL_2, &[0xF7])?;
        self.command(cmd::MASTER_ACTIVATION, &[])?;
        self.wait_idle(delay).await
    }

    /// Deep sleep mode 1; only a hardware reset wakes the controller.
    pub fn sleep(&mut self) -> Result<(), EpdError> {
        self.command(cmd::DEEP_SLEEP, &[0x01])
    }

    fn command(&mut self, command: u8, data: &[u8]) -> Result<(), EpdError> {
        self.dc.set_low().map_err(|_| EpdError::Pin)?;
        self.spi.write(&[command]).map_err(|_| EpdError::Spi)?;
        if !data.is_empty() {
            self.dc.set_high().map_err(|_| EpdError::Pin)?;
            self.spi.write(data).map_err(|_| EpdError::Spi)?;
        }
        Ok(())
    }

    async fn wait_idle<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), EpdError> {
        match select(self.busy.wait_for_low(), delay.delay_ms(BUSY_TIMEOUT_MS)).await {
            Either::First(result) => result.map_err(|_| EpdError::Pin),
            Either::Second(()) => Err(EpdError::BusyTimeout {
                ms: BUSY_TIMEOUT_MS,
            }),
        }
    }
}

/// [`Panel`] that drives an [`Ssd1683`] behind a power switch.
pub struct EpdPanel<SPI, DC, RST, BUSY, PWR, D> {
    epd: Ssd1683<SPI, DC, RST, BUSY>,
    power: PWR,
    delay: D,
}

impl<SPI, DC, RST, BUSY, PWR, D> EpdPanel<SPI, DC, RST, BUSY, PWR, D>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
    BUSY: Wait,
    PWR: OutputPin,
    D: DelayNs,
{
    pub fn new(epd: Ssd1683<SPI, DC, RST, BUSY>, power: PWR, delay: D) -> Self {
        Self { epd, power, delay }
    }

    async fn update(&mut self, frame: &FrameBuffer) -> Result<(), EpdError> {
        self.power.set_high().map_err(|_| EpdError::Pin)?;
        self.delay.delay_ms(10).await;

        self.epd.init(&mut self.delay).await?;
        self.epd.write_frame(frame.as_bytes())?;
        self.epd.refresh(&mut self.delay).await?;
        self.epd.sleep()?;

        self.power.set_low().map_err(|_| EpdError::Pin)
    }
}

impl<SPI, DC, RST, BUSY, PWR, D> Panel for EpdPanel<SPI, DC, RST, BUSY, PWR, D>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
    BUSY: Wait,
    PWR: OutputPin,
    D: DelayNs,
{
    async fn show(&mut self, frame: &FrameBuffer) -> Result<(), RenderError> {
        debug!("Updating e-paper panel");
        self.update(frame).await.map_err(|e| {
            error!("Panel update failed: {}", e);
            // Leave the panel unpowered so the next update starts from reset
            self.power.set_low().ok();
            RenderError::Panel
        })
    }
}
