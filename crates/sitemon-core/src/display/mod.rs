//! Everything between the data model and the e-paper panel.
//!
//! Screens and charts are first expressed as a list of [`DrawCommand`]s,
//! which are then executed against any `DrawTarget<Color = BinaryColor>`:
//! the [`FrameBuffer`] on the device, or the SDL window in the simulator.

pub mod chart;
pub mod commands;
pub mod framebuffer;
pub mod screens;

pub use chart::{AxisRange, ChartMode, ChartSpec, render_chart};
pub use commands::{DrawCommand, FontSize, execute};
pub use framebuffer::FrameBuffer;

use thiserror_no_std::Error;

/// Panel width in pixels
pub const DISPLAY_WIDTH_PX: u16 = 400;
/// Panel height in pixels
pub const DISPLAY_HEIGHT_PX: u16 = 300;

/// Error types for producing or showing a frame
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RenderError {
    /// A scratch buffer for this render pass could not be allocated
    #[error("Out of memory for render buffers")]
    Allocation,

    /// The panel failed to accept or refresh the frame
    #[error("Panel refresh failed")]
    Panel,
}

/// Physical (or simulated) display.
#[allow(async_fn_in_trait)]
pub trait Panel {
    /// Transfer `frame` to the panel and refresh it.
    async fn show(&mut self, frame: &FrameBuffer) -> Result<(), RenderError>;
}
