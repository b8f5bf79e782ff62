//! 1-bit framebuffer with change detection.
//!
//! Screens are drawn into this RAM buffer rather than the panel. The bytes
//! are laid out exactly as the e-paper controller expects them (row-major,
//! MSB first, set bit = white), so a refresh is a single bulk transfer.
//! [`FrameBuffer::diff`] bounds the pixels that differ from another frame,
//! letting the caller skip a slow full refresh for an identical one.

use alloc::vec;
use alloc::vec::Vec;
use core::convert::Infallible;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;

use super::{DISPLAY_HEIGHT_PX, DISPLAY_WIDTH_PX};

/// Bytes per row (400 / 8 = 50).
const ROW_BYTES: usize = DISPLAY_WIDTH_PX as usize / 8;

/// Total buffer size (50 x 300 = 15,000 bytes).
const BUFFER_LEN: usize = ROW_BYTES * DISPLAY_HEIGHT_PX as usize;

/// Bounding box of differing pixels.
#[derive(Debug, Clone, Copy)]
struct DirtyRect {
    min_x: usize,
    min_y: usize,
    max_x: usize,
    max_y: usize,
}

impl DirtyRect {
    /// Expand the dirty region to include the given pixel coordinate.
    fn expand(&mut self, x: usize, y: usize) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// Create a new dirty rect covering a single pixel.
    fn from_point(x: usize, y: usize) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    fn to_rectangle(self) -> Rectangle {
        Rectangle::new(
            Point::new(self.min_x as i32, self.min_y as i32),
            Size::new(
                (self.max_x - self.min_x + 1) as u32,
                (self.max_y - self.min_y + 1) as u32,
            ),
        )
    }
}

/// Heap-backed 400x300 monochrome framebuffer implementing
/// `DrawTarget<Color = BinaryColor>`. `BinaryColor::On` is ink (black).
pub struct FrameBuffer {
    bits: Vec<u8>,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    /// Allocate a new framebuffer filled with white.
    pub fn new() -> Self {
        Self {
            bits: vec![0xFF; BUFFER_LEN],
        }
    }

    /// Raw panel bytes, row-major, MSB first, set bit = white.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    /// Colour of a pixel, or `None` outside the buffer.
    pub fn pixel(&self, x: i32, y: i32) -> Option<BinaryColor> {
        if x < 0 || y < 0 || x >= DISPLAY_WIDTH_PX as i32 || y >= DISPLAY_HEIGHT_PX as i32 {
            return None;
        }
        let (idx, mask) = Self::locate(x as usize, y as usize);
        Some(if self.bits[idx] & mask == 0 {
            BinaryColor::On
        } else {
            BinaryColor::Off
        })
    }

    /// Count of ink pixels inside `area`.
    pub fn ink_in(&self, area: &Rectangle) -> usize {
        area.points()
            .filter(|p| self.pixel(p.x, p.y) == Some(BinaryColor::On))
            .count()
    }

    /// Bounding box of the pixels where `other` differs from this frame,
    /// or `None` when the two are identical.
    pub fn diff(&self, other: &FrameBuffer) -> Option<Rectangle> {
        let mut rect: Option<DirtyRect> = None;
        for (idx, (a, b)) in self.bits.iter().zip(&other.bits).enumerate() {
            let changed = a ^ b;
            if changed == 0 {
                continue;
            }
            let y = idx / ROW_BYTES;
            let x0 = (idx % ROW_BYTES) * 8;
            let first = x0 + changed.leading_zeros() as usize;
            let last = x0 + 7 - changed.trailing_zeros() as usize;
            match &mut rect {
                Some(r) => {
                    r.expand(first, y);
                    r.expand(last, y);
                }
                None => {
                    let mut r = DirtyRect::from_point(first, y);
                    r.expand(last, y);
                    rect = Some(r);
                }
            }
        }
        rect.map(DirtyRect::to_rectangle)
    }

    #[inline]
    fn locate(x: usize, y: usize) -> (usize, u8) {
        (y * ROW_BYTES + x / 8, 0x80 >> (x % 8))
    }

    #[inline]
    fn set_pixel(&mut self, x: usize, y: usize, color: BinaryColor) {
        let (idx, mask) = Self::locate(x, y);
        match color {
            BinaryColor::On => self.bits[idx] &= !mask,
            BinaryColor::Off => self.bits[idx] |= mask,
        }
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        Size::new(DISPLAY_WIDTH_PX as u32, DISPLAY_HEIGHT_PX as u32)
    }
}

impl DrawTarget for FrameBuffer {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let w = DISPLAY_WIDTH_PX as i32;
        let h = DISPLAY_HEIGHT_PX as i32;

        for Pixel(coord, color) in pixels {
            if coord.x >= 0 && coord.y >= 0 && coord.x < w && coord.y < h {
                self.set_pixel(coord.x as usize, coord.y as usize, color);
            }
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let area = area.intersection(&self.bounding_box());
        let Some(bottom_right) = area.bottom_right() else {
            return Ok(());
        };

        for y in area.top_left.y..=bottom_right.y {
            for x in area.top_left.x..=bottom_right.x {
                self.set_pixel(x as usize, y as usize, color);
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        let fill = match color {
            BinaryColor::On => 0x00,
            BinaryColor::Off => 0xFF,
        };
        self.bits.fill(fill);
        Ok(())
    }
}
