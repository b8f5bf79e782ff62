//! Draw primitives handed from the renderer to the panel.

use embedded_graphics::mono_font::ascii::{FONT_6X10, FONT_8X13, FONT_10X20};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Circle, Line, PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Alignment, Baseline, Text, TextStyleBuilder};
use heapless::String;

use crate::storage::reading::truncated;

/// Capacity of a text label
pub const LABEL_LEN: usize = 32;

pub type Label = String<LABEL_LEN>;

/// Monospace font sizes available to screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontSize {
    /// 6x10, chart legends and axis labels
    Small,
    /// 8x13, secondary messages
    Medium,
    /// 10x20, header and primary messages
    Large,
}

impl FontSize {
    pub fn font(self) -> &'static MonoFont<'static> {
        match self {
            Self::Small => &FONT_6X10,
            Self::Medium => &FONT_8X13,
            Self::Large => &FONT_10X20,
        }
    }

    /// Glyph height in pixels
    pub const fn height_px(self) -> u32 {
        match self {
            Self::Small => 10,
            Self::Medium => 13,
            Self::Large => 20,
        }
    }
}

/// One drawing operation. All ink is `BinaryColor::On`.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// 1 px rectangle outline
    Rect { area: Rectangle },
    Line {
        start: Point,
        end: Point,
        width: u32,
    },
    /// Solid rectangle
    FilledBar { area: Rectangle },
    /// Filled circle
    Circle { center: Point, radius: u32 },
    /// Text whose top edge sits at `position.y`; `align` is relative to `position.x`
    Text {
        text: Label,
        position: Point,
        font: FontSize,
        align: Alignment,
    },
}

impl DrawCommand {
    /// Text command, truncating `text` to [`LABEL_LEN`] bytes.
    pub fn text(text: &str, position: Point, font: FontSize, align: Alignment) -> Self {
        Self::Text {
            text: truncated(text),
            position,
            font,
            align,
        }
    }

    pub fn line(start: Point, end: Point) -> Self {
        Self::Line {
            start,
            end,
            width: 1,
        }
    }
}

/// Execute `commands` in order on `target`.
pub fn execute<D>(commands: &[DrawCommand], target: &mut D) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    let stroke = PrimitiveStyle::with_stroke(BinaryColor::On, 1);
    let fill = PrimitiveStyle::with_fill(BinaryColor::On);

    for command in commands {
        match command {
            DrawCommand::Rect { area } => area.into_styled(stroke).draw(target)?,
            DrawCommand::Line { start, end, width } => Line::new(*start, *end)
                .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, *width))
                .draw(target)?,
            DrawCommand::FilledBar { area } => area.into_styled(fill).draw(target)?,
            DrawCommand::Circle { center, radius } => {
                Circle::with_center(*center, radius * 2 + 1)
                    .into_styled(fill)
                    .draw(target)?
            }
            DrawCommand::Text {
                text,
                position,
                font,
                align,
            } => {
                let style = TextStyleBuilder::new()
                    .alignment(*align)
                    .baseline(Baseline::Top)
                    .build();
                Text::with_text_style(
                    text,
                    *position,
                    MonoTextStyle::new(font.font(), BinaryColor::On),
                    style,
                )
                .draw(target)?;
            }
        }
    }
    Ok(())
}
