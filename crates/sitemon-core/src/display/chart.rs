//! 24-hour chart rendering with gap markers.
//!
//! A chart occupies a framed box with a one-line legend (axis range, title,
//! latest value) above a plot area, and hour labels below it. Every one of
//! the 24 slots has a fixed horizontal position; absent slots get an X mark
//! instead of a bar or line point, so missing data is never drawn as a value.

use alloc::vec::Vec;
use core::fmt::Write;

use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use embedded_graphics::text::Alignment;
use micromath::F32;

use super::RenderError;
use super::commands::{DrawCommand, FontSize, Label};
use crate::storage::reading::Channel;
use crate::storage::{HOURS_PER_DAY, HourlySeries};

// ============================================================================
// Layout
// ============================================================================

/// Space left of the plot area (pixels)
pub const MARGIN_LEFT_PX: i32 = 4;
/// Space above the plot area, holding the legend row (pixels)
pub const MARGIN_TOP_PX: i32 = 18;
/// Space right of the plot area (pixels)
pub const MARGIN_RIGHT_PX: i32 = 4;
/// Space below the plot area, holding hour labels (pixels)
pub const MARGIN_BOTTOM_PX: i32 = 12;

/// Preferred gap between bars (pixels)
pub const BAR_SPACING_PX: i32 = 3;
/// Bars never get narrower than this (pixels)
pub const MIN_BAR_WIDTH_PX: i32 = 6;

/// Half-size bounds of the missing-data X mark (pixels)
pub const GAP_MARK_MIN_PX: i32 = 4;
pub const GAP_MARK_MAX_PX: i32 = 8;

/// Radius of the latest-reading dot (pixels)
pub const MARKER_RADIUS_PX: u32 = 2;

/// Line-mode stroke width (pixels)
pub const LINE_WIDTH_PX: u32 = 2;

/// Upper bound on commands emitted for one chart
const CHART_COMMAND_CAPACITY: usize = 8 + HOURS_PER_DAY * 3 + HOURS_PER_DAY / 2;

// ============================================================================
// Chart description
// ============================================================================

/// How present slots are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartMode {
    /// One filled bar per hour
    Bar,
    /// Points joined by line segments, broken at every gap
    Line,
}

/// Static description of one chart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartSpec {
    pub title: &'static str,
    /// Axis range used as-is when `auto_scale` is off or nothing is present
    pub y_min: f32,
    pub y_max: f32,
    pub auto_scale: bool,
    pub mode: ChartMode,
}

impl ChartSpec {
    /// Default chart for a channel
    pub fn for_channel(channel: Channel) -> Self {
        let (y_min, y_max) = channel.default_range();
        Self {
            title: channel.label(),
            y_min,
            y_max,
            auto_scale: true,
            mode: match channel {
                Channel::Voltage => ChartMode::Line,
                _ => ChartMode::Bar,
            },
        }
    }
}

/// Vertical axis range after scaling. Always `max > min`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRange {
    pub min: f32,
    pub max: f32,
}

impl AxisRange {
    /// Resolve the axis for `series`.
    ///
    /// With `auto_scale`, the range is widened to whole units at least half a
    /// unit beyond the present extremes. Absent slots never take part.
    pub fn scale(series: &HourlySeries, y_min: f32, y_max: f32, auto_scale: bool) -> Self {
        let (mut min, mut max) = (y_min, y_max);

        if auto_scale && let Some((lo, hi)) = series.min_max() {
            max = F32(hi + 0.5).ceil().0;
            min = F32(lo - 0.5).floor().0;
        }

        if max <= min {
            max = min + 1.0;
        }

        Self { min, max }
    }

    /// Clamp `value` into the range and map it to `0..=height_px`.
    pub fn height_of(&self, value: f32, height_px: i32) -> i32 {
        let clamped = value.clamp(self.min, self.max);
        let mut height = ((clamped - self.min) / (self.max - self.min) * height_px as f32) as i32;
        if height < 1 && clamped > self.min {
            height = 1;
        }
        height
    }
}

/// Horizontal placement of the 24 slot columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Columns {
    x_start: i32,
    bar_width: i32,
    spacing: i32,
}

impl Columns {
    fn fit(plot: &Rectangle) -> Self {
        let slots = HOURS_PER_DAY as i32;
        let width = plot.size.width as i32;

        let mut spacing = BAR_SPACING_PX;
        let mut bar_width = (width - (slots + 1) * spacing) / slots;
        if bar_width < MIN_BAR_WIDTH_PX {
            bar_width = MIN_BAR_WIDTH_PX;
            spacing = ((width - bar_width * slots) / (slots + 1)).max(1);
        }

        let total = slots * bar_width + (slots - 1) * spacing;
        Self {
            x_start: plot.top_left.x + (width - total) / 2,
            bar_width,
            spacing,
        }
    }

    fn left(&self, slot: usize) -> i32 {
        self.x_start + slot as i32 * (self.bar_width + self.spacing)
    }

    fn center(&self, slot: usize) -> i32 {
        self.left(slot) + self.bar_width / 2
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Append the commands for one chart to `out` and return the axis used.
///
/// Scratch space is reserved up front; if that fails nothing is appended.
pub fn render_chart(
    bounds: Rectangle,
    series: &HourlySeries,
    spec: &ChartSpec,
    out: &mut Vec<DrawCommand>,
) -> Result<AxisRange, RenderError> {
    out.try_reserve(CHART_COMMAND_CAPACITY)
        .map_err(|_| RenderError::Allocation)?;

    let range = AxisRange::scale(series, spec.y_min, spec.y_max, spec.auto_scale);
    let x = bounds.top_left.x;
    let y = bounds.top_left.y;
    let w = bounds.size.width as i32;
    let h = bounds.size.height as i32;

    // Double frame
    out.push(DrawCommand::Rect { area: bounds });
    out.push(DrawCommand::Rect {
        area: bounds.offset(-1),
    });

    // Legend row
    let legend_y = y + 4;
    let mut scale_label = Label::new();
    write!(scale_label, "Max:{:.1} Min:{:.1}", range.max, range.min).ok();
    out.push(DrawCommand::Text {
        text: scale_label,
        position: Point::new(x + 4, legend_y),
        font: FontSize::Small,
        align: Alignment::Left,
    });
    out.push(DrawCommand::text(
        spec.title,
        Point::new(x + w / 2, legend_y),
        FontSize::Small,
        Alignment::Center,
    ));

    let mut current_label = Label::new();
    match series.latest_present() {
        Some((_, value)) => write!(current_label, "{:.1}", value).ok(),
        None => current_label.push_str("--").ok(),
    };
    out.push(DrawCommand::Text {
        text: current_label,
        position: Point::new(x + w - 4, legend_y),
        font: FontSize::Small,
        align: Alignment::Right,
    });

    out.push(DrawCommand::line(
        Point::new(x + 2, y + MARGIN_TOP_PX - 2),
        Point::new(x + w - 3, y + MARGIN_TOP_PX - 2),
    ));

    let plot_w = w - MARGIN_LEFT_PX - MARGIN_RIGHT_PX;
    let plot_h = h - MARGIN_TOP_PX - MARGIN_BOTTOM_PX;
    if plot_w <= 0 || plot_h <= 0 {
        return Ok(range);
    }
    let plot = Rectangle::new(
        Point::new(x + MARGIN_LEFT_PX, y + MARGIN_TOP_PX),
        Size::new(plot_w as u32, plot_h as u32),
    );
    let plot_bottom = plot.top_left.y + plot_h;
    let columns = Columns::fit(&plot);
    let latest = series.latest_present().map(|(slot, _)| slot);

    let mut previous_point: Option<Point> = None;
    for slot in 0..HOURS_PER_DAY {
        let center_x = columns.center(slot);

        match series.get(slot) {
            Some(value) => {
                let bar_height = range.height_of(value, plot_h);
                let top = plot_bottom - bar_height;

                match spec.mode {
                    ChartMode::Bar => {
                        if bar_height > 0 {
                            out.push(DrawCommand::FilledBar {
                                area: Rectangle::new(
                                    Point::new(columns.left(slot), top),
                                    Size::new(columns.bar_width as u32, bar_height as u32),
                                ),
                            });
                        }
                    }
                    ChartMode::Line => {
                        let point = Point::new(center_x, top);
                        if let Some(prev) = previous_point {
                            out.push(DrawCommand::Line {
                                start: prev,
                                end: point,
                                width: LINE_WIDTH_PX,
                            });
                        }
                        previous_point = Some(point);
                    }
                }

                if latest == Some(slot) {
                    out.push(DrawCommand::Circle {
                        center: Point::new(center_x, top - 2 - MARKER_RADIUS_PX as i32),
                        radius: MARKER_RADIUS_PX,
                    });
                }
            }
            None => {
                previous_point = None;
                push_gap_mark(out, center_x, plot.top_left.y + plot_h / 2, columns.bar_width);
            }
        }

        if slot % 2 == 0 {
            let mut hour_label = Label::new();
            write!(hour_label, "{}", HOURS_PER_DAY - 1 - slot).ok();
            out.push(DrawCommand::Text {
                text: hour_label,
                position: Point::new(center_x, plot_bottom + 1),
                font: FontSize::Small,
                align: Alignment::Center,
            });
        }
    }

    Ok(range)
}

fn push_gap_mark(out: &mut Vec<DrawCommand>, cx: i32, cy: i32, bar_width: i32) {
    let size = (bar_width / 2).clamp(GAP_MARK_MIN_PX, GAP_MARK_MAX_PX);
    out.push(DrawCommand::line(
        Point::new(cx - size, cy - size),
        Point::new(cx + size, cy + size),
    ));
    out.push(DrawCommand::line(
        Point::new(cx - size, cy + size),
        Point::new(cx + size, cy - size),
    ));
}
