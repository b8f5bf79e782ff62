//! Full-screen layouts built from draw commands.

use alloc::vec::Vec;

use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use embedded_graphics::text::Alignment;
use embedded_layout::prelude::*;
use heapless::String;
use log::debug;

use super::chart::{ChartSpec, render_chart};
use super::commands::{DrawCommand, FontSize, LABEL_LEN};
use super::{DISPLAY_HEIGHT_PX, DISPLAY_WIDTH_PX, RenderError};
use crate::storage::{HourlySeries, SiteSnapshot};
use crate::time::{header_date, header_time};
use core::fmt::Write;

/// First row below the header rules
pub const BODY_TOP_PX: i32 = 30;
/// First row of the chart stack
pub const CHARTS_TOP_PX: i32 = 32;
/// Vertical gap between stacked charts
pub const CHART_SPACING_PX: i32 = 4;

const CHART_X_PX: i32 = 5;
const CHART_WIDTH_PX: u32 = 388;
const HEADER_RULE_Y_PX: [i32; 2] = [26, 28];
const MESSAGE_LINE_GAP_PX: i32 = 6;

const WIDTH: i32 = DISPLAY_WIDTH_PX as i32;
const HEIGHT: i32 = DISPLAY_HEIGHT_PX as i32;

/// Text shown in the header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header<'a> {
    pub site: &'a str,
    pub region: &'a str,
    /// Captured `HH:MM:SS`; empty when no fetch has succeeded yet
    pub time_str: &'a str,
    /// Captured `Sun, 23. Nov 2025`; may be empty
    pub date_str: &'a str,
}

impl Header<'_> {
    fn push_commands(&self, out: &mut Vec<DrawCommand>) {
        let time = header_time(self.time_str);
        if !time.is_empty() {
            out.push(DrawCommand::text(
                time,
                Point::new(4, 4),
                FontSize::Large,
                Alignment::Left,
            ));
        }

        let mut title: String<LABEL_LEN> = String::new();
        write!(title, "{}, {}", self.site, self.region).ok();
        out.push(DrawCommand::Text {
            text: title,
            position: Point::new(WIDTH / 2, 4),
            font: FontSize::Large,
            align: Alignment::Center,
        });

        let date = header_date(self.date_str);
        if !date.is_empty() {
            out.push(DrawCommand::text(
                &date,
                Point::new(WIDTH - 4, 4),
                FontSize::Large,
                Alignment::Right,
            ));
        }

        for y in HEADER_RULE_Y_PX {
            out.push(DrawCommand::line(Point::new(0, y), Point::new(WIDTH - 1, y)));
        }
    }
}

/// Bounds of chart `index` out of `count` stacked charts.
pub fn chart_bounds(index: usize, count: usize) -> Rectangle {
    let count = count.max(1) as i32;
    let available = HEIGHT - CHARTS_TOP_PX;
    let height = (available - (count - 1) * CHART_SPACING_PX) / count;
    Rectangle::new(
        Point::new(
            CHART_X_PX,
            CHARTS_TOP_PX + index as i32 * (height + CHART_SPACING_PX),
        ),
        Size::new(CHART_WIDTH_PX, height.max(0) as u32),
    )
}

/// Header plus one chart per channel of the site's kind.
pub fn site_screen(
    header: &Header,
    snapshot: &SiteSnapshot,
    out: &mut Vec<DrawCommand>,
) -> Result<(), RenderError> {
    header.push_commands(out);

    let channels = snapshot.info.kind.channels();
    for (index, &channel) in channels.iter().enumerate() {
        let values = snapshot
            .series
            .channel_values(channel)
            .map_err(|_| RenderError::Allocation)?;
        let hourly = HourlySeries::aggregate(&values);
        drop(values);

        debug!(
            "{}: {} of 24 hours present",
            channel.label(),
            hourly.available_hours()
        );

        render_chart(
            chart_bounds(index, channels.len()),
            &hourly,
            &ChartSpec::for_channel(channel),
            out,
        )?;
    }

    Ok(())
}

/// Header plus a prompt to fetch, for a site with nothing cached.
pub fn no_data_screen(header: &Header, out: &mut Vec<DrawCommand>) {
    header.push_commands(out);
    push_message(
        out,
        body_area(),
        &[
            ("Press button to", FontSize::Large),
            ("fetch data", FontSize::Large),
        ],
    );
}

/// Header plus the failure notice after an explicit fetch ran out of attempts.
pub fn fetch_failed_screen(header: &Header, out: &mut Vec<DrawCommand>) {
    header.push_commands(out);
    push_message(
        out,
        body_area(),
        &[
            ("Fetch failed", FontSize::Large),
            ("Press button to retry", FontSize::Medium),
        ],
    );
}

/// Full-screen notice that the access point could not be joined.
pub fn wifi_error_screen(ssid: &str, out: &mut Vec<DrawCommand>) {
    let screen = Rectangle::new(Point::zero(), Size::new(WIDTH as u32, HEIGHT as u32));
    push_message(
        out,
        screen,
        &[
            ("WiFi Error", FontSize::Large),
            ("Connect to:", FontSize::Medium),
            (ssid, FontSize::Medium),
        ],
    );
}

fn body_area() -> Rectangle {
    Rectangle::new(
        Point::new(0, BODY_TOP_PX),
        Size::new(WIDTH as u32, (HEIGHT - BODY_TOP_PX) as u32),
    )
}

/// Lines of text centred as one block inside `area`.
fn push_message(out: &mut Vec<DrawCommand>, area: Rectangle, lines: &[(&str, FontSize)]) {
    let block_height = lines
        .iter()
        .map(|(_, font)| font.height_px() as i32)
        .sum::<i32>()
        + (lines.len().saturating_sub(1) as i32) * MESSAGE_LINE_GAP_PX;

    let block = Rectangle::new(Point::zero(), Size::new(area.size.width, block_height as u32))
        .align_to(&area, horizontal::Center, vertical::Center);

    let center_x = block.top_left.x + block.size.width as i32 / 2;
    let mut y = block.top_left.y;
    for (text, font) in lines {
        out.push(DrawCommand::text(
            text,
            Point::new(center_x, y),
            *font,
            Alignment::Center,
        ));
        y += font.height_px() as i32 + MESSAGE_LINE_GAP_PX;
    }
}
