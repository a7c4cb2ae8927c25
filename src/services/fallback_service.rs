//! Self-contained SVG chart used when no richer render tier is available
//!
//! Every call clears the surface and draws the whole chart again from the
//! series alone, so nothing carries over between calls.

use chrono::{DateTime, Utc};

use crate::models::chart::{percent_change, value_range};
use crate::models::{Frame, PricePoint, Timeframe};
use crate::surface::Surface;
use crate::utils::format::format_percent;

/// Horizontal gridlines, each with a value label on the right edge
pub const GRID_ROWS: usize = 5;
/// Vertical gridlines, each with a time label along the bottom
pub const GRID_COLUMNS: usize = 6;

const PAD_LEFT: f64 = 16.0;
const PAD_RIGHT: f64 = 88.0;
const PAD_TOP: f64 = 72.0;
const PAD_BOTTOM: f64 = 36.0;
const MIN_WIDTH: u32 = 240;
const MIN_HEIGHT: u32 = 160;

const BACKGROUND: &str = "#0f172a";
const GRID: &str = "#1e293b";
const TEXT: &str = "#e2e8f0";
const MUTED: &str = "#94a3b8";
const UP: &str = "#22c55e";
const DOWN: &str = "#ef4444";

/// What the vector renderer needs besides the series
pub struct FallbackContext<'a> {
    pub asset_name: &'a str,
    pub timeframe: Timeframe,
    pub currency: &'a str,
    pub format_price: &'a (dyn Fn(f64, &str) -> String + Send + Sync),
    /// Marks the indicator as sample data instead of live
    pub sample_data: bool,
}

/// Clear the surface and draw the chart as a single SVG frame
pub fn render_fallback(surface: &mut dyn Surface, series: &[PricePoint], context: &FallbackContext) {
    let (width, height) = surface.size();
    let svg = build_svg(width, height, series, context);
    surface.clear();
    surface.present(Frame::Vector(svg));
}

/// Maps series values onto the plot rectangle
struct Plot {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
    low: f64,
    high: f64,
    count: usize,
}

impl Plot {
    fn new(width: u32, height: u32, series: &[PricePoint]) -> Self {
        let (min, max) = value_range(series).unwrap_or((0.0, 1.0));
        // Keep flat series off the plot edges
        let span = (max - min).max(max.abs() * 0.01).max(1e-12);
        Self {
            left: PAD_LEFT,
            top: PAD_TOP,
            width: width as f64 - PAD_LEFT - PAD_RIGHT,
            height: height as f64 - PAD_TOP - PAD_BOTTOM,
            // Prices are positive, so the scale never dips below zero
            low: (min - span * 0.05).max(0.0),
            high: max + span * 0.05,
            count: series.len(),
        }
    }

    fn right(&self) -> f64 {
        self.left + self.width
    }

    fn bottom(&self) -> f64 {
        self.top + self.height
    }

    fn x(&self, index: usize) -> f64 {
        if self.count <= 1 {
            return self.left + self.width / 2.0;
        }
        self.left + self.width * index as f64 / (self.count - 1) as f64
    }

    fn y(&self, value: f64) -> f64 {
        let normalized = (value - self.low) / (self.high - self.low);
        self.top + self.height * (1.0 - normalized)
    }
}

/// Build the complete SVG document for `series`
pub fn build_svg(width: u32, height: u32, series: &[PricePoint], context: &FallbackContext) -> String {
    let width = width.max(MIN_WIDTH);
    let height = height.max(MIN_HEIGHT);
    let plot = Plot::new(width, height, series);

    let mut svg = String::with_capacity(4096 + series.len() * 32);
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif">"#,
        w = width,
        h = height
    ));
    svg.push_str(&format!(r#"<rect width="{}" height="{}" fill="{}"/>"#, width, height, BACKGROUND));

    let change = percent_change(series);
    let trend_color = match change {
        Some(c) if c < 0.0 => DOWN,
        _ => UP,
    };

    draw_grid(&mut svg, &plot, series, context);
    draw_annotations(&mut svg, width, series, change, trend_color, context);

    if series.is_empty() {
        svg.push_str(&format!(
            r#"<text x="{:.1}" y="{:.1}" fill="{}" font-size="14" text-anchor="middle">No data</text>"#,
            plot.left + plot.width / 2.0,
            plot.top + plot.height / 2.0,
            MUTED
        ));
    } else {
        draw_series(&mut svg, &plot, series, trend_color);
        draw_live_indicator(&mut svg, &plot, series, trend_color, context.sample_data);
    }

    svg.push_str("</svg>");
    svg
}

fn draw_grid(svg: &mut String, plot: &Plot, series: &[PricePoint], context: &FallbackContext) {
    // Horizontal lines and value labels, top (high) to bottom (low)
    for row in 0..GRID_ROWS {
        let fraction = row as f64 / (GRID_ROWS - 1) as f64;
        let y = plot.top + plot.height * fraction;
        let value = plot.high - (plot.high - plot.low) * fraction;
        svg.push_str(&format!(
            r#"<line class="grid" x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="{}" stroke-width="1"/>"#,
            plot.left,
            y,
            plot.right(),
            y,
            GRID
        ));
        if !series.is_empty() {
            svg.push_str(&format!(
                r#"<text class="value-label" x="{:.1}" y="{:.1}" fill="{}" font-size="11">{}</text>"#,
                plot.right() + 6.0,
                y + 4.0,
                MUTED,
                escape_xml(&(context.format_price)(value, context.currency))
            ));
        }
    }

    // Vertical lines and time labels, oldest to newest
    let mut last_labelled = None;
    for column in 0..GRID_COLUMNS {
        let fraction = column as f64 / (GRID_COLUMNS - 1) as f64;
        let x = plot.left + plot.width * fraction;
        svg.push_str(&format!(
            r#"<line class="grid" x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="{}" stroke-width="1"/>"#,
            x,
            plot.top,
            x,
            plot.bottom(),
            GRID
        ));

        if series.is_empty() {
            continue;
        }
        let index = (fraction * (series.len() - 1) as f64).round() as usize;
        if last_labelled == Some(index) {
            continue;
        }
        last_labelled = Some(index);
        svg.push_str(&format!(
            r#"<text class="time-label" x="{:.1}" y="{:.1}" fill="{}" font-size="11" text-anchor="middle">{}</text>"#,
            x,
            plot.bottom() + 20.0,
            MUTED,
            time_label(series[index].time, context.timeframe)
        ));
    }
}

fn draw_series(svg: &mut String, plot: &Plot, series: &[PricePoint], color: &str) {
    let mut line = String::new();
    for (i, point) in series.iter().enumerate() {
        let command = if i == 0 { 'M' } else { 'L' };
        line.push_str(&format!("{}{:.1},{:.1} ", command, plot.x(i), plot.y(point.value)));
    }
    let line = line.trim_end();

    let first_x = plot.x(0);
    let last_x = plot.x(series.len() - 1);
    let area = format!(
        "M{:.1},{:.1} L{} L{:.1},{:.1} Z",
        first_x,
        plot.bottom(),
        line.trim_start_matches('M'),
        last_x,
        plot.bottom()
    );

    svg.push_str(&format!(
        r#"<defs><linearGradient id="area-fill" x1="0" y1="0" x2="0" y2="1"><stop offset="0%" stop-color="{c}" stop-opacity="0.35"/><stop offset="100%" stop-color="{c}" stop-opacity="0"/></linearGradient></defs>"#,
        c = color
    ));
    svg.push_str(&format!(r#"<path class="area" d="{}" fill="url(#area-fill)"/>"#, area));
    svg.push_str(&format!(
        r#"<path class="line" d="{}" fill="none" stroke="{}" stroke-width="2" stroke-linejoin="round"/>"#,
        line, color
    ));
}

fn draw_annotations(
    svg: &mut String,
    width: u32,
    series: &[PricePoint],
    change: Option<f64>,
    color: &str,
    context: &FallbackContext,
) {
    let right = width as f64 - PAD_LEFT;

    svg.push_str(&format!(
        r#"<text class="title" x="{:.1}" y="28" fill="{}" font-size="18" font-weight="bold">{}</text>"#,
        PAD_LEFT,
        TEXT,
        escape_xml(context.asset_name)
    ));
    svg.push_str(&format!(
        r#"<text class="subtitle" x="{:.1}" y="50" fill="{}" font-size="12">{} · {} points</text>"#,
        PAD_LEFT,
        MUTED,
        context.timeframe.label(),
        series.len()
    ));

    if let Some(last) = series.last() {
        svg.push_str(&format!(
            r#"<text class="current-value" x="{:.1}" y="28" fill="{}" font-size="18" font-weight="bold" text-anchor="end">{}</text>"#,
            right,
            TEXT,
            escape_xml(&(context.format_price)(last.value, context.currency))
        ));
    }
    if let Some(change) = change {
        svg.push_str(&format!(
            r#"<text class="change" x="{:.1}" y="50" fill="{}" font-size="12" text-anchor="end">{}</text>"#,
            right,
            color,
            format_percent(change)
        ));
    }
}

fn draw_live_indicator(svg: &mut String, plot: &Plot, series: &[PricePoint], color: &str, sample_data: bool) {
    let last_index = series.len() - 1;
    let x = plot.x(last_index);
    let y = plot.y(series[last_index].value);
    svg.push_str(&format!(
        r#"<circle class="live-dot" cx="{:.1}" cy="{:.1}" r="4" fill="{}"/>"#,
        x, y, color
    ));

    let label = if sample_data { "SAMPLE" } else { "LIVE" };
    svg.push_str(&format!(
        r#"<text class="live-label" x="{:.1}" y="{:.1}" fill="{}" font-size="10" text-anchor="end">● {}</text>"#,
        plot.right(),
        plot.top - 8.0,
        if sample_data { MUTED } else { UP },
        label
    ));
}

/// Hour:minute for the short timeframe, month/day otherwise
fn time_label(time: i64, timeframe: Timeframe) -> String {
    let format = match timeframe {
        Timeframe::Short => "%H:%M",
        _ => "%m/%d",
    };
    DateTime::<Utc>::from_timestamp(time, 0)
        .map(|t| t.format(format).to_string())
        .unwrap_or_default()
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
