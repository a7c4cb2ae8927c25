//! Render tier selection and the plotters-backed chart tiers
//!
//! Tiers are tried richest first through a list of capability probes. Each
//! probe either hands back a working backend or a typed failure, so the
//! selection logic runs the same against real plotters tiers and test fakes.

use chrono::{DateTime, Duration, Utc};
use plotters::prelude::*;
use tracing::{info, warn};

use crate::models::chart::value_range;
use crate::models::{Frame, PricePoint};
use crate::surface::Surface;
use crate::utils::errors::RenderError;

/// Smallest surface edge the raster tiers will draw on
pub const MIN_DIMENSION: u32 = 64;
/// Largest pixel count the raster tiers will allocate
pub const MAX_PIXELS: u64 = 4096 * 4096;

/// Capability levels, richest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTier {
    /// Filled area under a bordered line
    Area,
    /// Plain line series
    Line,
    /// Line assembled from individual path elements
    Generic,
    /// Self-contained SVG writer
    Vector,
}

impl RenderTier {
    pub fn name(self) -> &'static str {
        match self {
            RenderTier::Area => "area",
            RenderTier::Line => "line",
            RenderTier::Generic => "generic",
            RenderTier::Vector => "vector",
        }
    }
}

/// A live chart instance on one tier
pub trait ChartBackend: Send {
    fn tier(&self) -> RenderTier;

    /// Caption drawn above the plot
    fn set_caption(&mut self, _caption: &str) {}

    /// Draw `series` and present the result on `surface`
    fn set_data(&mut self, series: &[PricePoint], surface: &mut dyn Surface) -> Result<(), RenderError>;

    fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError>;

    /// Release backend resources; no calls follow
    fn dispose(&mut self);
}

/// Checks whether one tier is available and builds its backend
pub trait CapabilityProbe: Send + Sync {
    fn tier(&self) -> RenderTier;

    fn probe(&self, width: u32, height: u32) -> Result<Box<dyn ChartBackend>, RenderError>;
}

/// Exclusive token for the active chart instance
///
/// Not `Clone`; disposing consumes it. Dropping a live handle disposes it too.
pub struct RenderHandle {
    backend: Box<dyn ChartBackend>,
    live: bool,
}

impl RenderHandle {
    fn new(backend: Box<dyn ChartBackend>) -> Self {
        Self {
            backend,
            live: true,
        }
    }

    pub fn tier(&self) -> RenderTier {
        self.backend.tier()
    }

    pub fn set_caption(&mut self, caption: &str) {
        self.backend.set_caption(caption);
    }

    pub fn set_data(&mut self, series: &[PricePoint], surface: &mut dyn Surface) -> Result<(), RenderError> {
        if !self.live {
            return Err(RenderError::Disposed);
        }
        self.backend.set_data(series, surface)
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        if !self.live {
            return Err(RenderError::Disposed);
        }
        self.backend.resize(width, height)
    }

    pub fn dispose(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.live {
            self.live = false;
            self.backend.dispose();
        }
    }
}

impl Drop for RenderHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// Ordered list of capability probes
pub struct BackendSelector {
    probes: Vec<Box<dyn CapabilityProbe>>,
}

impl BackendSelector {
    pub fn new(probes: Vec<Box<dyn CapabilityProbe>>) -> Self {
        Self { probes }
    }

    /// Area, line, generic plotters tiers; tiers missing from `enabled` probe as unavailable
    pub fn plotters(enabled: &[RenderTier]) -> Self {
        let probes = [RenderTier::Area, RenderTier::Line, RenderTier::Generic]
            .into_iter()
            .map(|tier| {
                Box::new(PlottersProbe {
                    tier,
                    enabled: enabled.contains(&tier),
                }) as Box<dyn CapabilityProbe>
            })
            .collect();
        Self::new(probes)
    }

    /// Try every probe in order and bind a handle to the first that succeeds
    pub fn select(&self, width: u32, height: u32) -> Result<RenderHandle, RenderError> {
        for probe in &self.probes {
            match probe.probe(width, height) {
                Ok(backend) => {
                    info!("📈 Chart initialized on {} tier ({}x{})", probe.tier().name(), width, height);
                    return Ok(RenderHandle::new(backend));
                }
                Err(e) => warn!("Render tier {} unavailable: {}", probe.tier().name(), e),
            }
        }
        Err(RenderError::NoCapableTier)
    }
}

/// Probe for one plotters bitmap tier
pub struct PlottersProbe {
    tier: RenderTier,
    enabled: bool,
}

impl CapabilityProbe for PlottersProbe {
    fn tier(&self) -> RenderTier {
        self.tier
    }

    fn probe(&self, width: u32, height: u32) -> Result<Box<dyn ChartBackend>, RenderError> {
        let name = self.tier.name();
        if !self.enabled || self.tier == RenderTier::Vector {
            return Err(RenderError::Unavailable(name, "not supported by host".to_string()));
        }
        check_dimensions(name, width, height)?;

        Ok(Box::new(PlottersChart {
            tier: self.tier,
            width,
            height,
            caption: None,
        }))
    }
}

fn check_dimensions(tier: &'static str, width: u32, height: u32) -> Result<(), RenderError> {
    if width < MIN_DIMENSION || height < MIN_DIMENSION {
        return Err(RenderError::Unavailable(
            tier,
            format!("surface {}x{} is too small", width, height),
        ));
    }
    if width as u64 * height as u64 > MAX_PIXELS {
        return Err(RenderError::Unavailable(
            tier,
            format!("surface {}x{} is too large", width, height),
        ));
    }
    Ok(())
}

/// Bitmap chart drawn with plotters into an in-memory RGB buffer
pub struct PlottersChart {
    tier: RenderTier,
    width: u32,
    height: u32,
    caption: Option<String>,
}

impl PlottersChart {
    /// Render the series and return the RGB pixels
    fn draw(&self, series: &[PricePoint]) -> Result<Vec<u8>, String> {
        let (min_price, max_price) = value_range(series).ok_or("empty series")?;
        let mut buffer = vec![0u8; self.width as usize * self.height as usize * 3];

        {
            let root = BitMapBackend::with_buffer(&mut buffer, (self.width, self.height))
                .into_drawing_area();
            root.fill(&WHITE)
                .map_err(|e| format!("Failed to fill canvas: {}", e))?;

            // Add some padding to the price range
            let price_range = (max_price - min_price).max(max_price * 1e-6).max(1e-12);
            let padding = price_range * 0.1;
            let y_min = (min_price - padding).max(0.0);
            let y_max = max_price + padding;

            // Get time range, widened for single-sample series
            let x_min = to_datetime(series[0].time)?;
            let mut x_max = to_datetime(series[series.len() - 1].time)?;
            if x_max <= x_min {
                x_max = x_min + Duration::hours(1);
            }
            let time_format = if x_max - x_min <= Duration::days(2) {
                "%H:%M"
            } else {
                "%m/%d"
            };

            let mut builder = ChartBuilder::on(&root);
            builder.margin(15).x_label_area_size(30).y_label_area_size(70);
            if let Some(caption) = &self.caption {
                builder.caption(caption, ("sans-serif", 24.0).into_font());
            }
            let mut chart = builder
                .build_cartesian_2d(x_min..x_max, y_min..y_max)
                .map_err(|e| format!("Failed to build chart: {}", e))?;

            chart
                .configure_mesh()
                .x_labels(6)
                .y_labels(5)
                .x_label_formatter(&|t: &DateTime<Utc>| t.format(time_format).to_string())
                .y_label_formatter(&|v: &f64| format!("{:.2}", v))
                .draw()
                .map_err(|e| format!("Failed to draw mesh: {}", e))?;

            let points: Vec<(DateTime<Utc>, f64)> = series
                .iter()
                .filter_map(|p| to_datetime(p.time).ok().map(|t| (t, p.value)))
                .collect();

            let drawn = match self.tier {
                RenderTier::Area => chart
                    .draw_series(
                        AreaSeries::new(points, y_min, BLUE.mix(0.2)).border_style(BLUE.stroke_width(2)),
                    )
                    .map(|_| ()),
                RenderTier::Line => chart
                    .draw_series(LineSeries::new(points, BLUE.stroke_width(2)))
                    .map(|_| ()),
                RenderTier::Generic => chart
                    .draw_series(points.windows(2).map(|w| PathElement::new(vec![w[0], w[1]], &BLUE)))
                    .map(|_| ()),
                RenderTier::Vector => return Err("vector tier is not drawn by plotters".to_string()),
            };
            drawn.map_err(|e| format!("Failed to draw series: {}", e))?;

            root.present()
                .map_err(|e| format!("Failed to render chart: {}", e))?;
        }

        Ok(buffer)
    }
}

impl ChartBackend for PlottersChart {
    fn tier(&self) -> RenderTier {
        self.tier
    }

    fn set_caption(&mut self, caption: &str) {
        self.caption = Some(caption.to_string());
    }

    fn set_data(&mut self, series: &[PricePoint], surface: &mut dyn Surface) -> Result<(), RenderError> {
        let rgb = self
            .draw(series)
            .map_err(|e| RenderError::Draw(self.tier.name(), e))?;
        surface.present(Frame::Raster {
            width: self.width,
            height: self.height,
            rgb,
        });
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        check_dimensions(self.tier.name(), width, height)?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn dispose(&mut self) {
        self.caption = None;
    }
}

fn to_datetime(time: i64) -> Result<DateTime<Utc>, String> {
    DateTime::<Utc>::from_timestamp(time, 0).ok_or_else(|| format!("timestamp {} out of range", time))
}
