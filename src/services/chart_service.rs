//! Chart lifecycle controller
//!
//! Owns the one render session, the current selection, the latest issued
//! sequence number and the series buffer. Loads are issued as sequence-tagged
//! tickets; only the ticket carrying the latest sequence may change what is
//! displayed, whatever order responses arrive in.

use tracing::{debug, info, warn};

use crate::models::chart::normalize_series;
use crate::models::{AssetSnapshot, PricePoint, Timeframe};
use crate::services::fallback_service::{render_fallback, FallbackContext};
use crate::services::render_service::{BackendSelector, RenderHandle, RenderTier};
use crate::services::synth_service::synthesize;
use crate::surface::Surface;
use crate::utils::errors::FetchError;
use crate::utils::format::PriceFormatter;

/// How the current series is displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Primary(RenderTier),
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartState {
    /// Mounted, nothing requested yet
    Empty,
    /// Waiting for the latest load
    Loading,
    Rendered(RenderMode),
    /// A primary tier failed at runtime; the vector renderer took over
    Error,
    /// Unmounted; no further surface access
    TornDown,
}

/// The asset, quote currency and timeframe being charted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub asset_id: String,
    pub currency: String,
    pub timeframe: Timeframe,
}

/// A load request tagged with the sequence number it was issued under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub seq: u64,
    pub selection: Selection,
}

pub struct ChartController<S: Surface> {
    selection: Selection,
    state: ChartState,
    latest_seq: u64,
    series: Vec<PricePoint>,
    session: Option<RenderHandle>,
    showing_sample_data: bool,
    snapshot: Option<AssetSnapshot>,
    selector: BackendSelector,
    surface: S,
    format_price: PriceFormatter,
    fallback_base_price: f64,
}

impl<S: Surface> ChartController<S> {
    pub fn new(
        selection: Selection,
        surface: S,
        selector: BackendSelector,
        format_price: PriceFormatter,
        fallback_base_price: f64,
    ) -> Self {
        Self {
            selection,
            state: ChartState::Empty,
            latest_seq: 0,
            series: Vec::new(),
            session: None,
            showing_sample_data: false,
            snapshot: None,
            selector,
            surface,
            format_price,
            fallback_base_price,
        }
    }

    pub fn state(&self) -> ChartState {
        self.state
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Series currently displayed (empty until the first load completes)
    pub fn series(&self) -> &[PricePoint] {
        &self.series
    }

    pub fn showing_sample_data(&self) -> bool {
        self.showing_sample_data
    }

    pub fn latest_seq(&self) -> u64 {
        self.latest_seq
    }

    pub fn snapshot(&self) -> Option<&AssetSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn active_tier(&self) -> Option<RenderTier> {
        self.session.as_ref().map(|h| h.tier())
    }

    pub(crate) fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Issue a load for the current selection
    pub fn begin_load(&mut self) -> Option<LoadTicket> {
        if self.state == ChartState::TornDown {
            return None;
        }
        self.latest_seq += 1;
        self.state = ChartState::Loading;
        debug!(
            "Load #{} for {}/{} {}",
            self.latest_seq,
            self.selection.asset_id,
            self.selection.currency,
            self.selection.timeframe.label()
        );
        Some(LoadTicket {
            seq: self.latest_seq,
            selection: self.selection.clone(),
        })
    }

    /// Switch timeframe; `None` when unchanged or torn down
    pub fn set_timeframe(&mut self, timeframe: Timeframe) -> Option<LoadTicket> {
        if self.state == ChartState::TornDown || self.selection.timeframe == timeframe {
            return None;
        }
        self.selection.timeframe = timeframe;
        self.reset_display();
        self.begin_load()
    }

    /// Switch asset or quote currency; `None` when unchanged or torn down
    pub fn set_asset(&mut self, asset_id: &str, currency: &str) -> Option<LoadTicket> {
        if self.state == ChartState::TornDown
            || (self.selection.asset_id == asset_id && self.selection.currency == currency)
        {
            return None;
        }
        self.selection.asset_id = asset_id.to_string();
        self.selection.currency = currency.to_string();
        // The old snapshot describes another asset
        self.snapshot = None;
        self.reset_display();
        self.begin_load()
    }

    /// Apply a fetch outcome; returns false when the ticket has been superseded
    pub fn complete_load(
        &mut self,
        ticket: &LoadTicket,
        result: Result<Vec<PricePoint>, FetchError>,
    ) -> bool {
        if self.state == ChartState::TornDown {
            return false;
        }
        if ticket.seq != self.latest_seq {
            debug!(
                "Discarding response #{} (latest is #{})",
                ticket.seq, self.latest_seq
            );
            return false;
        }

        let live = match result {
            Ok(series) => normalize_series(series),
            Err(e) => {
                warn!("Price history unavailable for {}: {}", ticket.selection.asset_id, e);
                Vec::new()
            }
        };

        if live.is_empty() {
            let base_price = self.base_price();
            info!(
                "Using sample data for {} ({}), base price {}",
                ticket.selection.asset_id,
                ticket.selection.timeframe.label(),
                base_price
            );
            self.series = synthesize(ticket.selection.timeframe, base_price);
            self.showing_sample_data = true;
        } else {
            self.series = live;
            self.showing_sample_data = false;
        }

        self.show_series();
        true
    }

    /// Store the latest snapshot if it belongs to the current asset
    pub fn apply_snapshot(&mut self, asset_id: &str, currency: &str, snapshot: AssetSnapshot) -> bool {
        if self.state == ChartState::TornDown
            || self.selection.asset_id != asset_id
            || self.selection.currency != currency
        {
            return false;
        }
        // Displayed sample data keeps the base price it was generated from
        self.snapshot = Some(snapshot);
        true
    }

    /// Redraw the current series at the surface's new size
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.series.is_empty() {
            return;
        }
        match self.state {
            ChartState::Rendered(RenderMode::Primary(_)) => {
                let resized = match self.session.as_mut() {
                    Some(handle) => handle.resize(width, height),
                    None => return,
                };
                match resized {
                    Ok(()) => self.show_series(),
                    Err(e) => {
                        warn!("Chart resize failed: {}", e);
                        self.dispose_session();
                        self.draw_fallback();
                        self.state = ChartState::Error;
                    }
                }
            }
            ChartState::Rendered(RenderMode::Fallback) | ChartState::Error => self.draw_fallback(),
            _ => {}
        }
    }

    /// Dispose the render session and drop the series; later calls are no-ops
    pub fn teardown(&mut self) {
        if self.state == ChartState::TornDown {
            return;
        }
        self.dispose_session();
        self.series.clear();
        self.state = ChartState::TornDown;
        info!("Chart for {} torn down", self.selection.asset_id);
    }

    /// Snapshot price at this moment, or the configured base price before the first snapshot
    fn base_price(&self) -> f64 {
        self.snapshot
            .as_ref()
            .map(|s| s.current_price)
            .filter(|p| *p > 0.0 && p.is_finite())
            .unwrap_or(self.fallback_base_price)
    }

    fn display_name(&self) -> String {
        match &self.snapshot {
            Some(snapshot) if !snapshot.name.is_empty() => snapshot.display_name(),
            _ => self.selection.asset_id.clone(),
        }
    }

    /// Forget everything shown for the previous selection
    fn reset_display(&mut self) {
        self.dispose_session();
        self.series.clear();
        self.showing_sample_data = false;
        self.surface.clear();
    }

    fn dispose_session(&mut self) {
        if let Some(handle) = self.session.take() {
            debug!("Disposing {} chart", handle.tier().name());
            handle.dispose();
        }
    }

    /// Draw the series on the live handle, creating one first if needed
    fn show_series(&mut self) {
        if self.session.is_none() {
            let (width, height) = self.surface.size();
            match self.selector.select(width, height) {
                Ok(handle) => self.session = Some(handle),
                Err(e) => {
                    warn!("No chart tier available ({}), using vector renderer", e);
                    self.draw_fallback();
                    self.state = ChartState::Rendered(RenderMode::Fallback);
                    return;
                }
            }
        }

        let caption = format!("{} · {}", self.display_name(), self.selection.timeframe.label());
        let drawn = match self.session.as_mut() {
            Some(handle) => {
                handle.set_caption(&caption);
                handle
                    .set_data(&self.series, &mut self.surface)
                    .map(|()| handle.tier())
            }
            None => return,
        };

        match drawn {
            Ok(tier) => self.state = ChartState::Rendered(RenderMode::Primary(tier)),
            Err(e) => {
                let was_primary = matches!(self.state, ChartState::Rendered(RenderMode::Primary(_)));
                warn!("Chart backend failed ({}), switching to vector renderer", e);
                self.dispose_session();
                self.draw_fallback();
                self.state = if was_primary {
                    ChartState::Error
                } else {
                    ChartState::Rendered(RenderMode::Fallback)
                };
            }
        }
    }

    fn draw_fallback(&mut self) {
        let asset_name = self.display_name();
        let context = FallbackContext {
            asset_name: &asset_name,
            timeframe: self.selection.timeframe,
            currency: &self.selection.currency,
            format_price: &*self.format_price,
            sample_data: self.showing_sample_data,
        };
        render_fallback(&mut self.surface, &self.series, &context);
    }
}
