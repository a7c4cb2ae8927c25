//! Widget runtime
//!
//! A mounted widget is a single tokio task that owns its controller and its
//! surface. Everything that can change the chart (user commands, fetch
//! results, the snapshot timer, resize events) arrives on that task, so the
//! controller never needs a lock. Unmounting runs one cleanup path that
//! aborts in-flight work, drops the timers, unsubscribes from resizes and
//! tears the controller down.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::config::WidgetConfig;
use crate::models::{AssetSnapshot, PricePoint, Timeframe};
use crate::services::chart_service::{ChartController, LoadTicket, Selection};
use crate::services::fetch_service::MarketSource;
use crate::services::render_service::BackendSelector;
use crate::surface::Surface;
use crate::utils::errors::FetchError;
use crate::utils::format::{default_formatter, PriceFormatter};

/// Mount-time settings for one widget
pub struct WidgetOptions {
    pub timeframe: Timeframe,
    pub snapshot_interval: Duration,
    pub init_delay: Duration,
    pub fallback_base_price: f64,
    pub format_price: PriceFormatter,
    pub selector: BackendSelector,
}

impl WidgetOptions {
    pub fn from_config(config: &WidgetConfig) -> Self {
        Self {
            timeframe: Timeframe::default(),
            snapshot_interval: config.snapshot_interval,
            init_delay: config.init_delay,
            fallback_base_price: config.fallback_base_price,
            format_price: default_formatter(),
            selector: BackendSelector::plotters(&config.render_tiers),
        }
    }

    pub fn with_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = timeframe;
        self
    }

    pub fn with_formatter(mut self, format_price: PriceFormatter) -> Self {
        self.format_price = format_price;
        self
    }
}

enum Command {
    SelectTimeframe(Timeframe),
    SetAsset { asset_id: String, currency: String },
    Unmount(oneshot::Sender<()>),
}

/// Host-side handle to a mounted widget
///
/// Dropping the handle unmounts the widget.
pub struct WidgetHandle {
    id: Uuid,
    commands: mpsc::UnboundedSender<Command>,
    sample_data: watch::Receiver<bool>,
    task: JoinHandle<()>,
}

impl WidgetHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn select_timeframe(&self, timeframe: Timeframe) {
        let _ = self.commands.send(Command::SelectTimeframe(timeframe));
    }

    pub fn set_asset(&self, asset_id: &str, currency: &str) {
        let _ = self.commands.send(Command::SetAsset {
            asset_id: asset_id.to_string(),
            currency: currency.to_string(),
        });
    }

    /// Whether the chart currently shows synthesized data
    pub fn showing_sample_data(&self) -> bool {
        *self.sample_data.borrow()
    }

    /// Receiver that observes every change of the sample-data flag
    pub fn sample_data_updates(&self) -> watch::Receiver<bool> {
        self.sample_data.clone()
    }

    pub fn is_mounted(&self) -> bool {
        !self.task.is_finished()
    }

    /// Unmount and wait until cleanup has finished
    pub async fn unmount(self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.commands.send(Command::Unmount(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
        let _ = self.task.await;
    }
}

/// Mount a widget for `asset_id` quoted in `currency` onto `surface`
///
/// Must be called from within a tokio runtime. Surface initialization is
/// deferred by `options.init_delay`; the first snapshot poll starts at once.
pub fn mount<S, M>(
    asset_id: &str,
    currency: &str,
    surface: S,
    source: Arc<M>,
    options: WidgetOptions,
) -> WidgetHandle
where
    S: Surface + 'static,
    M: MarketSource + 'static,
{
    let id = Uuid::new_v4();
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (sample_tx, sample_rx) = watch::channel(false);
    let (loads_tx, loads_rx) = mpsc::unbounded_channel();
    let (snapshots_tx, snapshots_rx) = mpsc::unbounded_channel();

    let selection = Selection {
        asset_id: asset_id.to_string(),
        currency: currency.to_string(),
        timeframe: options.timeframe,
    };
    info!(
        "📈 Mounting widget {} for {}/{} ({})",
        id,
        selection.asset_id,
        selection.currency,
        selection.timeframe.label()
    );

    let controller = ChartController::new(
        selection,
        surface,
        options.selector,
        options.format_price,
        options.fallback_base_price,
    );
    let runtime = WidgetRuntime {
        controller,
        source,
        loads_tx,
        snapshots_tx,
        sample_tx,
        fetch_task: None,
        snapshot_task: None,
        initialized: false,
    };
    let channels = Channels {
        commands: command_rx,
        loads: loads_rx,
        snapshots: snapshots_rx,
    };

    let task = tokio::spawn(
        runtime
            .run(channels, options.init_delay, options.snapshot_interval)
            .instrument(tracing::info_span!("widget", id = %id)),
    );

    WidgetHandle {
        id,
        commands: command_tx,
        sample_data: sample_rx,
        task,
    }
}

type LoadResult = (LoadTicket, Result<Vec<PricePoint>, FetchError>);
type SnapshotResult = (String, String, Result<AssetSnapshot, FetchError>);

struct Channels {
    commands: mpsc::UnboundedReceiver<Command>,
    loads: mpsc::UnboundedReceiver<LoadResult>,
    snapshots: mpsc::UnboundedReceiver<SnapshotResult>,
}

/// Timers and host subscriptions created at mount and released once at unmount
struct Subscriptions {
    snapshot_poll: Interval,
    resize: Option<mpsc::UnboundedReceiver<(u32, u32)>>,
    resize_subscribed: bool,
}

impl Subscriptions {
    fn setup(surface: &mut dyn Surface, snapshot_interval: Duration) -> Self {
        // tokio rejects a zero period
        let mut snapshot_poll = tokio::time::interval(snapshot_interval.max(Duration::from_millis(1)));
        snapshot_poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let resize = surface.subscribe_resize();
        Self {
            snapshot_poll,
            resize_subscribed: resize.is_some(),
            resize,
        }
    }

    fn teardown(self, surface: &mut dyn Surface) {
        if self.resize_subscribed {
            surface.unsubscribe_resize();
        }
    }
}

/// Next resize event, or pending forever when there is no live subscription
async fn next_resize(resize: &mut Option<mpsc::UnboundedReceiver<(u32, u32)>>) -> Option<(u32, u32)> {
    match resize {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

struct WidgetRuntime<S: Surface, M: MarketSource> {
    controller: ChartController<S>,
    source: Arc<M>,
    loads_tx: mpsc::UnboundedSender<LoadResult>,
    snapshots_tx: mpsc::UnboundedSender<SnapshotResult>,
    sample_tx: watch::Sender<bool>,
    fetch_task: Option<JoinHandle<()>>,
    snapshot_task: Option<JoinHandle<()>>,
    initialized: bool,
}

impl<S, M> WidgetRuntime<S, M>
where
    S: Surface + 'static,
    M: MarketSource + 'static,
{
    async fn run(mut self, mut channels: Channels, init_delay: Duration, snapshot_interval: Duration) {
        let mut subscriptions = Subscriptions::setup(self.controller.surface_mut(), snapshot_interval);
        let init = tokio::time::sleep(init_delay);
        tokio::pin!(init);

        let ack = loop {
            tokio::select! {
                _ = &mut init, if !self.initialized => {
                    self.initialized = true;
                    debug!("Surface ready, loading first series");
                    if let Some(ticket) = self.controller.begin_load() {
                        self.dispatch(ticket);
                    }
                }
                command = channels.commands.recv() => match command {
                    Some(Command::SelectTimeframe(timeframe)) => {
                        if let Some(ticket) = self.controller.set_timeframe(timeframe) {
                            self.publish_sample_flag();
                            self.dispatch(ticket);
                        }
                    }
                    Some(Command::SetAsset { asset_id, currency }) => {
                        if let Some(ticket) = self.controller.set_asset(&asset_id, &currency) {
                            self.publish_sample_flag();
                            self.dispatch(ticket);
                            self.poll_snapshot();
                        }
                    }
                    Some(Command::Unmount(ack)) => break Some(ack),
                    None => break None,
                },
                Some((ticket, result)) = channels.loads.recv() => {
                    if self.controller.complete_load(&ticket, result) {
                        self.publish_sample_flag();
                    }
                }
                Some((asset_id, currency, result)) = channels.snapshots.recv() => match result {
                    Ok(snapshot) => {
                        self.controller.apply_snapshot(&asset_id, &currency, snapshot);
                    }
                    Err(e) => warn!("Snapshot refresh for {} failed: {}", asset_id, e),
                },
                _ = subscriptions.snapshot_poll.tick() => self.poll_snapshot(),
                resize = next_resize(&mut subscriptions.resize) => match resize {
                    Some((width, height)) => self.controller.resize(width, height),
                    None => subscriptions.resize = None,
                },
            }
        };

        self.shutdown(subscriptions);
        if let Some(ack) = ack {
            let _ = ack.send(());
        }
    }

    /// Tell the host whether the chart on screen is sample data
    fn publish_sample_flag(&self) {
        self.sample_tx.send_if_modified(|shown| {
            let showing = self.controller.showing_sample_data();
            let changed = *shown != showing;
            *shown = showing;
            changed
        });
    }

    /// Start fetching for `ticket`, replacing any fetch still in flight
    fn dispatch(&mut self, ticket: LoadTicket) {
        // Loads issued before the surface is ready wait for the init timer
        if !self.initialized {
            return;
        }
        if let Some(task) = self.fetch_task.take() {
            task.abort();
        }
        let source = self.source.clone();
        let loads_tx = self.loads_tx.clone();
        self.fetch_task = Some(tokio::spawn(async move {
            let Selection {
                asset_id,
                currency,
                timeframe,
            } = ticket.selection.clone();
            let result = source.price_series(&asset_id, &currency, timeframe).await;
            let _ = loads_tx.send((ticket, result));
        }));
    }

    fn poll_snapshot(&mut self) {
        if let Some(task) = self.snapshot_task.take() {
            task.abort();
        }
        let asset_id = self.controller.selection().asset_id.clone();
        let currency = self.controller.selection().currency.clone();
        debug!("Polling snapshot for {}/{}", asset_id, currency);
        let source = self.source.clone();
        let snapshots_tx = self.snapshots_tx.clone();
        self.snapshot_task = Some(tokio::spawn(async move {
            let result = source.snapshot(&asset_id, &currency).await;
            let _ = snapshots_tx.send((asset_id, currency, result));
        }));
    }

    fn shutdown(&mut self, subscriptions: Subscriptions) {
        if let Some(task) = self.fetch_task.take() {
            task.abort();
        }
        if let Some(task) = self.snapshot_task.take() {
            task.abort();
        }
        subscriptions.teardown(self.controller.surface_mut());
        self.controller.teardown();
        info!("Widget unmounted");
    }
}
