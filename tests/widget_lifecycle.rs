use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use pricechart::services::{
    mount, BackendSelector, CapabilityProbe, ChartBackend, MarketSource, RenderTier, WidgetOptions,
};
use pricechart::utils::{default_formatter, ApiError, FetchError, PriceFormatter, RenderError};
use pricechart::{AssetSnapshot, Frame, PricePoint, Surface, Timeframe};

type Log = Arc<Mutex<Vec<String>>>;

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

struct TestSurface {
    log: Log,
    svgs: Log,
    resize: Option<mpsc::UnboundedReceiver<(u32, u32)>>,
}

impl Surface for TestSurface {
    fn size(&self) -> (u32, u32) {
        (640, 360)
    }
    fn clear(&mut self) {
        self.log.lock().unwrap().push("clear".to_string());
    }
    fn present(&mut self, frame: Frame) {
        let kind = match &frame {
            Frame::Vector(svg) => {
                self.svgs.lock().unwrap().push(svg.clone());
                "vector"
            }
            Frame::Raster { .. } => "raster",
        };
        self.log.lock().unwrap().push(format!("present {}", kind));
    }
    fn subscribe_resize(&mut self) -> Option<mpsc::UnboundedReceiver<(u32, u32)>> {
        self.log.lock().unwrap().push("subscribe".to_string());
        self.resize.take()
    }
    fn unsubscribe_resize(&mut self) {
        self.log.lock().unwrap().push("unsubscribe".to_string());
    }
}

struct TestProbe {
    log: Log,
}

struct TestBackend {
    log: Log,
}

impl CapabilityProbe for TestProbe {
    fn tier(&self) -> RenderTier {
        RenderTier::Area
    }
    fn probe(&self, _width: u32, _height: u32) -> Result<Box<dyn ChartBackend>, RenderError> {
        Ok(Box::new(TestBackend { log: self.log.clone() }))
    }
}

impl ChartBackend for TestBackend {
    fn tier(&self) -> RenderTier {
        RenderTier::Area
    }
    fn set_data(&mut self, series: &[PricePoint], surface: &mut dyn Surface) -> Result<(), RenderError> {
        let first = series.first().map(|p| p.value).unwrap_or_default();
        self.log
            .lock()
            .unwrap()
            .push(format!("set_data {} {}", series.len(), first));
        surface.present(Frame::Raster {
            width: 1,
            height: 1,
            rgb: vec![0, 0, 0],
        });
        Ok(())
    }
    fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        self.log.lock().unwrap().push(format!("resize {}x{}", width, height));
        Ok(())
    }
    fn dispose(&mut self) {
        self.log.lock().unwrap().push("dispose".to_string());
    }
}

/// Market source with a per-timeframe response delay
struct ScriptedSource {
    delays: HashMap<Timeframe, Duration>,
    series_fails: bool,
    failing: Vec<Timeframe>,
    snapshot_price: f64,
    series_calls: AtomicUsize,
    snapshot_calls: AtomicUsize,
}

impl ScriptedSource {
    fn live() -> Self {
        Self {
            delays: HashMap::new(),
            series_fails: false,
            failing: Vec::new(),
            snapshot_price: 50.0,
            series_calls: AtomicUsize::new(0),
            snapshot_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MarketSource for ScriptedSource {
    async fn price_series(
        &self,
        _asset_id: &str,
        _currency: &str,
        timeframe: Timeframe,
    ) -> Result<Vec<PricePoint>, FetchError> {
        self.series_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(&timeframe) {
            tokio::time::sleep(*delay).await;
        }
        if self.series_fails || self.failing.contains(&timeframe) {
            return Err(FetchError::Exhausted(vec![
                ("direct".to_string(), ApiError::HttpError(502, "bad gateway".to_string())),
                ("relay".to_string(), ApiError::Timeout(10_000)),
            ]));
        }
        // The first value identifies the timeframe that produced the series
        let value = timeframe.span_days() as f64;
        Ok(vec![
            PricePoint::new(0, value),
            PricePoint::new(86_400, value + 1.0),
        ])
    }

    async fn snapshot(&self, asset_id: &str, _currency: &str) -> Result<AssetSnapshot, FetchError> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        Ok(AssetSnapshot {
            id: asset_id.to_string(),
            name: "Bitcoin".to_string(),
            symbol: "btc".to_string(),
            current_price: self.snapshot_price,
            ..Default::default()
        })
    }
}

fn options(log: &Log) -> WidgetOptions {
    WidgetOptions {
        timeframe: Timeframe::Week,
        snapshot_interval: Duration::from_secs(60),
        init_delay: Duration::from_millis(100),
        fallback_base_price: 100.0,
        format_price: default_formatter(),
        selector: BackendSelector::new(vec![Box::new(TestProbe { log: log.clone() })]),
    }
}

fn surface(log: &Log) -> (TestSurface, mpsc::UnboundedSender<(u32, u32)>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        TestSurface {
            log: log.clone(),
            svgs: Arc::default(),
            resize: Some(rx),
        },
        tx,
    )
}

#[tokio::test(start_paused = true)]
async fn test_first_load_waits_for_init_delay() {
    let log: Log = Arc::default();
    let source = Arc::new(ScriptedSource::live());
    let (surface, _resize) = surface(&log);
    let widget = mount("bitcoin", "usd", surface, source.clone(), options(&log));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(source.series_calls.load(Ordering::SeqCst), 0);
    assert!(!entries(&log).iter().any(|l| l.starts_with("set_data")));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(source.series_calls.load(Ordering::SeqCst), 1);
    assert!(entries(&log).contains(&"set_data 2 7".to_string()));
    assert!(!widget.showing_sample_data());

    widget.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn test_latest_timeframe_wins_over_slower_earlier_fetch() {
    let log: Log = Arc::default();
    let mut source = ScriptedSource::live();
    source.delays.insert(Timeframe::Month, Duration::from_secs(5));
    source.delays.insert(Timeframe::Year, Duration::from_secs(1));
    let source = Arc::new(source);
    let (surface, _resize) = surface(&log);
    let widget = mount("bitcoin", "usd", surface, source.clone(), options(&log));

    tokio::time::sleep(Duration::from_millis(200)).await;
    widget.select_timeframe(Timeframe::Month);
    widget.select_timeframe(Timeframe::Year);
    tokio::time::sleep(Duration::from_secs(10)).await;

    let drawn: Vec<String> = entries(&log)
        .into_iter()
        .filter(|l| l.starts_with("set_data"))
        .collect();
    assert_eq!(drawn.last().unwrap(), "set_data 2 365");
    assert!(!drawn.contains(&"set_data 2 30".to_string()));

    widget.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn test_failing_providers_show_sample_data_from_snapshot_price() {
    let log: Log = Arc::default();
    let mut source = ScriptedSource::live();
    source.series_fails = true;
    source.snapshot_price = 250.0;
    let (surface, _resize) = surface(&log);
    let widget = mount("bitcoin", "usd", surface, Arc::new(source), options(&log));
    let mut flag = widget.sample_data_updates();

    tokio::time::timeout(Duration::from_secs(1), flag.changed())
        .await
        .unwrap()
        .unwrap();
    assert!(widget.showing_sample_data());

    let expected = format!("set_data {} 250", Timeframe::Week.sample_count());
    assert!(entries(&log).contains(&expected));

    widget.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn test_unmount_stops_timers_and_surface_access() {
    let log: Log = Arc::default();
    let source = Arc::new(ScriptedSource::live());
    let (surface, resize) = surface(&log);
    let widget = mount("bitcoin", "usd", surface, source.clone(), options(&log));

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(source.snapshot_calls.load(Ordering::SeqCst), 2);

    widget.unmount().await;
    let after_unmount = entries(&log);
    assert_eq!(after_unmount.iter().filter(|l| *l == "unsubscribe").count(), 1);
    assert_eq!(after_unmount.iter().filter(|l| *l == "dispose").count(), 1);

    let _ = resize.send((800, 600));
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(source.snapshot_calls.load(Ordering::SeqCst), 2);
    assert_eq!(source.series_calls.load(Ordering::SeqCst), 1);
    assert_eq!(entries(&log), after_unmount);
}

#[tokio::test(start_paused = true)]
async fn test_unmount_before_init_never_draws() {
    let log: Log = Arc::default();
    let source = Arc::new(ScriptedSource::live());
    let (surface, _resize) = surface(&log);
    let widget = mount("bitcoin", "usd", surface, source.clone(), options(&log));
    assert!(widget.is_mounted());

    widget.unmount().await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(source.series_calls.load(Ordering::SeqCst), 0);
    assert_eq!(entries(&log), vec!["subscribe", "unsubscribe"]);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handle_unmounts() {
    let log: Log = Arc::default();
    let source = Arc::new(ScriptedSource::live());
    let (surface, _resize) = surface(&log);
    let widget = mount("bitcoin", "usd", surface, source.clone(), options(&log));

    tokio::time::sleep(Duration::from_millis(200)).await;
    drop(widget);
    tokio::time::sleep(Duration::from_millis(10)).await;

    let log = entries(&log);
    assert_eq!(log.last().unwrap(), "dispose");
    assert!(log.contains(&"unsubscribe".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_resize_redraws_current_series() {
    let log: Log = Arc::default();
    let source = Arc::new(ScriptedSource::live());
    let (surface, resize) = surface(&log);
    let widget = mount("bitcoin", "usd", surface, source, options(&log));

    tokio::time::sleep(Duration::from_millis(200)).await;
    resize.send((800, 600)).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let log = entries(&log);
    let resized = log.iter().position(|l| l == "resize 800x600").unwrap();
    assert_eq!(log[resized + 1], "set_data 2 7");

    widget.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn test_asset_change_reloads_and_refreshes_snapshot() {
    let log: Log = Arc::default();
    let source = Arc::new(ScriptedSource::live());
    let (surface, _resize) = surface(&log);
    let widget = mount("bitcoin", "usd", surface, source.clone(), options(&log));

    tokio::time::sleep(Duration::from_millis(200)).await;
    widget.set_asset("ethereum", "eur");
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(source.series_calls.load(Ordering::SeqCst), 2);
    assert_eq!(source.snapshot_calls.load(Ordering::SeqCst), 2);
    let log = entries(&log);
    let dispose = log.iter().position(|l| l == "dispose").unwrap();
    assert_eq!(log[dispose + 1], "clear");
    assert_eq!(log.last().unwrap(), "present raster");

    widget.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn test_sample_flag_clears_while_next_selection_loads() {
    let log: Log = Arc::default();
    let mut source = ScriptedSource::live();
    source.failing.push(Timeframe::Week);
    source.delays.insert(Timeframe::Month, Duration::from_secs(5));
    let (surface, _resize) = surface(&log);
    let widget = mount("bitcoin", "usd", surface, Arc::new(source), options(&log));
    let mut flag = widget.sample_data_updates();

    flag.changed().await.unwrap();
    assert!(widget.showing_sample_data());

    widget.select_timeframe(Timeframe::Month);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!widget.showing_sample_data());
    assert_eq!(entries(&log).last().unwrap(), "clear");

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(!widget.showing_sample_data());
    assert!(entries(&log).contains(&"set_data 2 30".to_string()));

    widget.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn test_host_formatter_labels_vector_chart() {
    let log: Log = Arc::default();
    let svgs: Log = Arc::default();
    let surface = TestSurface {
        log: log.clone(),
        svgs: svgs.clone(),
        resize: None,
    };
    let formatter: PriceFormatter =
        Arc::new(|value: f64, currency: &str| format!("{:.0} {}!", value, currency.to_uppercase()));
    let options = WidgetOptions {
        selector: BackendSelector::new(Vec::new()),
        ..options(&log)
    }
    .with_formatter(formatter);
    let widget = mount("bitcoin", "usd", surface, Arc::new(ScriptedSource::live()), options);

    tokio::time::sleep(Duration::from_millis(200)).await;

    let svgs = svgs.lock().unwrap().clone();
    assert_eq!(svgs.len(), 1);
    assert!(svgs[0].contains(">8 USD!</text>"), "{}", svgs[0]);
    assert_eq!(entries(&log).last().unwrap(), "present vector");

    widget.unmount().await;
}
