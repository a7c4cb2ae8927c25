use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use plotters::prelude::*;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use pricechart::services::DataFetcher;
use pricechart::{mount, Frame, Surface, Timeframe, WidgetConfig, WidgetOptions};

const WIDTH: u32 = 960;
const HEIGHT: u32 = 540;

/// Surface that writes every presented frame to the output directory
struct FileSurface {
    dir: PathBuf,
    stem: String,
    written: mpsc::UnboundedSender<PathBuf>,
}

impl FileSurface {
    fn write_png(&self, path: &PathBuf, width: u32, height: u32, rgb: &[u8]) -> Result<(), String> {
        let mut backend = BitMapBackend::new(path, (width, height));
        backend
            .blit_bitmap((0, 0), (width, height), rgb)
            .map_err(|e| format!("Failed to copy frame: {:?}", e))?;
        backend
            .present()
            .map_err(|e| format!("Failed to write {}: {:?}", path.display(), e))
    }
}

impl Surface for FileSurface {
    fn size(&self) -> (u32, u32) {
        (WIDTH, HEIGHT)
    }

    fn clear(&mut self) {}

    fn present(&mut self, frame: Frame) {
        let result = match &frame {
            Frame::Raster { width, height, rgb } => {
                let path = self.dir.join(format!("{}.png", self.stem));
                self.write_png(&path, *width, *height, rgb).map(|()| path)
            }
            Frame::Vector(svg) => {
                let path = self.dir.join(format!("{}.svg", self.stem));
                std::fs::write(&path, svg)
                    .map(|()| path)
                    .map_err(|e| format!("Failed to write svg: {}", e))
            }
        };

        match result {
            Ok(path) => {
                let _ = self.written.send(path);
            }
            Err(e) => error!("{}", e),
        }
    }
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env()
            .add_directive("pricechart=debug".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap()))
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 {
        eprintln!("usage: pricechart <asset> <currency> [timeframe] [output-dir]");
        std::process::exit(2);
    }
    let asset_id = args[0].to_lowercase();
    let currency = args[1].to_lowercase();
    let timeframe = match args.get(2).map(|s| Timeframe::parse(s)).transpose() {
        Ok(tf) => tf.unwrap_or_default(),
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };
    let dir = PathBuf::from(args.get(3).map(String::as_str).unwrap_or("."));

    let config = match WidgetConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("📈 Starting pricechart for {}/{} ({})", asset_id, currency, timeframe.label());

    let fetcher = DataFetcher::from_config(&config);
    info!("Providers: {}", fetcher.provider_names().join(", "));

    let (written_tx, mut written_rx) = mpsc::unbounded_channel();
    let surface = FileSurface {
        dir,
        stem: format!("{}-{}-{}", asset_id, currency, timeframe.label().to_lowercase()),
        written: written_tx,
    };
    let options = WidgetOptions::from_config(&config).with_timeframe(timeframe);
    let widget = mount(&asset_id, &currency, surface, Arc::new(fetcher), options);
    let sample_data = widget.sample_data_updates();
    info!("⏳ Waiting for widget {} to draw", widget.id());

    // Each provider gets its own timeout, plus time for the deferred init
    let wait = config.request_timeout * 2 + config.init_delay + Duration::from_secs(5);
    match tokio::time::timeout(wait, written_rx.recv()).await {
        Ok(Some(path)) => info!("✅ Chart written to {}", path.display()),
        Ok(None) | Err(_) => error!("No chart was rendered within {:?}", wait),
    }

    widget.unmount().await;
    if *sample_data.borrow() {
        warn!("⚠️ Live data unavailable, chart shows sample data");
    }
}
