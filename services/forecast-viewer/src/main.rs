//! Precipitation forecast viewer.
//!
//! Resolves the current forecast run, opens one raster per forecast horizon,
//! and serves on-demand PNG tiles plus the overlay state the map client needs.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use cog_reader::{CogOpener, DecodePool, RasterFetcher};
use forecast_common::resolve_target_date;
use forecast_common::time::local_now;
use forecast_viewer::config::ViewerConfig;
use forecast_viewer::state::AppState;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "forecast-viewer")]
#[command(about = "On-demand precipitation forecast tile server")]
struct Args {
    /// Listen address
    #[arg(short, long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    listen: String,

    /// YAML configuration file
    #[arg(short, long, env = "FORECAST_CONFIG")]
    config: Option<PathBuf>,

    /// Forecast run date (YYYY-MM-DD); resolved from the clock when omitted
    #[arg(long)]
    run_date: Option<NaiveDate>,

    /// Decode pool threads (overrides the configuration file)
    #[arg(long)]
    decode_threads: Option<usize>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // Initialize Prometheus metrics exporter
    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    info!("Starting forecast viewer");

    let mut config = ViewerConfig::load(args.config.as_deref())?;
    if args.decode_threads.is_some() {
        config.decode_threads = args.decode_threads;
    }

    let run_date = match args.run_date {
        Some(date) => date,
        None => {
            let offset = config
                .utc_offset()
                .context("utc_offset_minutes is out of range")?;
            resolve_target_date(local_now(offset))
        }
    };

    let pool = DecodePool::new(config.decode_threads)?;
    info!(threads = pool.threads(), "Decode pool ready");
    let fetcher =
        RasterFetcher::new(config.request_timeout())?.with_max_bytes(config.max_source_bytes);
    info!(max_source_bytes = fetcher.max_bytes(), "Raster fetcher ready");
    let opener = Arc::new(CogOpener::new(fetcher, pool));

    let (state, report) = AppState::initialize(config, run_date, opener).await?;
    if report.loaded.is_empty() {
        warn!(run_date = %run_date, "No forecast layers could be loaded");
    }
    info!(
        headline = %state.headline(),
        attempted = report.attempted(),
        loaded = report.loaded.len(),
        failed = report.failed.len(),
        "Forecast layers ready"
    );

    let app = forecast_viewer::router(Arc::new(state.with_metrics(prometheus_handle)));

    // Parse listen address
    let addr: SocketAddr = args.listen.parse()?;
    info!(address = %addr, "Listening");

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
