//! GFS → am opacity forecaster.
//!
//! Computes a forecast table per station and GFS cycle:
//! - Retrieves GFS 0.25° subsets from NOMADS with classified retries
//! - Interpolates a vertical profile to each station
//! - Runs `am` and records opacity, Tb and column totals
//!
//! Exit status: 0 when every station/cycle completed, 2 when any was
//! aborted because retrieval gave up, 1 for setup errors.

use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use am_model::{AmHeader, AmInvoker};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use met_common::ForecastCycle;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use forecaster::{
    is_complete, load_stations, output_path, select_stations, ForecastError, Forecaster,
    ForecasterConfig, NomadsSource, RetrievalController, RunStats, TableWriter, TempFileSink,
};

/// GFS data for a cycle is reliably on NOMADS this long after its reference time.
const DEFAULT_LAG_HOURS: f64 = 5.2;

#[derive(Parser, Debug)]
#[command(name = "forecaster")]
#[command(about = "GFS-driven am opacity forecasts for observing stations")]
struct Args {
    /// Station(s) to fetch; repeatable, comma lists allowed (default: all)
    #[arg(long)]
    vex: Vec<String>,

    /// Station list JSON (default: built-in list)
    #[arg(long, env = "FORECASTER_STATIONS")]
    stations: Option<PathBuf>,

    /// GFS cycle to fetch, YYYYMMDD or YYYYMMDDHH (default: latest available)
    #[arg(long)]
    cycle: Option<String>,

    /// Also process the cycles this many hours before --cycle
    #[arg(long, default_value = "0")]
    backfill: u32,

    /// Output directory
    #[arg(long, default_value = "am-forecast-output")]
    dir: PathBuf,

    /// Retry forever on 404, awaiting data availability
    #[arg(long)]
    wait: bool,

    /// Show what would be done
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Just do one hour
    #[arg(long)]
    one: bool,

    /// Only forecast offsets below this many hours
    #[arg(long)]
    hours: Option<u32>,

    /// Print the table to stdout instead of a file
    #[arg(long)]
    stdout: bool,

    /// YAML tuning file
    #[arg(long, env = "FORECASTER_CONFIG")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Serve Prometheus metrics on this address
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // stdout may carry the table
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(io::stderr)
        .json()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install tracing subscriber: {e}");
        return ExitCode::from(1);
    }

    match run(args).await {
        Ok(false) => ExitCode::SUCCESS,
        Ok(true) => ExitCode::from(2),
        Err(e) => {
            error!(error = %format!("{e:#}"), "Forecaster setup failed");
            ExitCode::from(1)
        }
    }
}

/// Returns whether any station/cycle was aborted.
async fn run(args: Args) -> Result<bool> {
    if let Some(addr) = args.metrics_addr {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!(%addr, "Prometheus metrics exporter listening");
    }

    let config = ForecasterConfig::load_or_default(args.config.as_deref())?;
    let all_stations = load_stations(args.stations.as_deref())?;
    let selection = select_stations(&all_stations, &args.vex);
    if !selection.unknown.is_empty() {
        let valid: Vec<String> = all_stations
            .iter()
            .map(|s| format!("{} {}", s.vex, s.name))
            .collect();
        warn!(unknown = ?selection.unknown, valid = ?valid, "Ignoring unknown vex codes");
    }
    if selection.stations.is_empty() {
        bail!("no valid stations to fetch");
    }

    let start = match &args.cycle {
        Some(cycle) => ForecastCycle::parse(cycle)?,
        None => ForecastCycle::latest(Utc::now(), DEFAULT_LAG_HOURS),
    };
    let cycles = start.with_backfill(args.backfill);
    let hour_limit = if args.one { Some(1) } else { args.hours };

    let source = NomadsSource::new(
        config.retrieval.base_url.clone(),
        Duration::from_secs(config.retrieval.connect_timeout_secs),
        Duration::from_secs(config.retrieval.read_timeout_secs),
    )?;
    let controller = RetrievalController::new(source, config.retry_policy(args.wait));
    let engine = match &config.engine.path {
        Some(path) => AmInvoker::new(path.clone()),
        None => AmInvoker::from_env(),
    }
    .with_timeout(config.engine.timeout());
    let sink = Arc::new(TempFileSink::new(
        config.diagnostics.dir.clone(),
        config.diagnostics.prefix.clone(),
    ));

    info!(
        stations = selection.stations.len(),
        cycles = cycles.len(),
        first_cycle = %start,
        am = %engine.program(),
        hour_limit = ?hour_limit,
        "Starting forecaster"
    );

    let forecaster = Forecaster::new(controller, engine, sink)
        .with_header(AmHeader::new(config.engine.frequency_ghz))
        .with_pacing(config.pacing_delay())
        .with_hour_limit(hour_limit);

    let mut stats = RunStats::default();
    let mut aborted = false;

    for station in &selection.stations {
        for cycle in &cycles {
            let path = output_path(&args.dir, &station.vex, cycle);
            info!(vex = %station.vex, cycle = %cycle, "Checking station");

            if is_complete(&path) {
                info!(path = %path.display(), "Output complete, not re-fetching");
                stats.record_cycle_existing();
                continue;
            }
            if args.dry_run {
                info!(vex = %station.vex, path = %path.display(), "Would process");
                continue;
            }

            let mut out: TableWriter<Box<dyn Write + Send>> = if args.stdout {
                TableWriter::new(Box::new(io::stdout()), None)
            } else {
                let (table, extra) = TableWriter::create(&path)
                    .with_context(|| format!("Failed to create {}", path.display()))?
                    .into_inner();
                TableWriter::new(
                    Box::new(table),
                    extra.map(|extra| Box::new(extra) as Box<dyn Write + Send>),
                )
            };

            match forecaster.run_cycle(station, *cycle, &mut out, &mut stats).await {
                Ok(_) => {}
                Err(ForecastError::Retrieval(e)) => {
                    error!(vex = %station.vex, cycle = %cycle, error = %e, "Aborting cycle");
                    aborted = true;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Writing {}", path.display()));
                }
            }
        }
    }

    stats.log_summary();
    Ok(aborted)
}
