//! Thin binary wiring the library crates together. Subcommands mirror
//! `original_source/src/arcana/cli.py`'s surface (`ingest`, `run`/`daemon`,
//! `bars build`, `calibrate`); argument parsing itself is out of scope for
//! this crate to build — it's glue, not a framework.

use arcana_bars::{
    parse_bar_spec, BarBuilder, BarSpec, DollarBarBuilder, ImbalanceBarBuilder, ImbalanceKind,
    RunBarBuilder, RunKind, TickBarBuilder, TimeBarBuilder, VolumeBarBuilder,
};
use arcana_ingestion::InMemoryDataSource;
use arcana_pipeline::{
    build_bars, calibrate_dollar_threshold, calibrate_info_bar_initial_expected,
    calibrate_tick_threshold, calibrate_volume_threshold, ingest_backfill, run_daemon,
    InfoBarKind, ShutdownToken, DAEMON_INTERVAL_SECONDS, DEFAULT_WINDOW,
};
use arcana_storage::{DuckDbStorage, Storage};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "arcana", version, about = "Quantitative trading data pipeline")]
struct Cli {
    /// Path to the DuckDB database file.
    #[arg(long, env = "ARCANA_DB_PATH", default_value = "arcana.db", global = true)]
    db_path: String,

    /// Data source name trades are tagged with.
    #[arg(long, env = "ARCANA_SOURCE", default_value = "coinbase", global = true)]
    source: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Bulk ingest historical trades for a trading pair.
    Ingest {
        pair: String,
        /// Start date, e.g. 2025-01-01.
        #[arg(long)]
        since: NaiveDate,
        /// End date (default: now).
        #[arg(long)]
        until: Option<NaiveDate>,
        /// JSON array of trades to seed the in-memory fixture from, since a
        /// real exchange client is out of scope for this crate.
        #[arg(long)]
        seed_file: Option<String>,
    },
    /// Run the ingestion daemon for a trading pair.
    Daemon {
        pair: String,
        #[arg(long, default_value_t = DAEMON_INTERVAL_SECONDS)]
        interval: u64,
        #[arg(long)]
        seed_file: Option<String>,
    },
    /// Build bars from stored trade data.
    Build {
        /// e.g. `tick_500`, `time_5m`, `dollar_50000`, `tib_20`.
        bar_spec: String,
        pair: String,
        #[arg(long)]
        rebuild: bool,
        #[arg(long, default_value_t = arcana_pipeline::DEFAULT_BARS_PER_DAY)]
        bars_per_day: f64,
    },
    /// Print a calibrated threshold without building bars.
    Calibrate {
        /// One of `dollar`, `tick`, `volume`, or an info-bar kind
        /// (`tib`, `vib`, `dib`, `trb`, `vrb`, `drb`).
        kind: String,
        pair: String,
        #[arg(long, default_value_t = arcana_pipeline::DEFAULT_BARS_PER_DAY)]
        bars_per_day: f64,
    },
}

fn to_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0).unwrap().and_utc()
}

fn rate_delay() -> Duration {
    Duration::from_secs_f64(arcana_common::config::rate_delay_seconds())
}

async fn seeded_source(name: &str, pair: &str, seed_file: &Option<String>) -> anyhow::Result<InMemoryDataSource> {
    let source = InMemoryDataSource::new(name);
    if let Some(path) = seed_file {
        let content = std::fs::read_to_string(path)?;
        let trades: Vec<arcana_common::Trade> = serde_json::from_str(&content)?;
        source.seed(pair, trades);
    }
    Ok(source)
}

/// Builds a concrete [`BarBuilder`] from a parsed spec, resolving `_auto`
/// variants via the calibrators and information-driven kinds via
/// `calibrate_info_bar_initial_expected`.
async fn resolve_builder(
    spec: &str,
    storage: &dyn Storage,
    source: &str,
    pair: &str,
    bars_per_day: f64,
) -> anyhow::Result<Box<dyn BarBuilder>> {
    let parsed = parse_bar_spec(spec)?;
    let builder: Box<dyn BarBuilder> = match parsed {
        BarSpec::Tick(n) => Box::new(TickBarBuilder::new(n, source, pair)?),
        BarSpec::Volume(threshold) => Box::new(VolumeBarBuilder::new(threshold, source, pair)?),
        BarSpec::Dollar(threshold) => Box::new(DollarBarBuilder::new(threshold, source, pair)?),
        BarSpec::Time(duration, label) => Box::new(TimeBarBuilder::new(duration, label, source, pair)?),
        BarSpec::TickAuto(override_bpd) => {
            let bpd = override_bpd.map(f64::from).unwrap_or(bars_per_day);
            let threshold = calibrate_tick_threshold(storage, pair, source, bpd).await?;
            Box::new(TickBarBuilder::new(threshold, source, pair)?)
        }
        BarSpec::VolumeAuto(override_bpd) => {
            let bpd = override_bpd.map(f64::from).unwrap_or(bars_per_day);
            let threshold = calibrate_volume_threshold(storage, pair, source, bpd).await?;
            Box::new(VolumeBarBuilder::new(
                rust_decimal::Decimal::try_from(threshold)?,
                source,
                pair,
            )?)
        }
        BarSpec::DollarAuto(override_bpd) => {
            let bpd = override_bpd.map(f64::from).unwrap_or(bars_per_day);
            let threshold = calibrate_dollar_threshold(storage, pair, source, bpd).await?;
            Box::new(DollarBarBuilder::new(rust_decimal::Decimal::from(threshold), source, pair)?)
        }
        BarSpec::Imbalance(kind, window) => {
            let info_kind = match kind {
                ImbalanceKind::Tick => InfoBarKind::TickImbalance,
                ImbalanceKind::Volume => InfoBarKind::VolumeImbalance,
                ImbalanceKind::Dollar => InfoBarKind::DollarImbalance,
            };
            let e0 = calibrate_info_bar_initial_expected(storage, pair, source, info_kind, bars_per_day).await?;
            Box::new(ImbalanceBarBuilder::new(kind, window, e0, source, pair)?)
        }
        BarSpec::Run(kind, window) => {
            let info_kind = match kind {
                RunKind::Tick => InfoBarKind::TickRun,
                RunKind::Volume => InfoBarKind::VolumeRun,
                RunKind::Dollar => InfoBarKind::DollarRun,
            };
            let e0 = calibrate_info_bar_initial_expected(storage, pair, source, info_kind, bars_per_day).await?;
            Box::new(RunBarBuilder::new(kind, window, e0, source, pair)?)
        }
    };
    Ok(builder)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let storage = DuckDbStorage::new(&cli.db_path).await?;
    let shutdown = ShutdownToken::install();

    match cli.command {
        Commands::Ingest { pair, since, until, seed_file } => {
            let source = seeded_source(&cli.source, &pair, &seed_file).await?;
            tracing::info!("ingesting {} from {} to {:?}", pair, since, until);
            let total = ingest_backfill(
                &source,
                &storage,
                &pair,
                to_utc(since),
                until.map(to_utc),
                DEFAULT_WINDOW,
                rate_delay(),
                &shutdown,
            )
            .await?;
            println!("done. {total} new trades ingested.");
        }
        Commands::Daemon { pair, interval, seed_file } => {
            let source = seeded_source(&cli.source, &pair, &seed_file).await?;
            println!("starting daemon for {pair} (poll every {interval}s). press ctrl+c to stop.");
            run_daemon(&source, &storage, &pair, interval, rate_delay(), &shutdown).await?;
            println!("daemon stopped.");
        }
        Commands::Build { bar_spec, pair, rebuild, bars_per_day } => {
            let mut builder = resolve_builder(&bar_spec, &storage, &cli.source, &pair, bars_per_day).await?;
            println!("building {} bars for {}...", builder.bar_type(), pair);
            let total = build_bars(builder.as_mut(), &storage, &pair, &cli.source, rebuild, &shutdown).await?;
            println!("done. {total} bars built.");
        }
        Commands::Calibrate { kind, pair, bars_per_day } => {
            let value = match kind.as_str() {
                "dollar" => calibrate_dollar_threshold(&storage, &pair, &cli.source, bars_per_day).await?.to_string(),
                "tick" => calibrate_tick_threshold(&storage, &pair, &cli.source, bars_per_day).await?.to_string(),
                "volume" => calibrate_volume_threshold(&storage, &pair, &cli.source, bars_per_day).await?.to_string(),
                "tib" | "vib" | "dib" | "trb" | "vrb" | "drb" => {
                    let info_kind = match kind.as_str() {
                        "tib" => InfoBarKind::TickImbalance,
                        "vib" => InfoBarKind::VolumeImbalance,
                        "dib" => InfoBarKind::DollarImbalance,
                        "trb" => InfoBarKind::TickRun,
                        "vrb" => InfoBarKind::VolumeRun,
                        "drb" => InfoBarKind::DollarRun,
                        _ => unreachable!(),
                    };
                    calibrate_info_bar_initial_expected(&storage, &pair, &cli.source, info_kind, bars_per_day)
                        .await?
                        .to_string()
                }
                other => anyhow::bail!("unknown calibration kind '{other}'"),
            };
            println!("{kind} {pair}: {value}");
        }
    }

    Ok(())
}
