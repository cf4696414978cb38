//! Orchestration layer (spec §4.4-§4.6): backfill, daemon polling, bar
//! construction, and threshold calibration, wired atop `arcana-storage`
//! and `arcana-ingestion`.

pub mod backfill;
pub mod build;
pub mod calibration;
pub mod daemon;
pub mod eta;
pub mod health;
pub mod metrics;
pub mod shutdown;

pub use backfill::{ingest_backfill, COMMIT_BATCH_SIZE, DEFAULT_WINDOW};
pub use build::{build_bars, TRADE_BATCH};
pub use calibration::{
    calibrate_dollar_threshold, calibrate_info_bar_initial_expected, calibrate_tick_threshold,
    calibrate_volume_threshold, InfoBarKind, DEFAULT_BARS_PER_DAY,
};
pub use daemon::{run_daemon, DAEMON_INTERVAL_SECONDS};
pub use eta::format_eta;
pub use health::{DaemonHealth, DaemonStatus};
pub use shutdown::ShutdownToken;
