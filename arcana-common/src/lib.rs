pub mod accumulator;
pub mod bar;
pub mod config;
pub mod error;
pub mod ewma;
pub mod metadata;
pub mod trade;

pub use accumulator::Accumulator;
pub use bar::Bar;
pub use config::{ArcanaConfig, BarConfig, DatabaseConfig, PipelineConfig};
pub use error::{ArcanaError, Result};
pub use ewma::{tick_rule, EwmaEstimator};
pub use metadata::BarMetadata;
pub use trade::{Side, Trade};
