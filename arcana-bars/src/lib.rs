pub mod builder;
pub mod imbalance;
pub mod runs;
pub mod spec;
pub mod standard;

pub use builder::BarBuilder;
pub use imbalance::{ImbalanceBarBuilder, ImbalanceKind};
pub use runs::{RunBarBuilder, RunKind};
pub use spec::{parse_bar_spec, parse_duration, BarSpec};
pub use standard::{DollarBarBuilder, TickBarBuilder, TimeBarBuilder, VolumeBarBuilder};
