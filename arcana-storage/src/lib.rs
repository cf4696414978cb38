pub mod contract;
pub mod duckdb_storage;

pub use contract::{Storage, TradeCursor, TradeStats};
pub use duckdb_storage::DuckDbStorage;
