//! Error types shared across the Arcana crates.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ArcanaError>;

/// Errors surfaced by the bar builders, storage adapter, ingestion and
/// pipeline orchestrator. One variant per row of the failure-semantics
/// table: configuration is rejected before any I/O, calibration and
/// invariant failures are explicit, transport/storage failures propagate
/// for the caller to retry.
#[derive(Error, Debug)]
pub enum ArcanaError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("calibration error: {0}")]
    Calibration(String),

    #[error("source error: {0}")]
    Source(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invariant violation: {0}")]
    Invariant(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArcanaError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn calibration(msg: impl Into<String>) -> Self {
        Self::Calibration(msg.into())
    }

    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }
}
