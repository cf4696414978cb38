//! Adaptive-estimator state carried in a bar's `metadata` field.
//!
//! Modeled as a sum type of known variants rather than a free-form map
//! (Design Notes, spec §9): the core only ever reads and writes EWMA state
//! through it, and new variants can be added without touching every call
//! site. Serialized as JSON for forward compatibility.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum BarMetadata {
    /// EWMA estimator state for an information-driven builder, captured
    /// immediately after the update triggered by the emission it is
    /// attached to.
    Ewma { window: u32, expected: f64 },
}

impl BarMetadata {
    pub fn ewma(window: u32, expected: f64) -> Self {
        Self::Ewma { window, expected }
    }

    pub fn as_ewma(&self) -> Option<(u32, f64)> {
        match self {
            Self::Ewma { window, expected } => Some((*window, *expected)),
        }
    }
}
