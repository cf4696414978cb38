//! Daemon liveness reporting, modeled on `common::health::HealthCheck`.
//! No HTTP endpoint here — serving this over `axum` is CLI/orchestration
//! scaffolding, out of scope per spec §1; only the status type an endpoint
//! would serialize is ambient and kept.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DaemonStatus {
    /// Running, within one poll interval of its last successful cycle.
    Healthy,
    /// Running, but the last cycle failed (will retry next cycle per §4.7).
    Degraded,
    /// Not running, or has not completed a cycle since startup.
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonHealth {
    pub pair: String,
    pub status: DaemonStatus,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_cycle_ok: bool,
    pub cycles_completed: u64,
}

impl DaemonHealth {
    pub fn new(pair: impl Into<String>) -> Self {
        Self {
            pair: pair.into(),
            status: DaemonStatus::Unknown,
            last_cycle_at: None,
            last_cycle_ok: true,
            cycles_completed: 0,
        }
    }

    pub fn record_cycle(&mut self, ok: bool) {
        self.cycles_completed += 1;
        self.last_cycle_at = Some(Utc::now());
        self.last_cycle_ok = ok;
        self.status = if ok { DaemonStatus::Healthy } else { DaemonStatus::Degraded };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unknown_and_tracks_cycles() {
        let mut health = DaemonHealth::new("ETH-USD");
        assert_eq!(health.status, DaemonStatus::Unknown);

        health.record_cycle(true);
        assert_eq!(health.status, DaemonStatus::Healthy);
        assert_eq!(health.cycles_completed, 1);

        health.record_cycle(false);
        assert_eq!(health.status, DaemonStatus::Degraded);
        assert_eq!(health.cycles_completed, 2);
    }
}
