//! Configuration surface (spec §6). Loading the file itself — picking a
//! path, wiring a CLI flag — is out of scope; this module owns the shape
//! of the configuration and the environment-variable override merge.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database_name: String,
    pub user: String,
    pub password: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database_name: "arcana".to_string(),
            user: "arcana".to_string(),
            password: String::new(),
        }
    }
}

impl DatabaseConfig {
    /// Applies `ARCANA_DB_HOST` / `ARCANA_DB_PORT` / `ARCANA_DB_NAME` /
    /// `ARCANA_DB_USER` / `ARCANA_DB_PASSWORD` overrides, if set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("ARCANA_DB_HOST") {
            self.host = v;
        }
        if let Ok(v) = std::env::var("ARCANA_DB_PORT") {
            if let Ok(port) = v.parse() {
                self.port = port;
            }
        }
        if let Ok(v) = std::env::var("ARCANA_DB_NAME") {
            self.database_name = v;
        }
        if let Ok(v) = std::env::var("ARCANA_DB_USER") {
            self.user = v;
        }
        if let Ok(v) = std::env::var("ARCANA_DB_PASSWORD") {
            self.password = v;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub default_pair: String,
    pub default_source: String,
    #[serde(default = "default_bars_per_day")]
    pub default_bars_per_day: u32,
}

fn default_bars_per_day() -> u32 {
    50
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_pair: "ETH-USD".to_string(),
            default_source: "coinbase".to_string(),
            default_bars_per_day: default_bars_per_day(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarConfig {
    /// A bar-spec string, e.g. `tick_500`, `tib_20`, `time_5m`.
    pub spec: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub bars_per_day_override: Option<u32>,
    pub initial_expected_override: Option<f64>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArcanaConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub bars: Vec<BarConfig>,
}

impl Default for ArcanaConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            pipeline: PipelineConfig::default(),
            bars: Vec::new(),
        }
    }
}

impl ArcanaConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&content)?;
        config.database.apply_env_overrides();
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Seconds to sleep between external API calls, per `ARCANA_RATE_DELAY`
/// (default `0.12`s, approximately 8 req/s under a 10 req/s ceiling).
pub fn rate_delay_seconds() -> f64 {
    std::env::var("ARCANA_RATE_DELAY")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0.12)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rate_delay_matches_spec() {
        std::env::remove_var("ARCANA_RATE_DELAY");
        assert_eq!(rate_delay_seconds(), 0.12);
    }

    #[test]
    fn default_bars_per_day_is_fifty() {
        assert_eq!(PipelineConfig::default().default_bars_per_day, 50);
    }
}
