//! The bar-spec surface (spec §6): parses the textual form configured in
//! `bars[].spec` into a [`BarSpec`]. Auto-calibrated specs (`tick_auto`,
//! `volume_auto`, `dollar_auto`) carry an optional `bars_per_day` override;
//! resolving them into a concrete threshold is the calibrator's job
//! (`arcana-pipeline::calibration`), not this parser's.

use crate::imbalance::ImbalanceKind;
use crate::runs::RunKind;
use arcana_common::{ArcanaError, Result};
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

const SUPPORTED_FORMS: &str = "tick_N | volume_N | dollar_N | tick_auto[_B] | volume_auto[_B] | \
     dollar_auto[_B] | time_Nu (u in s,m,h,d) | tib_W | vib_W | dib_W | trb_W | vrb_W | drb_W";

#[derive(Debug, Clone, PartialEq)]
pub enum BarSpec {
    Tick(u64),
    Volume(Decimal),
    Dollar(Decimal),
    TickAuto(Option<u32>),
    VolumeAuto(Option<u32>),
    DollarAuto(Option<u32>),
    /// Parsed interval plus the original textual label (`5m`, `1h`, ...).
    Time(chrono::Duration, String),
    Imbalance(ImbalanceKind, u32),
    Run(RunKind, u32),
}

fn invalid(spec: &str) -> ArcanaError {
    ArcanaError::configuration(format!(
        "invalid bar spec '{spec}'; supported forms: {SUPPORTED_FORMS}"
    ))
}

/// Parses `Ns`, `Nm`, `Nh`, `Nd` into a `chrono::Duration`, returning the
/// label unchanged for use in the bar-type string.
pub fn parse_duration(label: &str) -> Result<chrono::Duration> {
    let re = Regex::new(r"^(\d+)([smhd])$").unwrap();
    let caps = re
        .captures(label)
        .ok_or_else(|| ArcanaError::configuration(format!("invalid duration '{label}'; expected Ns|Nm|Nh|Nd")))?;
    let n: i64 = caps[1].parse().map_err(|_| invalid(label))?;
    let duration = match &caps[2] {
        "s" => chrono::Duration::seconds(n),
        "m" => chrono::Duration::minutes(n),
        "h" => chrono::Duration::hours(n),
        "d" => chrono::Duration::days(n),
        _ => unreachable!(),
    };
    if duration.num_seconds() <= 0 {
        return Err(ArcanaError::configuration("duration must be positive"));
    }
    Ok(duration)
}

pub fn parse_bar_spec(spec: &str) -> Result<BarSpec> {
    let auto_re = Regex::new(r"^(tick|volume|dollar)_auto(?:_(\d+))?$").unwrap();
    if let Some(caps) = auto_re.captures(spec) {
        let bars_per_day = caps.get(2).map(|m| m.as_str().parse().unwrap());
        return Ok(match &caps[1] {
            "tick" => BarSpec::TickAuto(bars_per_day),
            "volume" => BarSpec::VolumeAuto(bars_per_day),
            "dollar" => BarSpec::DollarAuto(bars_per_day),
            _ => unreachable!(),
        });
    }

    let tick_re = Regex::new(r"^tick_(\d+)$").unwrap();
    if let Some(caps) = tick_re.captures(spec) {
        let n: u64 = caps[1].parse().map_err(|_| invalid(spec))?;
        return Ok(BarSpec::Tick(n));
    }

    let decimal_threshold_re = Regex::new(r"^(volume|dollar)_([0-9]+(?:\.[0-9]+)?)$").unwrap();
    if let Some(caps) = decimal_threshold_re.captures(spec) {
        let value = Decimal::from_str(&caps[2]).map_err(|_| invalid(spec))?;
        return Ok(match &caps[1] {
            "volume" => BarSpec::Volume(value),
            "dollar" => BarSpec::Dollar(value),
            _ => unreachable!(),
        });
    }

    let time_re = Regex::new(r"^time_(\d+[smhd])$").unwrap();
    if let Some(caps) = time_re.captures(spec) {
        let label = caps[1].to_string();
        let duration = parse_duration(&label)?;
        return Ok(BarSpec::Time(duration, label));
    }

    let info_re = Regex::new(r"^(tib|vib|dib|trb|vrb|drb)_(\d+)$").unwrap();
    if let Some(caps) = info_re.captures(spec) {
        let window: u32 = caps[2].parse().map_err(|_| invalid(spec))?;
        return Ok(match &caps[1] {
            "tib" => BarSpec::Imbalance(ImbalanceKind::Tick, window),
            "vib" => BarSpec::Imbalance(ImbalanceKind::Volume, window),
            "dib" => BarSpec::Imbalance(ImbalanceKind::Dollar, window),
            "trb" => BarSpec::Run(RunKind::Tick, window),
            "vrb" => BarSpec::Run(RunKind::Volume, window),
            "drb" => BarSpec::Run(RunKind::Dollar, window),
            _ => unreachable!(),
        });
    }

    Err(invalid(spec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_fixed_thresholds() {
        assert_eq!(parse_bar_spec("tick_500").unwrap(), BarSpec::Tick(500));
        assert_eq!(parse_bar_spec("volume_1.5").unwrap(), BarSpec::Volume(dec!(1.5)));
        assert_eq!(parse_bar_spec("dollar_200000").unwrap(), BarSpec::Dollar(dec!(200000)));
    }

    #[test]
    fn parses_auto_specs_with_and_without_override() {
        assert_eq!(parse_bar_spec("tick_auto").unwrap(), BarSpec::TickAuto(None));
        assert_eq!(parse_bar_spec("dollar_auto_25").unwrap(), BarSpec::DollarAuto(Some(25)));
    }

    #[test]
    fn parses_time_spec() {
        match parse_bar_spec("time_5m").unwrap() {
            BarSpec::Time(duration, label) => {
                assert_eq!(duration, chrono::Duration::minutes(5));
                assert_eq!(label, "5m");
            }
            _ => panic!("expected Time variant"),
        }
    }

    #[test]
    fn parses_imbalance_and_run_specs() {
        assert_eq!(
            parse_bar_spec("tib_20").unwrap(),
            BarSpec::Imbalance(ImbalanceKind::Tick, 20)
        );
        assert_eq!(parse_bar_spec("drb_15").unwrap(), BarSpec::Run(RunKind::Dollar, 15));
    }

    #[test]
    fn rejects_malformed_spec() {
        let err = parse_bar_spec("tick_abc").unwrap_err();
        assert!(err.to_string().contains("supported forms"));
    }
}
