//! Human-readable duration formatting for progress logs, matching
//! `original_source/src/arcana/pipeline.py`'s `_format_eta`.

pub fn format_eta(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{seconds:.0}s")
    } else if seconds < 3600.0 {
        format!("{:.1}m", seconds / 60.0)
    } else {
        let hours = (seconds / 3600.0) as u64;
        let minutes = ((seconds % 3600.0) / 60.0) as u64;
        format!("{hours}h {minutes}m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_seconds_minutes_and_hours() {
        assert_eq!(format_eta(45.0), "45s");
        assert_eq!(format_eta(150.0), "2.5m");
        assert_eq!(format_eta(7320.0), "2h 2m");
    }
}
