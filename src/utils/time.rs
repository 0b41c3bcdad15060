//! Time utilities

use chrono::{DateTime, Utc};

/// Seconds from `start` to `end`, clamped at zero
pub fn elapsed_secs(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start)
        .to_std()
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or(0.0)
}

/// Format a duration given in seconds as a human-readable string
pub fn format_duration_secs(secs: f64) -> String {
    if !secs.is_finite() || secs <= 0.0 {
        return "0s".to_string();
    }

    if secs < 1e-6 {
        format!("{:.0}ns", secs * 1e9)
    } else if secs < 1e-3 {
        format!("{:.2}µs", secs * 1e6)
    } else if secs < 1.0 {
        format!("{:.2}ms", secs * 1e3)
    } else if secs < 60.0 {
        format!("{:.2}s", secs)
    } else {
        let total = secs.round() as u64;
        let hours = total / 3600;
        let minutes = (total % 3600) / 60;
        let seconds = total % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else {
            format!("{}m {}s", minutes, seconds)
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    #[test]
    fn test_format_duration_secs() {
        assert_eq!(format_duration_secs(0.0), "0s");
        assert_eq!(format_duration_secs(f64::NAN), "0s");
        assert_eq!(format_duration_secs(250e-9), "250ns");
        assert_eq!(format_duration_secs(0.000_5), "500.00µs");
        assert_eq!(format_duration_secs(0.125), "125.00ms");
        assert_eq!(format_duration_secs(1.5), "1.50s");
        assert_eq!(format_duration_secs(65.0), "1m 5s");
        assert_eq!(format_duration_secs(3661.0), "1h 1m 1s");
    }

    #[test]
    fn test_elapsed_secs_never_negative() {
        let start = Utc::now();
        assert_eq!(elapsed_secs(start, start - TimeDelta::seconds(1)), 0.0);
        assert!((elapsed_secs(start, start + TimeDelta::milliseconds(1500)) - 1.5).abs() < 1e-9);
    }
}
