//! Duration anomaly detection

use serde::Serialize;

use crate::{
    constants::MIN_ANOMALY_RELATIVE_GAP,
    models::RunResult,
    stats::{self, MIN_OUTLIER_SAMPLES},
};

/// A successful measured sample far slower than its siblings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub test: String,
    pub engine: String,
    /// Position among the run's successful measured samples
    pub iteration: usize,
    pub duration: f64,
    pub mean_duration: f64,
    pub deviation_sigma: f64,
}

const OUTLIER_DURATION: &str = "outlier_duration";

/// Flag slow outliers in every run with enough successful samples
///
/// Each value is tested against the mean and standard deviation of the
/// *other* values in its run: it must exceed `mean + sigma * stdev` of
/// those values, beat their mean by at least [`MIN_ANOMALY_RELATIVE_GAP`],
/// and exceed the run mean. Reported `mean_duration` and `deviation_sigma`
/// use the whole run.
pub fn detect_anomalies(results: &[RunResult], sigma: f64) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();

    for run in results {
        let durations = run.successful_durations();
        if durations.len() < MIN_OUTLIER_SAMPLES {
            continue;
        }

        let mean = stats::mean(&durations);
        let std_dev = stats::std_dev(&durations);

        for (iteration, &duration) in durations.iter().enumerate() {
            if duration <= mean || !exceeds_others(&durations, iteration, sigma) {
                continue;
            }

            anomalies.push(Anomaly {
                kind: OUTLIER_DURATION,
                test: run.test_name.clone(),
                engine: run.engine_name.clone(),
                iteration,
                duration,
                mean_duration: mean,
                deviation_sigma: if std_dev > 0.0 {
                    (duration - mean) / std_dev
                } else {
                    0.0
                },
            });
        }
    }

    if !anomalies.is_empty() {
        tracing::debug!(count = anomalies.len(), "Duration anomalies detected");
    }
    anomalies
}

fn exceeds_others(durations: &[f64], index: usize, sigma: f64) -> bool {
    let others: Vec<f64> = durations
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .map(|(_, &d)| d)
        .collect();

    let value = durations[index];
    let others_mean = stats::mean(&others);
    value > others_mean + sigma * stats::std_dev(&others)
        && value > others_mean * (1.0 + MIN_ANOMALY_RELATIVE_GAP)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{base_time, measured, run_of, run_with};

    #[test]
    fn test_flags_single_extreme_value() {
        let results = vec![run_of("create_container", "docker", &[1.0, 1.0, 1.0, 1.0, 1.0, 100.0])];

        let anomalies = detect_anomalies(&results, 3.0);

        assert_eq!(anomalies.len(), 1);
        let anomaly = &anomalies[0];
        assert_eq!(anomaly.iteration, 5);
        assert_eq!(anomaly.duration, 100.0);
        assert!((anomaly.mean_duration - 17.5).abs() < 1e-9);
        assert!(anomaly.deviation_sigma > 2.0);
        assert_eq!(serde_json::to_value(anomaly).unwrap()["type"], "outlier_duration");
    }

    #[test]
    fn test_three_equal_values_report_nothing() {
        let results = vec![run_of("create_container", "docker", &[1.0, 1.0, 1.0])];
        assert!(detect_anomalies(&results, 3.0).is_empty());
    }

    #[test]
    fn test_fewer_than_three_successes_are_skipped() {
        let results = vec![run_with(
            "create_container",
            "docker",
            base_time(),
            vec![measured(1.0, true), measured(50.0, true), measured(0.1, false)],
        )];
        assert!(detect_anomalies(&results, 3.0).is_empty());
    }

    #[test]
    fn test_fast_values_are_never_flagged() {
        let results = vec![run_of("create_container", "docker", &[10.0, 10.0, 10.0, 10.0, 0.01])];
        assert!(detect_anomalies(&results, 3.0).is_empty());
    }

    #[test]
    fn test_jitter_over_flat_background_is_not_flagged() {
        let results = vec![run_of("list_images", "docker", &[0.100, 0.100, 0.100, 0.101])];
        assert!(detect_anomalies(&results, 3.0).is_empty());
    }

    #[test]
    fn test_clear_gap_over_flat_background_is_flagged() {
        let results = vec![run_of("list_images", "docker", &[0.1, 0.1, 0.1, 0.2])];

        let anomalies = detect_anomalies(&results, 3.0);

        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].iteration, 3);
    }

    #[test]
    fn test_sigma_is_configurable() {
        let results = vec![run_of("logs", "docker", &[1.0, 2.0, 3.0, 4.0, 6.0])];

        assert!(detect_anomalies(&results, 3.0).is_empty());
        assert_eq!(detect_anomalies(&results, 1.0).len(), 1);
    }
}
