//! Metrics collection and run aggregation

use crate::models::{MetricSample, Summary};
use crate::stats::percentile_sorted;

/// Append-only sample buffer filled while a run is in progress
#[derive(Debug, Default)]
pub struct MetricsCollector {
    samples: Vec<MetricSample>,
}

impl MetricsCollector {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the samples of one iteration, in order
    pub fn record(&mut self, samples: impl IntoIterator<Item = MetricSample>) {
        self.samples.extend(samples);
    }

    /// Append warm-up samples, tagging each one
    pub fn record_warmup(&mut self, samples: impl IntoIterator<Item = MetricSample>) {
        self.samples
            .extend(samples.into_iter().map(MetricSample::into_warmup));
    }

    /// Number of samples recorded so far, warm-up included
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Summary of what has been recorded so far
    pub fn summary(&self) -> Summary {
        summarize(&self.samples)
    }

    /// Freeze the collected samples
    pub fn into_samples(self) -> Vec<MetricSample> {
        self.samples
    }
}

/// Reduce a sample set to its [`Summary`]
///
/// Warm-up samples are dropped first. With no measured samples the result is
/// the all-zero summary. Duration statistics cover every measured sample,
/// failed ones included, and throughput is `count / sum(durations)`, or 0
/// when the durations add up to zero.
pub fn summarize(samples: &[MetricSample]) -> Summary {
    let measured: Vec<&MetricSample> = samples.iter().filter(|s| s.is_measured()).collect();
    if measured.is_empty() {
        return Summary::default();
    }

    let total = measured.len();
    let successful = measured.iter().filter(|s| s.success).count();

    let mut durations: Vec<f64> = measured.iter().map(|s| s.duration).collect();
    durations.sort_by(f64::total_cmp);

    let total_time: f64 = durations.iter().sum();
    let operations_per_second = if total_time > 0.0 {
        total as f64 / total_time
    } else {
        0.0
    };

    Summary {
        total_iterations: total,
        successful_iterations: successful,
        failed_iterations: total - successful,
        success_rate: successful as f64 / total as f64,
        avg_duration: total_time / total as f64,
        min_duration: durations[0],
        max_duration: durations[total - 1],
        p50_duration: percentile_sorted(&durations, 50.0),
        p95_duration: percentile_sorted(&durations, 95.0),
        p99_duration: percentile_sorted(&durations, 99.0),
        total_time,
        operations_per_second,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{measured, warmup};

    #[test]
    fn test_warmup_excluded_from_totals() {
        let mut collector = MetricsCollector::new();
        collector.record_warmup(vec![measured(9.0, true), measured(9.0, false)]);
        collector.record((0..4).map(|i| measured(0.1 * f64::from(i + 1), true)));

        let summary = collector.summary();
        assert_eq!(collector.sample_count(), 6);
        assert_eq!(summary.total_iterations, 4);
        assert_eq!(summary.failed_iterations, 0);
        assert!((summary.max_duration - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_summary_fields() {
        let samples = vec![
            measured(0.2, true),
            measured(0.1, true),
            measured(0.4, false),
            measured(0.3, true),
        ];
        let summary = summarize(&samples);

        assert_eq!(summary.total_iterations, 4);
        assert_eq!(summary.successful_iterations, 3);
        assert_eq!(summary.failed_iterations, 1);
        assert!((summary.success_rate - 0.75).abs() < 1e-9);
        assert!((summary.avg_duration - 0.25).abs() < 1e-9);
        assert_eq!(summary.min_duration, 0.1);
        assert_eq!(summary.max_duration, 0.4);
        assert_eq!(summary.p50_duration, 0.3);
        assert_eq!(summary.p95_duration, 0.4);
        assert!((summary.total_time - 1.0).abs() < 1e-9);
        assert!((summary.operations_per_second - 4.0).abs() < 1e-9);
        assert!(summary.p50_duration <= summary.p95_duration);
        assert!(summary.p95_duration <= summary.p99_duration);
    }

    #[test]
    fn test_empty_and_zero_duration() {
        assert!(summarize(&[]).is_empty());
        assert!(summarize(&[warmup(1.0)]).is_empty());

        let instant = summarize(&[measured(0.0, true), measured(0.0, true)]);
        assert_eq!(instant.total_iterations, 2);
        assert_eq!(instant.operations_per_second, 0.0);
    }
}
