//! Overall summary view

use serde::Serialize;

use crate::models::RunResult;

/// Counts across every run and every recorded sample
///
/// Operation counts include warm-up samples; they describe the load put on
/// the engines rather than the measurements.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OverallSummary {
    pub total_tests: usize,
    pub successful_tests: usize,
    pub failed_tests: usize,
    pub success_rate: f64,
    pub total_operations: usize,
    pub successful_operations: usize,
    pub operation_success_rate: f64,
    /// Summed wall time of all runs, in seconds
    pub total_duration: f64,
    pub avg_test_duration: f64,
}

impl OverallSummary {
    pub fn from_runs(results: &[RunResult]) -> Self {
        let total_tests = results.len();
        let successful_tests = results.iter().filter(|r| r.success()).count();

        let samples = results.iter().flat_map(|r| r.samples());
        let (total_operations, successful_operations) =
            samples.fold((0, 0), |(total, ok), s| (total + 1, ok + usize::from(s.success)));
        let total_duration: f64 = results.iter().map(RunResult::wall_time).sum();

        Self {
            total_tests,
            successful_tests,
            failed_tests: total_tests - successful_tests,
            success_rate: ratio(successful_tests, total_tests),
            total_operations,
            successful_operations,
            operation_success_rate: ratio(successful_operations, total_operations),
            total_duration,
            avg_test_duration: if total_tests > 0 {
                total_duration / total_tests as f64
            } else {
                0.0
            },
        }
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
