//! Per-test analysis view

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    constants::MAX_FAILURE_SAMPLES,
    models::{MetricSample, RunResult},
    stats::{self, Quartiles},
};

use super::{View, group_by, throughput};

/// Distribution of one test's pooled successful durations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DurationStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub cv: f64,
    pub quartiles: Quartiles,
    pub percentiles: BTreeMap<String, f64>,
    pub operations_per_second: f64,
}

impl DurationStats {
    fn compute(durations: &[f64]) -> Option<Self> {
        let quartiles = stats::quartiles(durations)?;

        Some(Self {
            count: durations.len(),
            mean: stats::mean(durations),
            median: stats::median(durations),
            std_dev: stats::std_dev(durations),
            min: durations.iter().copied().fold(f64::INFINITY, f64::min),
            max: durations.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            cv: stats::coefficient_of_variation(durations),
            quartiles,
            percentiles: stats::percentile_table(durations),
            operations_per_second: throughput(durations),
        })
    }
}

/// One engine's share of a test
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineBreakdown {
    pub operation_count: usize,
    pub successful_count: usize,
    pub failed_count: usize,
    pub success_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operations_per_second: Option<f64>,
    /// First few distinct failure messages
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failure_samples: Vec<String>,
}

impl EngineBreakdown {
    fn from_samples(samples: &[&MetricSample]) -> Self {
        let durations: Vec<f64> = samples
            .iter()
            .filter(|s| s.success)
            .map(|s| s.duration)
            .collect();

        let mut failure_samples: Vec<String> = Vec::new();
        for message in samples.iter().filter_map(|s| s.error_message.as_deref()) {
            if failure_samples.len() == MAX_FAILURE_SAMPLES {
                break;
            }
            if !failure_samples.iter().any(|m| m == message) {
                failure_samples.push(message.to_string());
            }
        }

        let operation_count = samples.len();
        let successful_count = durations.len();
        let has_data = !durations.is_empty();

        Self {
            operation_count,
            successful_count,
            failed_count: operation_count - successful_count,
            success_rate: if operation_count > 0 {
                successful_count as f64 / operation_count as f64
            } else {
                0.0
            },
            avg_duration: has_data.then(|| stats::mean(&durations)),
            operations_per_second: has_data.then(|| throughput(&durations)),
            failure_samples,
        }
    }
}

/// Every run sharing one test name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestAnalysis {
    pub run_count: usize,
    pub total_operations: usize,
    pub successful_operations: usize,
    pub success_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub durations: Option<DurationStats>,
    pub engines: BTreeMap<String, EngineBreakdown>,
}

/// Analyze each test name over its measured samples
pub fn analyze_tests(results: &[RunResult]) -> BTreeMap<String, View<TestAnalysis>> {
    group_by(results, |r| r.test_name.as_str())
        .into_iter()
        .map(|(test, runs)| (test.to_string(), analyze_group(&runs)))
        .collect()
}

fn analyze_group(runs: &[&RunResult]) -> View<TestAnalysis> {
    let samples: Vec<&MetricSample> = runs.iter().flat_map(|r| r.measured_samples()).collect();
    if samples.is_empty() {
        return View::unavailable("No metrics available");
    }

    let durations: Vec<f64> = samples
        .iter()
        .filter(|s| s.success)
        .map(|s| s.duration)
        .collect();

    let mut by_engine: BTreeMap<&str, Vec<&MetricSample>> = BTreeMap::new();
    for run in runs {
        by_engine
            .entry(run.engine_name.as_str())
            .or_default()
            .extend(run.measured_samples());
    }

    View::Ready(TestAnalysis {
        run_count: runs.len(),
        total_operations: samples.len(),
        successful_operations: durations.len(),
        success_rate: durations.len() as f64 / samples.len() as f64,
        durations: DurationStats::compute(&durations),
        engines: by_engine
            .into_iter()
            .map(|(engine, samples)| (engine.to_string(), EngineBreakdown::from_samples(&samples)))
            .collect(),
    })
}
