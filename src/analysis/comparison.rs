//! Engine comparison and top findings

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{models::RunResult, stats};

use super::{View, group_by, pooled_durations, throughput};

/// Per-test comparisons, keyed by test name
pub type EngineComparison = BTreeMap<String, View<TestComparison>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineMetrics {
    pub avg_duration: f64,
    pub operations_per_second: f64,
    pub success_rate: f64,
}

/// How one engine compares with the baseline on one test
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RelativePerformance {
    /// `avg / baseline_avg`; above 1 means slower
    pub relative_duration: f64,
    /// `baseline_avg / avg`; above 1 means faster
    pub performance_ratio: f64,
    pub is_faster: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestComparison {
    pub baseline_engine: String,
    pub engine_metrics: BTreeMap<String, EngineMetrics>,
    /// Every compared engine except the baseline
    pub relative_performance: BTreeMap<String, RelativePerformance>,
}

/// A relative-performance entry promoted to the report headline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub test: String,
    pub engine: String,
    pub baseline_engine: String,
    pub performance_ratio: f64,
    pub relative_duration: f64,
    pub is_faster: bool,
    pub description: String,
}

/// Compare engines test by test
///
/// `baseline` wins whenever it has data for a test; otherwise the engine with
/// the lowest average duration is the baseline.
pub fn compare_engines(results: &[RunResult], baseline: Option<&str>) -> View<EngineComparison> {
    let by_engine = group_by(results, |r| r.engine_name.as_str());
    if by_engine.len() < 2 {
        return View::unavailable("Need at least 2 engines for comparison");
    }

    let comparison = group_by(results, |r| r.test_name.as_str())
        .into_iter()
        .map(|(test, runs)| (test.to_string(), compare_test(&runs, baseline)))
        .collect();

    View::Ready(comparison)
}

fn compare_test(runs: &[&RunResult], baseline: Option<&str>) -> View<TestComparison> {
    let mut engine_metrics = BTreeMap::new();
    for (engine, engine_runs) in group_by(runs.iter().copied(), |r| r.engine_name.as_str()) {
        let durations = pooled_durations(engine_runs.iter().copied());
        if durations.is_empty() {
            continue;
        }
        let measured: usize = engine_runs.iter().map(|r| r.measured_samples().count()).sum();

        engine_metrics.insert(
            engine.to_string(),
            EngineMetrics {
                avg_duration: stats::mean(&durations),
                operations_per_second: throughput(&durations),
                success_rate: durations.len() as f64 / measured as f64,
            },
        );
    }

    if engine_metrics.len() < 2 {
        return View::unavailable("Insufficient data for comparison");
    }
    // ratios against a zero average are undefined
    if engine_metrics.values().any(|m| m.avg_duration <= 0.0) {
        return View::unavailable("Zero average duration, ratios undefined");
    }

    let baseline_engine = match baseline.filter(|name| engine_metrics.contains_key(*name)) {
        Some(name) => name.to_string(),
        None => match engine_metrics
            .iter()
            .min_by(|a, b| a.1.avg_duration.total_cmp(&b.1.avg_duration))
        {
            Some((name, _)) => name.clone(),
            None => return View::unavailable("Insufficient data for comparison"),
        },
    };
    let baseline_avg = engine_metrics[&baseline_engine].avg_duration;

    let relative_performance = engine_metrics
        .iter()
        .filter(|(name, _)| **name != baseline_engine)
        .map(|(name, metrics)| {
            (
                name.clone(),
                RelativePerformance {
                    relative_duration: metrics.avg_duration / baseline_avg,
                    performance_ratio: baseline_avg / metrics.avg_duration,
                    is_faster: metrics.avg_duration < baseline_avg,
                },
            )
        })
        .collect();

    View::Ready(TestComparison {
        baseline_engine,
        engine_metrics,
        relative_performance,
    })
}

/// Largest departures from the baseline across all tests, at most `limit`
pub fn top_findings(comparison: &EngineComparison, limit: usize) -> Vec<Finding> {
    let mut findings: Vec<Finding> = comparison
        .iter()
        .filter_map(|(test, view)| view.ready().map(|c| (test, c)))
        .flat_map(|(test, c)| {
            c.relative_performance
                .iter()
                .map(move |(engine, rel)| finding(test, engine, &c.baseline_engine, rel))
        })
        .collect();

    findings.sort_by(|a, b| {
        let da = (a.performance_ratio - 1.0).abs();
        let db = (b.performance_ratio - 1.0).abs();
        db.total_cmp(&da)
    });
    findings.truncate(limit);
    findings
}

fn finding(test: &str, engine: &str, baseline: &str, rel: &RelativePerformance) -> Finding {
    let description = if rel.is_faster {
        format!(
            "{engine} is {:.2}x faster than {baseline} on {test}",
            rel.performance_ratio
        )
    } else if rel.relative_duration > 1.0 {
        format!(
            "{engine} is {:.2}x slower than {baseline} on {test}",
            rel.relative_duration
        )
    } else {
        format!("{engine} matches {baseline} on {test}")
    };

    Finding {
        test: test.to_string(),
        engine: engine.to_string(),
        baseline_engine: baseline.to_string(),
        performance_ratio: rel.performance_ratio,
        relative_duration: rel.relative_duration,
        is_faster: rel.is_faster,
        description,
    }
}
