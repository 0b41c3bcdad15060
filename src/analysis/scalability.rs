//! Scalability analysis over concurrency sweeps
//!
//! Sweep points are recognized by name only: a run called
//! `{base}_concurrent_{N}` is the `base` test at concurrency `N`.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::models::RunResult;

use super::View;

static CONCURRENT_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<base>.+)_concurrent_(?P<n>\d+)$").expect("valid concurrent run pattern")
});

/// One engine's curve for one base test, ordered by ascending concurrency
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScalabilityCurve {
    pub concurrency: Vec<usize>,
    pub throughput: Vec<f64>,
    pub p95_latency: Vec<f64>,
    pub success_rate: Vec<f64>,
}

/// Curves keyed by base test name, then engine
pub type ScalabilityReport = BTreeMap<String, BTreeMap<String, ScalabilityCurve>>;

/// Split `{base}_concurrent_{N}` into its parts
pub fn parse_concurrent_name(name: &str) -> Option<(&str, usize)> {
    let caps = CONCURRENT_RUN.captures(name)?;
    let base = caps.name("base")?.as_str();
    let level = caps.name("n")?.as_str().parse().ok()?;
    Some((base, level))
}

/// Build throughput/latency curves from concurrency sweeps
pub fn analyze_scalability(results: &[RunResult]) -> View<ScalabilityReport> {
    let mut points: BTreeMap<&str, BTreeMap<&str, Vec<(usize, &RunResult)>>> = BTreeMap::new();
    for run in results {
        if let Some((base, level)) = parse_concurrent_name(&run.test_name) {
            points
                .entry(base)
                .or_default()
                .entry(run.engine_name.as_str())
                .or_default()
                .push((level, run));
        }
    }

    if points.is_empty() {
        return View::unavailable("No concurrent runs for scalability analysis");
    }

    let report = points
        .into_iter()
        .map(|(base, engines)| {
            let curves = engines
                .into_iter()
                .map(|(engine, mut runs)| {
                    runs.sort_by_key(|(level, _)| *level);
                    (engine.to_string(), curve(&runs))
                })
                .collect();
            (base.to_string(), curves)
        })
        .collect();

    View::Ready(report)
}

fn curve(runs: &[(usize, &RunResult)]) -> ScalabilityCurve {
    let mut curve = ScalabilityCurve::default();
    for (level, run) in runs {
        let summary = run.summary();
        curve.concurrency.push(*level);
        curve.throughput.push(summary.operations_per_second);
        curve.p95_latency.push(summary.p95_duration);
        curve.success_rate.push(summary.success_rate);
    }
    curve
}
