//! Performance insights: bottlenecks, recommendations and trends

use serde::Serialize;

use crate::{
    config::AnalysisConfig,
    constants::HIGH_SEVERITY_THRESHOLD_SECONDS,
    models::RunResult,
    stats,
};

use super::pooled_durations;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

/// A run whose successful operations are slow on average
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bottleneck {
    pub test: String,
    pub engine: String,
    pub avg_duration: f64,
    pub severity: Severity,
}

/// Change in average duration between the first and second half of a session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trend {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub description: String,
    /// Negative is an improvement
    pub change_percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceInsights {
    pub bottlenecks: Vec<Bottleneck>,
    pub recommendations: Vec<String>,
    pub trends: Vec<Trend>,
}

const PERFORMANCE_TREND: &str = "performance_trend";

pub fn generate_insights(results: &[RunResult], config: &AnalysisConfig) -> PerformanceInsights {
    let bottlenecks = find_bottlenecks(results, config.bottleneck_threshold_secs);
    let trends = detect_trend(results, config.trend_threshold)
        .into_iter()
        .collect();
    let recommendations = recommend(results, &bottlenecks);

    PerformanceInsights {
        bottlenecks,
        recommendations,
        trends,
    }
}

/// Runs whose successful average exceeds `threshold` seconds
pub fn find_bottlenecks(results: &[RunResult], threshold: f64) -> Vec<Bottleneck> {
    results
        .iter()
        .filter_map(|run| {
            let durations = run.successful_durations();
            if durations.is_empty() {
                return None;
            }
            let avg_duration = stats::mean(&durations);
            (avg_duration > threshold).then(|| Bottleneck {
                test: run.test_name.clone(),
                engine: run.engine_name.clone(),
                avg_duration,
                severity: if avg_duration > HIGH_SEVERITY_THRESHOLD_SECONDS {
                    Severity::High
                } else {
                    Severity::Medium
                },
            })
        })
        .collect()
}

/// Compare the two halves of the session ordered by start time
///
/// Needs at least two runs with successful samples on both sides; reports
/// only when the relative change exceeds `threshold`.
pub fn detect_trend(results: &[RunResult], threshold: f64) -> Option<Trend> {
    if results.len() < 2 {
        return None;
    }

    let mut ordered: Vec<&RunResult> = results.iter().collect();
    ordered.sort_by_key(|run| run.start_time);
    let (first, second) = ordered.split_at(ordered.len() / 2);

    let first_avg = stats::mean(&pooled_durations(first.iter().copied()));
    let second_avg = stats::mean(&pooled_durations(second.iter().copied()));
    if first_avg <= 0.0 || second_avg <= 0.0 {
        return None;
    }

    let change = (second_avg - first_avg) / first_avg;
    if change.abs() <= threshold {
        return None;
    }

    let direction = if change < 0.0 { "improved" } else { "degraded" };
    Some(Trend {
        kind: PERFORMANCE_TREND,
        description: format!("Performance {direction} by {:.1}%", change.abs() * 100.0),
        change_percent: change * 100.0,
    })
}

fn recommend(results: &[RunResult], bottlenecks: &[Bottleneck]) -> Vec<String> {
    let mut recommendations = Vec::new();

    if !bottlenecks.is_empty() {
        recommendations
            .push("Consider optimizing slow operations identified in bottlenecks".to_string());
    }
    if bottlenecks.iter().any(|b| b.severity == Severity::High) {
        recommendations.push(format!(
            "Operations averaging over {HIGH_SEVERITY_THRESHOLD_SECONDS}s may be hitting image pulls or storage limits; check engine configuration"
        ));
    }

    let failed = results.iter().filter(|run| !run.success()).count();
    if failed > 0 {
        recommendations.push(format!(
            "Investigate failed runs: {failed} of {} did not succeed",
            results.len()
        ));
    }

    recommendations
}
