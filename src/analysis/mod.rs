//! Cross-run analysis
//!
//! The [`Analyzer`] turns a batch of [`RunResult`]s into one JSON-serializable
//! [`Analysis`], one field per view. Views that lack the data they need carry
//! an explicit `{"error": reason}` marker instead of failing the whole report.
//! [`StatisticsReport`] is a second, distribution-oriented pass over the same
//! input.

pub mod anomalies;
pub mod comparison;
pub mod insights;
pub mod overview;
pub mod scalability;
pub mod statistics;
pub mod test_groups;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{config::AnalysisConfig, models::RunResult};

pub use anomalies::{Anomaly, detect_anomalies};
pub use comparison::{EngineComparison, EngineMetrics, Finding, RelativePerformance, TestComparison};
pub use insights::{Bottleneck, PerformanceInsights, Severity, Trend};
pub use overview::OverallSummary;
pub use scalability::{ScalabilityCurve, ScalabilityReport};
pub use statistics::StatisticsReport;
pub use test_groups::{DurationStats, EngineBreakdown, TestAnalysis};

/// Either a computed view or the reason it could not be computed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum View<T> {
    Ready(T),
    Unavailable { error: String },
}

impl<T> View<T> {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        View::Unavailable {
            error: reason.into(),
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            View::Ready(value) => Some(value),
            View::Unavailable { .. } => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, View::Ready(_))
    }
}

/// Every analysis view, keyed the way it is serialized
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub summary: OverallSummary,
    pub test_analysis: BTreeMap<String, View<TestAnalysis>>,
    pub engine_comparison: View<EngineComparison>,
    pub scalability: View<ScalabilityReport>,
    pub anomalies: Vec<Anomaly>,
    pub performance_insights: PerformanceInsights,
    pub top_findings: Vec<Finding>,
}

/// Stateless analyzer; thresholds come from [`AnalysisConfig`]
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Compute every view over `results`; the input is never modified
    pub fn analyze(&self, results: &[RunResult]) -> Analysis {
        let engine_comparison =
            comparison::compare_engines(results, self.config.baseline_engine.as_deref());
        let top_findings = match &engine_comparison {
            View::Ready(tests) => comparison::top_findings(tests, self.config.top_findings_limit),
            View::Unavailable { .. } => Vec::new(),
        };

        let analysis = Analysis {
            summary: OverallSummary::from_runs(results),
            test_analysis: test_groups::analyze_tests(results),
            engine_comparison,
            scalability: scalability::analyze_scalability(results),
            anomalies: detect_anomalies(results, self.config.anomaly_sigma),
            performance_insights: insights::generate_insights(results, &self.config),
            top_findings,
        };

        tracing::info!(
            runs = results.len(),
            tests = analysis.test_analysis.len(),
            anomalies = analysis.anomalies.len(),
            findings = analysis.top_findings.len(),
            "Analysis complete"
        );

        analysis
    }
}

/// Group runs by a key, keeping input order within each group
fn group_by<'a, I, F>(results: I, key: F) -> BTreeMap<&'a str, Vec<&'a RunResult>>
where
    I: IntoIterator<Item = &'a RunResult>,
    F: Fn(&'a RunResult) -> &'a str,
{
    let mut groups: BTreeMap<&str, Vec<&RunResult>> = BTreeMap::new();
    for run in results {
        groups.entry(key(run)).or_default().push(run);
    }
    groups
}

/// Successful measured durations pooled across `runs`
fn pooled_durations<'a>(runs: impl IntoIterator<Item = &'a RunResult>) -> Vec<f64> {
    runs.into_iter()
        .flat_map(|run| run.successful_durations())
        .collect()
}

/// Successful operations per second of busy time, 0 when there is none
fn throughput(durations: &[f64]) -> f64 {
    let total: f64 = durations.iter().sum();
    if total > 0.0 {
        durations.len() as f64 / total
    } else {
        0.0
    }
}
