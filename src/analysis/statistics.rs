//! Statistics report
//!
//! A distribution-oriented companion to [`super::Analyzer`]: descriptive
//! statistics, distribution shape, engine similarity, reliability and
//! per-operation histograms. Warm-up samples are excluded throughout.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    constants::{HISTOGRAM_BINS, STRONG_SIMILARITY, WEAK_SIMILARITY},
    models::{MetricSample, RunResult},
    stats::{
        self, DistributionShape, Histogram, Outlier, Quartiles,
        outliers::{DEFAULT_Z_THRESHOLD, MIN_OUTLIER_SAMPLES},
    },
    utils::elapsed_secs,
};

use super::{View, throughput};

/// Descriptive statistics over successful durations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DurationSummary {
    pub mean: f64,
    pub median: f64,
    pub mode: f64,
    pub std_dev: f64,
    pub variance: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    pub quartiles: Quartiles,
    pub percentiles: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasicStatistics {
    pub total_operations: usize,
    pub successful_operations: usize,
    pub failed_operations: usize,
    pub success_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_stats: Option<DurationSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalityTest {
    pub test: &'static str,
    pub statistic: f64,
    pub note: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalFit {
    pub mu: f64,
    pub sigma: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionAnalysis {
    pub normality_test: NormalityTest,
    pub distribution_fits: BTreeMap<&'static str, NormalFit>,
    pub skewness: f64,
    /// Excess kurtosis
    pub kurtosis: f64,
    pub distribution_shape: DistributionShape,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineProfile {
    pub avg_duration: f64,
    pub success_rate: f64,
    pub throughput: f64,
}

impl EngineProfile {
    fn metrics(&self) -> [(&'static str, f64); 3] {
        [
            ("avg_duration", self.avg_duration),
            ("success_rate", self.success_rate),
            ("throughput", self.throughput),
        ]
    }
}

/// One engine pair whose similarity on a metric is notably high or low
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityEntry {
    pub engines: [String; 2],
    pub metric: &'static str,
    pub similarity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimilaritySummary {
    pub strong: Vec<SimilarityEntry>,
    pub weak: Vec<SimilarityEntry>,
    pub average: f64,
}

/// Engine similarity on aggregate metrics
///
/// Values are `1 - |a - b| / max(|a|, |b|)`. This is a closeness score, not a
/// statistical correlation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationAnalysis {
    pub engine_metrics: BTreeMap<String, EngineProfile>,
    pub similarity_matrix: BTreeMap<String, BTreeMap<String, BTreeMap<&'static str, f64>>>,
    pub similarity_summary: SimilaritySummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReliabilityMetrics {
    pub failure_rate: f64,
    pub availability: f64,
    /// Mean seconds between the starts of consecutive failures
    pub mtbf: f64,
    /// Total wall time per failure; a proxy, not a measured repair time
    pub mttr: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpreadStats {
    pub mean: f64,
    pub std_dev: f64,
    pub cv: f64,
    pub data_points: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationDistribution {
    pub histogram: Histogram,
    pub distribution_stats: SpreadStats,
    pub outliers: Vec<Outlier>,
}

/// The full statistics report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsReport {
    pub basic_statistics: BasicStatistics,
    pub distribution_analysis: View<DistributionAnalysis>,
    pub correlation_analysis: View<CorrelationAnalysis>,
    pub reliability_metrics: ReliabilityMetrics,
    pub performance_distribution: BTreeMap<String, OperationDistribution>,
}

impl StatisticsReport {
    pub fn compute(results: &[RunResult]) -> Self {
        let samples: Vec<&MetricSample> = results.iter().flat_map(|r| r.measured_samples()).collect();
        let successful: Vec<f64> = samples
            .iter()
            .filter(|s| s.success)
            .map(|s| s.duration)
            .collect();

        let report = Self {
            basic_statistics: basic_statistics(samples.len(), &successful),
            distribution_analysis: distribution_analysis(&successful),
            correlation_analysis: correlation_analysis(results),
            reliability_metrics: reliability_metrics(results),
            performance_distribution: performance_distribution(&samples),
        };

        tracing::debug!(
            operations = samples.len(),
            operation_kinds = report.performance_distribution.len(),
            "Statistics report computed"
        );

        report
    }
}

fn rate(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

fn basic_statistics(total: usize, successful: &[f64]) -> BasicStatistics {
    let duration_stats = stats::quartiles(successful).map(|quartiles| {
        let min = successful.iter().copied().fold(f64::INFINITY, f64::min);
        let max = successful.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        DurationSummary {
            mean: stats::mean(successful),
            median: stats::median(successful),
            mode: stats::mode(successful),
            std_dev: stats::std_dev(successful),
            variance: stats::variance(successful),
            min,
            max,
            range: max - min,
            quartiles,
            percentiles: stats::percentile_table(successful),
        }
    });

    BasicStatistics {
        total_operations: total,
        successful_operations: successful.len(),
        failed_operations: total - successful.len(),
        success_rate: rate(successful.len(), total),
        duration_stats,
    }
}

fn distribution_analysis(successful: &[f64]) -> View<DistributionAnalysis> {
    if successful.len() < 3 {
        return View::unavailable("Insufficient data for distribution analysis");
    }

    let skewness = stats::skewness(successful);
    let kurtosis = stats::excess_kurtosis(successful);

    View::Ready(DistributionAnalysis {
        normality_test: NormalityTest {
            test: "jarque_bera_proxy",
            statistic: stats::jarque_bera_proxy(successful.len(), skewness, kurtosis),
            note: "proxy only, no p-value; use for relative comparison",
        },
        distribution_fits: BTreeMap::from([(
            "normal",
            NormalFit {
                mu: stats::mean(successful),
                sigma: stats::std_dev(successful),
            },
        )]),
        skewness,
        kurtosis,
        distribution_shape: DistributionShape::classify(skewness, kurtosis),
    })
}

fn correlation_analysis(results: &[RunResult]) -> View<CorrelationAnalysis> {
    let mut by_engine: BTreeMap<&str, Vec<&MetricSample>> = BTreeMap::new();
    for run in results {
        by_engine
            .entry(run.engine_name.as_str())
            .or_default()
            .extend(run.measured_samples());
    }
    if by_engine.len() < 2 {
        return View::unavailable("Need at least 2 engines for correlation analysis");
    }

    let engine_metrics: BTreeMap<String, EngineProfile> = by_engine
        .into_iter()
        .filter_map(|(engine, samples)| {
            let durations: Vec<f64> = samples
                .iter()
                .filter(|s| s.success)
                .map(|s| s.duration)
                .collect();
            if durations.is_empty() {
                return None;
            }
            let profile = EngineProfile {
                avg_duration: stats::mean(&durations),
                success_rate: rate(durations.len(), samples.len()),
                throughput: throughput(&durations),
            };
            Some((engine.to_string(), profile))
        })
        .collect();

    let mut similarity_matrix: BTreeMap<String, BTreeMap<String, BTreeMap<&'static str, f64>>> =
        BTreeMap::new();
    let mut summary = SimilaritySummary::default();
    let mut total = 0.0;
    let mut count = 0usize;

    for (a, profile_a) in &engine_metrics {
        let row = similarity_matrix.entry(a.clone()).or_default();
        for (b, profile_b) in engine_metrics.iter().filter(|(b, _)| *b != a) {
            let mut cell = BTreeMap::new();
            for ((metric, x), (_, y)) in profile_a.metrics().into_iter().zip(profile_b.metrics()) {
                let value = stats::similarity(x, y);
                total += value;
                count += 1;

                let entry = || SimilarityEntry {
                    engines: [a.clone(), b.clone()],
                    metric,
                    similarity: value,
                };
                if value > STRONG_SIMILARITY {
                    summary.strong.push(entry());
                } else if value < WEAK_SIMILARITY {
                    summary.weak.push(entry());
                }
                cell.insert(metric, value);
            }
            row.insert(b.clone(), cell);
        }
    }
    if count > 0 {
        summary.average = total / count as f64;
    }

    View::Ready(CorrelationAnalysis {
        engine_metrics,
        similarity_matrix,
        similarity_summary: summary,
    })
}

fn reliability_metrics(results: &[RunResult]) -> ReliabilityMetrics {
    let samples: Vec<&MetricSample> = results.iter().flat_map(|r| r.measured_samples()).collect();
    let total = samples.len();
    let failed = samples.iter().filter(|s| !s.success).count();
    let wall_time: f64 = results.iter().map(RunResult::wall_time).sum();

    let mut failure_starts: Vec<_> = samples
        .iter()
        .filter(|s| !s.success)
        .map(|s| s.start_time)
        .collect();
    failure_starts.sort();
    let intervals: Vec<f64> = failure_starts
        .windows(2)
        .map(|pair| elapsed_secs(pair[0], pair[1]))
        .collect();

    ReliabilityMetrics {
        failure_rate: rate(failed, total),
        availability: rate(total - failed, total),
        mtbf: stats::mean(&intervals),
        mttr: if failed > 0 {
            wall_time / failed as f64
        } else {
            0.0
        },
    }
}

fn performance_distribution(samples: &[&MetricSample]) -> BTreeMap<String, OperationDistribution> {
    let mut by_operation: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for sample in samples {
        by_operation
            .entry(sample.operation.as_str())
            .or_default()
            .push(sample.duration);
    }

    by_operation
        .into_iter()
        .filter(|(_, durations)| durations.len() >= MIN_OUTLIER_SAMPLES)
        .filter_map(|(operation, durations)| {
            let histogram = Histogram::build(&durations, HISTOGRAM_BINS)?;
            let distribution = OperationDistribution {
                histogram,
                distribution_stats: SpreadStats {
                    mean: stats::mean(&durations),
                    std_dev: stats::std_dev(&durations),
                    cv: stats::coefficient_of_variation(&durations),
                    data_points: durations.len(),
                },
                outliers: stats::zscore_outliers(&durations, DEFAULT_Z_THRESHOLD),
            };
            Some((operation.to_string(), distribution))
        })
        .collect()
}
