//! ctrperf - Application Entry Point
//!
//! Runs the configured test suite against every configured engine and prints
//! the results, the analysis and the statistics report as one JSON document.

use serde::Serialize;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use ctrperf::{
    Analysis, Analyzer, BenchmarkRunner, Config, RunResult, StatisticsReport,
    benchmark::build_probe,
};

/// Document written to stdout
#[derive(Serialize)]
struct Report<'a> {
    results: &'a [RunResult],
    analysis: Analysis,
    statistics: StatisticsReport,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Logs go to stderr; stdout carries the report
    let json_logs = config.log.json;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log.rust_log.clone().into()),
        )
        .with(json_logs.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json_logs).then(|| fmt::layer().with_writer(std::io::stderr)))
        .init();

    tracing::info!(
        engines = config.engines.len(),
        tests = config.suite.tests.len(),
        iterations = config.benchmark.iterations,
        "Starting ctrperf..."
    );

    let sweep: Vec<usize> = config
        .suite
        .concurrency_levels
        .iter()
        .map(|&level| level as usize)
        .collect();

    let mut results = Vec::new();
    for engine in &config.engines {
        let probe = match build_probe(engine, &config.suite.image) {
            Ok(probe) => probe,
            Err(e) => {
                tracing::error!(engine = %engine.name, error = %e, "Skipping engine");
                continue;
            }
        };

        let runner = BenchmarkRunner::new(probe, config.benchmark.clone()).with_progress(
            |phase, done, total| tracing::debug!(phase, done, total, "Progress"),
        );

        tracing::info!(engine = %engine.name, kind = %engine.kind, "Benchmarking engine");
        results.extend(runner.run_suite(&config.suite.tests).await);

        if sweep.len() > 1 {
            for test in &config.suite.tests {
                results.extend(runner.run_sweep(test, &sweep).await);
            }
        }
    }

    let analysis = Analyzer::new(config.analysis.clone()).analyze(&results);
    let statistics = StatisticsReport::compute(&results);

    let report = Report {
        results: &results,
        analysis,
        statistics,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    let failed = results.iter().filter(|r| !r.success()).count();
    tracing::info!(runs = results.len(), failed, "Benchmark session finished");

    Ok(())
}
