//! ctrperf - Container Runtime Benchmarking Harness
//!
//! This library drives container engines through timed operations and turns
//! the measurements into comparative reports.
//!
//! # Features
//!
//! - Docker-compatible CLIs, `crictl` and the Docker Engine API as backends
//! - Warm-up, measured and concurrent runs with per-operation timeouts
//! - Cross-run analysis: engine comparison, scalability curves, anomalies
//! - Distribution statistics, histograms and reliability metrics
//!
//! # Architecture
//!
//! - **Benchmark**: probes and the runner that drives them
//! - **Models**: samples, summaries and run results
//! - **Analysis**: views computed over finished runs
//! - **Stats**: numeric routines shared by the layers above

pub mod analysis;
pub mod benchmark;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod stats;
pub mod utils;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types
pub use analysis::{Analysis, Analyzer, StatisticsReport};
pub use benchmark::{BenchmarkRunner, Probe};
pub use config::Config;
pub use error::{BenchError, BenchResult};
pub use models::{MetricSample, RunResult, Summary};
