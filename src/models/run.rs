//! Run result model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::benchmark::summarize;
use crate::utils::time::elapsed_secs;

use super::{MetricSample, Summary};

/// Interface through which a backend is driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    /// Container Runtime Interface via `crictl`
    Cri,
    /// Docker-compatible command line client
    Client,
    /// Docker Engine HTTP API
    Api,
}

impl ExecutorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutorKind::Cri => "cri",
            ExecutorKind::Client => "client",
            ExecutorKind::Api => "api",
        }
    }
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cri" => Ok(ExecutorKind::Cri),
            "client" | "cli" => Ok(ExecutorKind::Client),
            "api" => Ok(ExecutorKind::Api),
            other => Err(format!("unknown executor kind: {other}")),
        }
    }
}

/// Result of running one named test against one engine
///
/// The summary and the success flag are computed once, when the result is
/// built, from the frozen sample list. Deserialization recomputes them too.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "RunResultRecord")]
pub struct RunResult {
    pub test_name: String,
    pub engine_name: String,
    pub executor_kind: ExecutorKind,
    samples: Vec<MetricSample>,
    summary: Summary,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl RunResult {
    /// Freeze a run. `error_message` carries the fatal error, if any.
    pub fn new(
        test_name: impl Into<String>,
        engine_name: impl Into<String>,
        executor_kind: ExecutorKind,
        samples: Vec<MetricSample>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        error_message: Option<String>,
    ) -> Self {
        let summary = summarize(&samples);
        // No measured data counts as a failed run
        let success =
            error_message.is_none() && !summary.is_empty() && summary.failed_iterations == 0;

        Self {
            test_name: test_name.into(),
            engine_name: engine_name.into(),
            executor_kind,
            samples,
            summary,
            start_time,
            end_time,
            success,
            error_message,
        }
    }

    pub fn samples(&self) -> &[MetricSample] {
        &self.samples
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    pub fn success(&self) -> bool {
        self.success
    }

    /// Samples that count toward statistics
    pub fn measured_samples(&self) -> impl Iterator<Item = &MetricSample> {
        self.samples.iter().filter(|s| s.is_measured())
    }

    /// Durations of successful measured samples, in recording order
    pub fn successful_durations(&self) -> Vec<f64> {
        self.measured_samples()
            .filter(|s| s.success)
            .map(|s| s.duration)
            .collect()
    }

    /// Wall-clock length of the run in seconds
    pub fn wall_time(&self) -> f64 {
        elapsed_secs(self.start_time, self.end_time)
    }
}

/// Serialized form of a run; derived fields are ignored on input
#[derive(Deserialize)]
struct RunResultRecord {
    test_name: String,
    engine_name: String,
    executor_kind: ExecutorKind,
    #[serde(default)]
    samples: Vec<MetricSample>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    #[serde(default)]
    error_message: Option<String>,
}

impl From<RunResultRecord> for RunResult {
    fn from(record: RunResultRecord) -> Self {
        RunResult::new(
            record.test_name,
            record.engine_name,
            record.executor_kind,
            record.samples,
            record.start_time,
            record.end_time,
            record.error_message,
        )
    }
}
