//! Operation probe capability
//!
//! A probe performs one timed backend operation per iteration. Operation
//! failures come back as `success = false` samples; an `Err` is reserved for
//! infrastructure failures and aborts the run (or the task, when concurrent).

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use crate::constants::RESOURCE_PREFIX;
use crate::error::BenchResult;
use crate::models::{ExecutorKind, MetricSample};

/// Identity of the backend a probe drives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeDescriptor {
    pub engine_name: String,
    pub executor_kind: ExecutorKind,
}

impl ProbeDescriptor {
    pub fn new(engine_name: impl Into<String>, executor_kind: ExecutorKind) -> Self {
        Self {
            engine_name: engine_name.into(),
            executor_kind,
        }
    }
}

/// Per-iteration context handed to a probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationContext {
    /// Test being run (e.g. "create_container")
    pub test_name: String,
    /// Zero-based index within the current phase
    pub iteration: usize,
    pub is_warmup: bool,
    /// Concurrent task index, `None` in sequential mode
    pub task_id: Option<usize>,
}

impl IterationContext {
    pub fn measured(test_name: impl Into<String>, iteration: usize) -> Self {
        Self {
            test_name: test_name.into(),
            iteration,
            is_warmup: false,
            task_id: None,
        }
    }

    pub fn warmup(test_name: impl Into<String>, iteration: usize) -> Self {
        Self {
            is_warmup: true,
            ..Self::measured(test_name, iteration)
        }
    }

    pub fn for_task(test_name: impl Into<String>, iteration: usize, task_id: usize) -> Self {
        Self {
            task_id: Some(task_id),
            ..Self::measured(test_name, iteration)
        }
    }
}

/// Backend adapter driven by the benchmark runner
///
/// `run_one_iteration` must be safe to call repeatedly and concurrently; each
/// call owns the resources it creates.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Probe: Send + Sync {
    /// Engine name and interface kind recorded on every run
    fn descriptor(&self) -> ProbeDescriptor;

    /// Check the backend is reachable and prepare shared state
    async fn setup(&self) -> BenchResult<()>;

    /// Release anything left behind; errors are logged by the caller
    async fn teardown(&self) -> BenchResult<()>;

    /// Perform one iteration of `ctx.test_name`
    async fn run_one_iteration(&self, ctx: &IterationContext) -> BenchResult<Vec<MetricSample>>;
}

/// Unique name for a container or pod created by the harness
pub fn resource_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{RESOURCE_PREFIX}{}", &id[..8])
}

/// Zero-length failed sample for an operation whose prerequisite failed
pub fn prerequisite_failed(operation: &str, reason: &str) -> MetricSample {
    let now = Utc::now();
    MetricSample::failed(operation, now, now, format!("container setup failed: {reason}"))
}

/// Render the message recorded for an operation that hit its time limit
pub fn timeout_message(limit: Duration) -> String {
    format!("timed out after {}s", limit.as_secs_f64())
}

/// Time a fallible operation under `limit`
///
/// Both an `Err` and an elapsed timeout become a failed sample; the value is
/// returned only on success.
pub async fn timed<T, E, F>(operation: &str, limit: Duration, fut: F) -> (MetricSample, Option<T>)
where
    E: Display,
    F: Future<Output = Result<T, E>>,
{
    let start = Utc::now();
    let clock = Instant::now();
    let outcome = tokio::time::timeout(limit, fut).await;
    let elapsed = clock.elapsed();

    match outcome {
        Ok(Ok(value)) => (MetricSample::spanning(operation, start, elapsed, None), Some(value)),
        Ok(Err(e)) => (
            MetricSample::spanning(operation, start, elapsed, Some(e.to_string())),
            None,
        ),
        Err(_) => (
            MetricSample::spanning(operation, start, elapsed, Some(timeout_message(limit))),
            None,
        ),
    }
}
