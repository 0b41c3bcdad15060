//! Builders shared by unit tests

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};

use crate::benchmark::probe::{IterationContext, MockProbe, Probe, ProbeDescriptor};
use crate::error::BenchResult;
use crate::models::{ExecutorKind, MetricSample, RunResult};

/// Fixed reference instant so timestamps are reproducible
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// A measured `create_container` sample of `secs` length
pub fn measured(secs: f64, success: bool) -> MetricSample {
    MetricSample::from_duration("create_container", base_time(), secs, success)
}

/// A successful warm-up sample
pub fn warmup(secs: f64) -> MetricSample {
    measured(secs, true).into_warmup()
}

/// A successful sample of `operation`
pub fn op_sample(operation: &str, secs: f64, success: bool) -> MetricSample {
    MetricSample::from_duration(operation, base_time(), secs, success)
}

/// Run of successful samples starting `offset_secs` after [`base_time`]
pub fn run_started_at(test: &str, engine: &str, offset_secs: i64, durations: &[f64]) -> RunResult {
    let start = base_time() + TimeDelta::seconds(offset_secs);
    let samples = durations
        .iter()
        .map(|&secs| MetricSample::from_duration(test, start, secs, true))
        .collect();
    run_with(test, engine, start, samples)
}

/// Run of successful samples starting at [`base_time`]
pub fn run_of(test: &str, engine: &str, durations: &[f64]) -> RunResult {
    run_started_at(test, engine, 0, durations)
}

/// Run with explicit samples
pub fn run_with(
    test: &str,
    engine: &str,
    start: DateTime<Utc>,
    samples: Vec<MetricSample>,
) -> RunResult {
    let total: f64 = samples.iter().map(|s| s.duration).sum();
    let end = start + TimeDelta::milliseconds((total * 1000.0).round() as i64);
    RunResult::new(test, engine, ExecutorKind::Client, samples, start, end, None)
}

/// Mock probe answering `descriptor()` for `engine`
pub fn mock_probe(engine: &str) -> MockProbe {
    let descriptor = ProbeDescriptor::new(engine, ExecutorKind::Client);
    let mut probe = MockProbe::new();
    probe
        .expect_descriptor()
        .returning(move || descriptor.clone());
    probe
}

/// Hand-written probe for behaviour mocks cannot express (delays, panics)
pub struct ScriptedProbe {
    descriptor: ProbeDescriptor,
    duration: f64,
    setup_delay: Option<Duration>,
    panic_on_task: Option<usize>,
}

impl ScriptedProbe {
    pub fn new(engine: &str) -> Self {
        Self {
            descriptor: ProbeDescriptor::new(engine, ExecutorKind::Client),
            duration: 0.01,
            setup_delay: None,
            panic_on_task: None,
        }
    }

    pub fn setup_delay(mut self, delay: Duration) -> Self {
        self.setup_delay = Some(delay);
        self
    }

    pub fn panic_on_task(mut self, task_id: usize) -> Self {
        self.panic_on_task = Some(task_id);
        self
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    fn descriptor(&self) -> ProbeDescriptor {
        self.descriptor.clone()
    }

    async fn setup(&self) -> BenchResult<()> {
        if let Some(delay) = self.setup_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn teardown(&self) -> BenchResult<()> {
        Ok(())
    }

    async fn run_one_iteration(&self, ctx: &IterationContext) -> BenchResult<Vec<MetricSample>> {
        if ctx.task_id.is_some() && ctx.task_id == self.panic_on_task {
            panic!("scripted failure in task {:?}", ctx.task_id);
        }
        Ok(vec![MetricSample::from_duration(
            &ctx.test_name,
            Utc::now(),
            self.duration,
            true,
        )])
    }
}
