//! Benchmark runner - Orchestrates warm-up, measured and concurrent iterations
//!
//! A runner owns one probe and one [`BenchmarkConfig`]. Every entry point
//! returns a frozen [`RunResult`]; errors raised by the probe are caught at
//! the run boundary and surfaced as the result's `error_message`.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::{
    config::BenchmarkConfig,
    constants::CONCURRENT_MARKER,
    error::{BenchError, BenchResult},
    models::{MetricSample, RunResult},
    utils::time::format_duration_secs,
};

use super::metrics::MetricsCollector;
use super::probe::{IterationContext, Probe, ProbeDescriptor};

/// Progress hook invoked as `(phase, done, total)` after each iteration
pub type ProgressCallback = Arc<dyn Fn(&str, usize, usize) + Send + Sync>;

/// Name under which a concurrent run is recorded
pub fn concurrent_test_name(test_name: &str, concurrency: usize) -> String {
    format!("{test_name}{CONCURRENT_MARKER}{concurrency}")
}

/// Benchmark runner driving one probe
pub struct BenchmarkRunner {
    probe: Arc<dyn Probe>,
    config: BenchmarkConfig,
    progress: Option<ProgressCallback>,
}

impl BenchmarkRunner {
    /// Create a new benchmark runner
    pub fn new(probe: Arc<dyn Probe>, config: BenchmarkConfig) -> Self {
        Self {
            probe,
            config,
            progress: None,
        }
    }

    /// Report iteration progress through `callback`
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, usize, usize) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    /// Run one test with the configured mode
    ///
    /// A concurrency above one delegates to [`Self::run_concurrent_test`].
    /// A probe that panics ends the run like one that returns an error.
    pub async fn run_test(&self, test_name: &str) -> RunResult {
        if self.config.concurrency > 1 {
            return self
                .run_concurrent_test(test_name, self.config.concurrency as usize)
                .await;
        }

        let descriptor = self.probe.descriptor();
        let start = Utc::now();
        info!(
            test = %test_name,
            engine = %descriptor.engine_name,
            executor = %descriptor.executor_kind,
            iterations = self.config.iterations,
            warmup = self.config.warmup_iterations,
            duration_hint = %format_duration_secs(self.config.duration_hint().as_secs_f64()),
            "Starting benchmark"
        );

        if let Err(e) = guarded(self.setup()).await {
            self.log_setup_failure(test_name, &descriptor, &e);
            self.teardown(test_name).await;
            return self.finish(test_name, &descriptor, Vec::new(), start, Some(e.to_string()));
        }

        let mut collector = MetricsCollector::new();
        let outcome = guarded(self.run_sequential(test_name, &mut collector)).await;
        self.teardown(test_name).await;

        let error_message = outcome.err().map(|e| {
            error!(
                test = %test_name,
                engine = %descriptor.engine_name,
                code = e.error_code(),
                collected = collector.sample_count(),
                measured = collector.summary().total_iterations,
                error = %e,
                "Benchmark aborted"
            );
            e.to_string()
        });

        self.finish(test_name, &descriptor, collector.into_samples(), start, error_message)
    }

    /// Run `concurrency` independent tasks of `iterations` measured iterations
    ///
    /// Tasks skip warm-up. A failing or panicking task contributes no samples
    /// and one entry to the error list; its siblings run to completion.
    pub async fn run_concurrent_test(&self, test_name: &str, concurrency: usize) -> RunResult {
        let run_name = concurrent_test_name(test_name, concurrency);
        let descriptor = self.probe.descriptor();
        let start = Utc::now();
        info!(
            test = %run_name,
            engine = %descriptor.engine_name,
            executor = %descriptor.executor_kind,
            concurrency,
            iterations = self.config.iterations,
            duration_hint = %format_duration_secs(self.config.duration_hint().as_secs_f64()),
            "Starting concurrent benchmark"
        );

        if let Err(e) = guarded(self.setup()).await {
            self.log_setup_failure(&run_name, &descriptor, &e);
            self.teardown(&run_name).await;
            return self.finish(&run_name, &descriptor, Vec::new(), start, Some(e.to_string()));
        }

        let tasks = (0..concurrency).map(|task_id| {
            AssertUnwindSafe(self.run_task(test_name, task_id)).catch_unwind()
        });
        let outcomes = join_all(tasks).await;

        self.teardown(&run_name).await;

        let mut samples = Vec::new();
        let mut errors = Vec::new();
        for (task_id, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(Ok(task_samples)) => samples.extend(task_samples),
                Ok(Err(e)) => {
                    warn!(test = %run_name, task_id, code = e.error_code(), error = %e, "Concurrent task failed");
                    errors.push(format!("task {task_id}: {e}"));
                }
                Err(panic) => {
                    let reason = panic_reason(&*panic);
                    warn!(test = %run_name, task_id, reason = %reason, "Concurrent task panicked");
                    errors.push(format!("task {task_id} panicked: {reason}"));
                }
            }
        }

        let error_message =
            (!errors.is_empty()).then(|| format!("Concurrent test errors: {errors:?}"));

        self.finish(&run_name, &descriptor, samples, start, error_message)
    }

    /// Run several tests one after another against the same probe
    pub async fn run_suite<S: AsRef<str>>(&self, tests: &[S]) -> Vec<RunResult> {
        let mut results = Vec::with_capacity(tests.len());
        for test in tests {
            results.push(self.run_test(test.as_ref()).await);
        }
        results
    }

    /// Run one test in concurrent mode at each level, in the given order
    ///
    /// Level 1 also runs in concurrent mode so every point is named
    /// `{test}_concurrent_{N}`. Level 0 is skipped.
    pub async fn run_sweep(&self, test_name: &str, levels: &[usize]) -> Vec<RunResult> {
        let mut results = Vec::with_capacity(levels.len());
        for &level in levels.iter().filter(|&&level| level > 0) {
            results.push(self.run_concurrent_test(test_name, level).await);
        }
        results
    }

    async fn run_sequential(
        &self,
        test_name: &str,
        collector: &mut MetricsCollector,
    ) -> BenchResult<()> {
        let warmups = self.config.warmup_iterations as usize;
        let warmup_phase = format!("Warmup {test_name}");
        for iteration in 0..warmups {
            let ctx = IterationContext::warmup(test_name, iteration);
            let samples = self.probe.run_one_iteration(&ctx).await?;
            collector.record_warmup(samples);
            self.report(&warmup_phase, iteration + 1, warmups);
            tokio::task::yield_now().await;
        }

        let iterations = self.config.iterations as usize;
        let testing_phase = format!("Testing {test_name}");
        for iteration in 0..iterations {
            let ctx = IterationContext::measured(test_name, iteration);
            let samples = self.probe.run_one_iteration(&ctx).await?;
            debug!(test = %test_name, iteration, samples = samples.len(), "Iteration complete");
            collector.record(samples);
            self.report(&testing_phase, iteration + 1, iterations);
            tokio::task::yield_now().await;
        }

        Ok(())
    }

    async fn run_task(&self, test_name: &str, task_id: usize) -> BenchResult<Vec<MetricSample>> {
        let mut collector = MetricsCollector::new();
        for iteration in 0..self.config.iterations as usize {
            let ctx = IterationContext::for_task(test_name, iteration, task_id);
            collector.record(self.probe.run_one_iteration(&ctx).await?);
            tokio::task::yield_now().await;
        }
        debug!(test = %test_name, task_id, samples = collector.sample_count(), "Task complete");
        Ok(collector.into_samples())
    }

    async fn setup(&self) -> BenchResult<()> {
        let limit = self.config.timeout();
        match tokio::time::timeout(limit, self.probe.setup()).await {
            Ok(result) => result,
            Err(_) => Err(BenchError::Timeout(limit)),
        }
    }

    fn log_setup_failure(&self, test_name: &str, descriptor: &ProbeDescriptor, e: &BenchError) {
        error!(
            test = %test_name,
            engine = %descriptor.engine_name,
            code = e.error_code(),
            timed_out = e.is_timeout(),
            error = %e,
            "Setup failed"
        );
    }

    async fn teardown(&self, test_name: &str) {
        let limit = self.config.timeout();
        let result = match tokio::time::timeout(limit, self.probe.teardown()).await {
            Ok(result) => result,
            Err(_) => Err(BenchError::Timeout(limit)),
        };

        if let Err(e) = result {
            warn!(test = %test_name, error = %e, "Teardown failed, ignoring");
        }
    }

    fn report(&self, phase: &str, done: usize, total: usize) {
        if let Some(progress) = &self.progress {
            progress(phase, done, total);
        }
    }

    fn finish(
        &self,
        test_name: &str,
        descriptor: &ProbeDescriptor,
        samples: Vec<MetricSample>,
        start: DateTime<Utc>,
        error_message: Option<String>,
    ) -> RunResult {
        let result = RunResult::new(
            test_name,
            descriptor.engine_name.clone(),
            descriptor.executor_kind,
            samples,
            start,
            Utc::now(),
            error_message,
        );

        let summary = result.summary();
        info!(
            test = %result.test_name,
            engine = %result.engine_name,
            success = result.success(),
            measured = summary.total_iterations,
            failed = summary.failed_iterations,
            avg = %format_duration_secs(summary.avg_duration),
            p95 = %format_duration_secs(summary.p95_duration),
            wall = %format_duration_secs(result.wall_time()),
            "Benchmark finished"
        );

        result
    }
}

/// Await `fut`, turning a panic into an error
async fn guarded<T, F>(fut: F) -> BenchResult<T>
where
    F: Future<Output = BenchResult<T>>,
{
    AssertUnwindSafe(fut).catch_unwind().await.unwrap_or_else(|panic| {
        Err(BenchError::Internal(anyhow::anyhow!(
            "probe panicked: {}",
            panic_reason(&*panic)
        )))
    })
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use tokio_test::assert_ok;

    use super::*;
    use crate::benchmark::probe::MockProbe;
    use crate::test_utils::{ScriptedProbe, measured, mock_probe};

    fn config(iterations: u32, warmup: u32, concurrency: u32) -> BenchmarkConfig {
        BenchmarkConfig {
            iterations,
            warmup_iterations: warmup,
            concurrency,
            timeout_secs: 5,
            ..Default::default()
        }
    }

    fn always_succeeds(probe: &mut MockProbe) {
        probe
            .expect_run_one_iteration()
            .returning(|_| Ok(vec![measured(0.01, true)]));
    }

    #[tokio::test]
    async fn test_warmup_samples_excluded_from_summary() {
        let mut probe = mock_probe("docker");
        probe.expect_setup().times(1).returning(|| Ok(()));
        probe.expect_teardown().times(1).returning(|| Ok(()));
        probe
            .expect_run_one_iteration()
            .withf(|ctx| ctx.is_warmup)
            .times(2)
            .returning(|_| Ok(vec![measured(0.5, false)]));
        probe
            .expect_run_one_iteration()
            .withf(|ctx| !ctx.is_warmup && ctx.task_id.is_none())
            .times(3)
            .returning(|_| Ok(vec![measured(0.01, true)]));

        let runner = BenchmarkRunner::new(Arc::new(probe), config(3, 2, 1));
        let result = runner.run_test("create_container").await;

        assert_eq!(result.samples().len(), 5);
        assert_eq!(result.samples().iter().filter(|s| s.is_warmup).count(), 2);
        assert_eq!(result.summary().total_iterations, 3);
        assert!(result.success());
        assert_eq!(result.test_name, "create_container");
        assert_eq!(result.engine_name, "docker");
    }

    #[tokio::test]
    async fn test_setup_failure_returns_empty_failed_run() {
        let mut probe = mock_probe("isulad");
        probe
            .expect_setup()
            .returning(|| Err(BenchError::Unavailable("crictl not found".to_string())));
        probe.expect_teardown().times(1).returning(|| Ok(()));
        probe.expect_run_one_iteration().times(0);

        let runner = BenchmarkRunner::new(Arc::new(probe), config(5, 1, 1));
        let result = runner.run_test("list_images").await;

        assert!(!result.success());
        assert!(result.samples().is_empty());
        assert_eq!(
            result.error_message.as_deref(),
            Some("Backend unavailable: crictl not found")
        );
    }

    #[tokio::test]
    async fn test_infrastructure_error_keeps_collected_samples() {
        let mut probe = mock_probe("docker");
        probe.expect_setup().returning(|| Ok(()));
        probe.expect_teardown().times(1).returning(|| Ok(()));
        let mut calls = 0;
        probe.expect_run_one_iteration().returning(move |_| {
            calls += 1;
            if calls <= 2 {
                Ok(vec![measured(0.01, true)])
            } else {
                Err(BenchError::UnsupportedTest("bogus".to_string()))
            }
        });

        let runner = BenchmarkRunner::new(Arc::new(probe), config(5, 0, 1));
        let result = runner.run_test("bogus").await;

        assert!(!result.success());
        assert_eq!(result.samples().len(), 2);
        assert_eq!(result.error_message.as_deref(), Some("Unsupported test: bogus"));
    }

    #[tokio::test]
    async fn test_failed_measured_sample_fails_run() {
        let mut probe = mock_probe("docker");
        probe.expect_setup().returning(|| Ok(()));
        probe.expect_teardown().returning(|| Ok(()));
        let mut calls = 0;
        probe.expect_run_one_iteration().returning(move |_| {
            calls += 1;
            Ok(vec![measured(0.01, calls != 2)])
        });

        let runner = BenchmarkRunner::new(Arc::new(probe), config(4, 0, 1));
        let result = runner.run_test("stop_container").await;

        assert!(result.error_message.is_none());
        assert_eq!(result.summary().failed_iterations, 1);
        assert!(!result.success());
    }

    #[tokio::test]
    async fn test_teardown_error_does_not_fail_run() {
        let mut probe = mock_probe("docker");
        probe.expect_setup().returning(|| Ok(()));
        probe
            .expect_teardown()
            .times(1)
            .returning(|| Err(BenchError::Docker("cleanup refused".to_string())));
        always_succeeds(&mut probe);

        let runner = BenchmarkRunner::new(Arc::new(probe), config(2, 0, 1));
        let result = runner.run_test("list_containers").await;

        assert!(result.success());
        assert!(result.error_message.is_none());
    }

    #[tokio::test]
    async fn test_concurrency_fans_out_tasks() {
        let mut probe = mock_probe("docker");
        probe.expect_setup().times(1).returning(|| Ok(()));
        probe.expect_teardown().times(1).returning(|| Ok(()));
        probe
            .expect_run_one_iteration()
            .withf(|ctx| !ctx.is_warmup && ctx.task_id.is_some())
            .times(20)
            .returning(|_| Ok(vec![measured(0.01, true)]));

        // warm-up is ignored in concurrent mode
        let runner = BenchmarkRunner::new(Arc::new(probe), config(5, 3, 4));
        let result = runner.run_test("create_container").await;

        assert_eq!(result.test_name, "create_container_concurrent_4");
        assert_eq!(result.samples().len(), 20);
        assert_eq!(result.summary().total_iterations, 20);
        assert_eq!(result.summary().failed_iterations, 0);
        assert!(result.success());
    }

    #[tokio::test]
    async fn test_failing_task_does_not_stop_siblings() {
        let mut probe = mock_probe("docker");
        probe.expect_setup().returning(|| Ok(()));
        probe.expect_teardown().returning(|| Ok(()));
        probe
            .expect_run_one_iteration()
            .withf(|ctx| ctx.task_id == Some(2))
            .returning(|_| Err(BenchError::Docker("daemon hung up".to_string())));
        probe
            .expect_run_one_iteration()
            .withf(|ctx| ctx.task_id != Some(2))
            .returning(|_| Ok(vec![measured(0.01, true)]));

        let runner = BenchmarkRunner::new(Arc::new(probe), config(3, 0, 1));
        let result = runner.run_concurrent_test("start_container", 4).await;

        assert_eq!(result.samples().len(), 9);
        assert_eq!(result.summary().failed_iterations, 0);
        assert!(!result.success());
        assert_eq!(
            result.error_message.as_deref(),
            Some("Concurrent test errors: [\"task 2: Docker error: daemon hung up\"]")
        );
    }

    #[tokio::test]
    async fn test_panicking_task_is_captured() {
        let probe = ScriptedProbe::new("docker").panic_on_task(1);
        let runner = BenchmarkRunner::new(Arc::new(probe), config(2, 0, 1));
        let result = runner.run_concurrent_test("logs", 3).await;

        assert_eq!(result.samples().len(), 4);
        assert!(!result.success());
        let message = result.error_message.unwrap_or_default();
        assert!(message.contains("task 1 panicked"));
    }

    #[tokio::test]
    async fn test_panicking_iteration_ends_sequential_run() {
        let mut probe = mock_probe("docker");
        probe.expect_setup().returning(|| Ok(()));
        probe.expect_teardown().times(1).returning(|| Ok(()));
        let mut calls = 0;
        probe.expect_run_one_iteration().returning(move |_| {
            calls += 1;
            if calls == 3 {
                panic!("iteration blew up");
            }
            Ok(vec![measured(0.01, true)])
        });

        let runner = BenchmarkRunner::new(Arc::new(probe), config(5, 0, 1));
        let result = runner.run_test("logs").await;

        assert!(!result.success());
        assert_eq!(result.samples().len(), 2);
        assert_eq!(
            result.error_message.as_deref(),
            Some("Internal error: probe panicked: iteration blew up")
        );
    }

    #[tokio::test]
    async fn test_panicking_setup_is_captured() {
        let mut probe = mock_probe("crio");
        probe.expect_setup().returning(|| panic!("socket handshake"));
        probe.expect_teardown().times(1).returning(|| Ok(()));
        probe.expect_run_one_iteration().times(0);

        let runner = BenchmarkRunner::new(Arc::new(probe), config(3, 0, 1));
        let result = runner.run_test("pull_image").await;

        assert!(!result.success());
        assert!(result.samples().is_empty());
        assert!(
            result
                .error_message
                .as_deref()
                .is_some_and(|m| m.contains("panicked: socket handshake"))
        );
    }

    #[test]
    fn test_panic_reason_payloads() {
        assert_eq!(panic_reason(&"static text"), "static text");
        assert_eq!(panic_reason(&String::from("owned text")), "owned text");
        assert_eq!(panic_reason(&42_u8), "unknown panic");
    }

    #[tokio::test(start_paused = true)]
    async fn test_setup_timeout_aborts_run() {
        let probe = ScriptedProbe::new("crio").setup_delay(Duration::from_secs(60));
        let runner = BenchmarkRunner::new(Arc::new(probe), config(3, 0, 1));
        let result = runner.run_test("pull_image").await;

        assert!(!result.success());
        assert!(result.samples().is_empty());
        assert_eq!(result.error_message.as_deref(), Some("Timed out after 5s"));
    }

    #[tokio::test]
    async fn test_progress_callback_reports_each_iteration() {
        let seen: Arc<Mutex<Vec<(String, usize, usize)>>> = Arc::default();
        let sink = Arc::clone(&seen);

        let runner = BenchmarkRunner::new(Arc::new(ScriptedProbe::new("docker")), config(2, 1, 1))
            .with_progress(move |phase, done, total| {
                if let Ok(mut seen) = sink.lock() {
                    seen.push((phase.to_string(), done, total));
                }
            });
        let result = runner.run_test("list_images").await;
        assert!(result.success());

        let seen = assert_ok!(seen.lock()).clone();
        assert_eq!(
            seen,
            vec![
                ("Warmup list_images".to_string(), 1, 1),
                ("Testing list_images".to_string(), 1, 2),
                ("Testing list_images".to_string(), 2, 2),
            ]
        );
    }

    #[tokio::test]
    async fn test_suite_and_sweep_naming() {
        let runner = BenchmarkRunner::new(Arc::new(ScriptedProbe::new("docker")), config(2, 0, 1));

        let suite = runner.run_suite(&["list_images", "list_containers"]).await;
        let names: Vec<_> = suite.iter().map(|r| r.test_name.as_str()).collect();
        assert_eq!(names, ["list_images", "list_containers"]);

        let sweep = runner.run_sweep("create_container", &[1, 0, 4]).await;
        let names: Vec<_> = sweep.iter().map(|r| r.test_name.as_str()).collect();
        assert_eq!(
            names,
            ["create_container_concurrent_1", "create_container_concurrent_4"]
        );
        assert_eq!(sweep[1].samples().len(), 8);
        assert!(sweep.iter().all(RunResult::success));
    }
}
