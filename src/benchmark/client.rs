//! Docker-compatible command line probe
//!
//! Drives `docker`, `isula`, `podman` or `nerdctl` through subprocesses.
//! Every iteration creates its own uniquely named container, measures only
//! the operation under test, and removes the container again untimed.

use std::time::Duration;

use async_trait::async_trait;

use crate::{
    config::EngineConfig,
    constants::{CLEANUP_TIMEOUT_SECONDS, KEEPALIVE_COMMAND, RESOURCE_PREFIX, operations, test_names},
    error::{BenchError, BenchResult},
    models::{ExecutorKind, MetricSample},
};

use super::command::{CommandOutcome, CommandRunner};
use super::probe::{
    IterationContext, Probe, ProbeDescriptor, prerequisite_failed, resource_name, timeout_message,
};

/// Probe for docker-compatible CLIs
pub struct ClientProbe {
    descriptor: ProbeDescriptor,
    runner: CommandRunner,
    image: String,
}

/// State a test container is prepared in before the measured operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prepared {
    Created,
    Running,
}

impl ClientProbe {
    pub fn new(engine: &EngineConfig, image: impl Into<String>) -> Self {
        let runner = CommandRunner::new(engine.binary.clone(), Vec::new(), engine.timeout());
        Self::with_runner(&engine.name, runner, image)
    }

    /// Build a probe around an existing runner
    pub fn with_runner(engine_name: &str, runner: CommandRunner, image: impl Into<String>) -> Self {
        Self {
            descriptor: ProbeDescriptor::new(engine_name, ExecutorKind::Client),
            runner,
            image: image.into(),
        }
    }

    fn cleanup_runner(&self) -> CommandRunner {
        self.runner
            .with_timeout(Duration::from_secs(CLEANUP_TIMEOUT_SECONDS))
    }

    /// Remove containers left behind by earlier or interrupted runs
    async fn remove_stale_containers(&self) -> usize {
        let cleanup = self.cleanup_runner();
        let Some(listing) = cleanup
            .run_quiet(&["ps", "-a", "--format", "{{.Names}}"])
            .await
        else {
            return 0;
        };

        let stale: Vec<&str> = listing
            .stdout
            .lines()
            .map(str::trim)
            .filter(|name| name.starts_with(RESOURCE_PREFIX))
            .collect();

        for name in &stale {
            cleanup.run_quiet(&["rm", "-f", *name]).await;
        }

        if !stale.is_empty() {
            tracing::info!(engine = %self.descriptor.engine_name, removed = stale.len(), "Removed stale containers");
        }
        stale.len()
    }

    /// Create (or run) a container untimed; `Ok(Err(reason))` when the engine refused
    async fn prepare(&self, name: &str, state: Prepared) -> BenchResult<Result<(), String>> {
        let mut args = match state {
            Prepared::Created => vec!["create", "--name", name],
            Prepared::Running => vec!["run", "-d", "--name", name],
        };
        args.push(&self.image);
        args.extend_from_slice(KEEPALIVE_COMMAND);

        Ok(match self.runner.run(&args).await? {
            CommandOutcome::Completed(output) if output.success() => Ok(()),
            CommandOutcome::Completed(output) => Err(output.error_text()),
            CommandOutcome::TimedOut(limit) => Err(timeout_message(limit)),
        })
    }

    async fn remove_quietly(&self, name: &str) {
        self.cleanup_runner().run_quiet(&["rm", "-f", name]).await;
    }

    /// Measure a command that needs no container
    async fn measure_plain(&self, operation: &str, args: &[&str]) -> BenchResult<Vec<MetricSample>> {
        let (sample, output) = self.runner.measure(operation, args).await?;
        let sample = match (operation, output) {
            (operations::LIST_CONTAINERS | operations::LIST_IMAGES, Some(output)) => {
                sample.with_metadata("count", output.row_count())
            }
            (operations::PULL_IMAGE, _) => sample.with_metadata("image", self.image.clone()),
            _ => sample,
        };
        Ok(vec![sample])
    }

    /// Prepare a private container, measure `args` against it, then remove it
    async fn measure_on_container(
        &self,
        operation: &str,
        state: Prepared,
        args: &[&str],
    ) -> BenchResult<Vec<MetricSample>> {
        let name = resource_name();

        let sample = match self.prepare(&name, state).await? {
            Ok(()) => {
                let mut full_args = args.to_vec();
                full_args.push(&name);
                if operation == operations::EXEC_COMMAND {
                    full_args.extend_from_slice(&["echo", "test"]);
                }
                let (sample, _) = self.runner.measure(operation, &full_args).await?;
                sample
            }
            Err(reason) => prerequisite_failed(operation, &reason),
        };

        self.remove_quietly(&name).await;

        Ok(vec![
            sample
                .with_metadata("container_name", name)
                .with_metadata("image", self.image.clone()),
        ])
    }

    /// Measure the whole create, start, stop, remove sequence
    async fn measure_lifecycle(&self) -> BenchResult<Vec<MetricSample>> {
        let name = resource_name();
        let mut create_args = vec!["create", "--name", name.as_str(), self.image.as_str()];
        create_args.extend_from_slice(KEEPALIVE_COMMAND);

        let steps: [(&str, Vec<&str>); 4] = [
            (operations::CREATE_CONTAINER, create_args),
            (operations::START_CONTAINER, vec!["start", name.as_str()]),
            (operations::STOP_CONTAINER, vec!["stop", name.as_str()]),
            (operations::REMOVE_CONTAINER, vec!["rm", name.as_str()]),
        ];

        let mut samples = Vec::with_capacity(steps.len());
        let mut completed = true;
        for (operation, args) in &steps {
            let (sample, _) = self.runner.measure(operation, args).await?;
            let success = sample.success;
            samples.push(sample.with_metadata("container_name", name.clone()));
            if !success {
                completed = false;
                break;
            }
        }

        if !completed {
            self.remove_quietly(&name).await;
        }
        Ok(samples)
    }
}

#[async_trait]
impl Probe for ClientProbe {
    fn descriptor(&self) -> ProbeDescriptor {
        self.descriptor.clone()
    }

    async fn setup(&self) -> BenchResult<()> {
        let program = self.runner.program().to_string();
        match self.runner.run(&["version"]).await {
            Ok(CommandOutcome::Completed(output)) if output.success() => {}
            Ok(CommandOutcome::Completed(output)) => {
                return Err(BenchError::Unavailable(format!(
                    "{program} version failed: {}",
                    output.error_text()
                )));
            }
            Ok(CommandOutcome::TimedOut(limit)) => return Err(BenchError::Timeout(limit)),
            Err(e) => {
                return Err(BenchError::Unavailable(format!("{program} not usable: {e}")));
            }
        }

        self.remove_stale_containers().await;
        Ok(())
    }

    async fn teardown(&self) -> BenchResult<()> {
        self.remove_stale_containers().await;
        Ok(())
    }

    async fn run_one_iteration(&self, ctx: &IterationContext) -> BenchResult<Vec<MetricSample>> {
        let image = self.image.as_str();
        match ctx.test_name.as_str() {
            test_names::PULL_IMAGE => self.measure_plain(operations::PULL_IMAGE, &["pull", image]).await,
            test_names::LIST_CONTAINERS => {
                self.measure_plain(operations::LIST_CONTAINERS, &["ps", "-a"]).await
            }
            test_names::LIST_IMAGES => self.measure_plain(operations::LIST_IMAGES, &["images"]).await,
            test_names::CREATE_CONTAINER => {
                let name = resource_name();
                let mut args = vec!["create", "--name", name.as_str(), image];
                args.extend_from_slice(KEEPALIVE_COMMAND);
                let (sample, output) = self.runner.measure(operations::CREATE_CONTAINER, &args).await?;
                let container_id = output
                    .as_ref()
                    .and_then(|o| o.last_line())
                    .unwrap_or_default()
                    .to_string();
                self.remove_quietly(&name).await;
                Ok(vec![
                    sample
                        .with_metadata("container_name", name)
                        .with_metadata("container_id", container_id)
                        .with_metadata("image", image),
                ])
            }
            test_names::START_CONTAINER => {
                self.measure_on_container(operations::START_CONTAINER, Prepared::Created, &["start"])
                    .await
            }
            test_names::STOP_CONTAINER => {
                self.measure_on_container(operations::STOP_CONTAINER, Prepared::Running, &["stop"])
                    .await
            }
            test_names::REMOVE_CONTAINER => {
                self.measure_on_container(operations::REMOVE_CONTAINER, Prepared::Created, &["rm"])
                    .await
            }
            test_names::CONTAINER_STATS => {
                self.measure_on_container(
                    operations::CONTAINER_STATS,
                    Prepared::Running,
                    &["stats", "--no-stream"],
                )
                .await
            }
            test_names::EXEC_COMMAND => {
                self.measure_on_container(operations::EXEC_COMMAND, Prepared::Running, &["exec"])
                    .await
            }
            test_names::LOGS => {
                self.measure_on_container(operations::LOGS, Prepared::Running, &["logs"])
                    .await
            }
            test_names::CONTAINER_LIFECYCLE => self.measure_lifecycle().await,
            other => Err(BenchError::UnsupportedTest(other.to_string())),
        }
    }
}
