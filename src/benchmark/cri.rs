//! CRI probe driven through `crictl`
//!
//! Container operations need a pod sandbox. Each iteration writes its own
//! pod and container configs into a private work directory, walks the
//! `runp → create → start → stop → rm` sequence as far as the test needs,
//! and removes its sandbox afterwards.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;
use tokio::time::Instant;
use uuid::Uuid;

use crate::{
    config::EngineConfig,
    constants::{
        CLEANUP_TIMEOUT_SECONDS, KEEPALIVE_COMMAND, RESOURCE_LABEL, RETRY_DELAY_MILLIS, operations,
        test_names,
    },
    error::{BenchError, BenchResult},
    models::{ExecutorKind, MetricSample},
};

use super::command::{CommandOutcome, CommandOutput, CommandRunner};
use super::probe::{IterationContext, Probe, ProbeDescriptor, prerequisite_failed, resource_name};

/// One step of the pod/container lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Step {
    RunPod,
    Create,
    Start,
    Stop,
    Remove,
}

impl Step {
    const ALL: [Step; 5] = [Step::RunPod, Step::Create, Step::Start, Step::Stop, Step::Remove];

    fn operation(self) -> &'static str {
        match self {
            Step::RunPod => operations::RUN_POD_SANDBOX,
            Step::Create => operations::CREATE_CONTAINER,
            Step::Start => operations::START_CONTAINER,
            Step::Stop => operations::STOP_CONTAINER,
            Step::Remove => operations::REMOVE_CONTAINER,
        }
    }

    /// Stop and remove can lose a race with the container's state change
    fn retries(self) -> bool {
        matches!(self, Step::Stop | Step::Remove)
    }
}

/// Which lifecycle steps a test walks and which of them are timed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LifecyclePlan {
    last: Step,
    /// `None` times every step
    measured: Option<Step>,
}

impl LifecyclePlan {
    fn for_test(test: &str) -> Option<Self> {
        let single = |step| Self {
            last: step,
            measured: Some(step),
        };
        match test {
            test_names::CREATE_CONTAINER => Some(single(Step::Create)),
            test_names::START_CONTAINER => Some(single(Step::Start)),
            test_names::STOP_CONTAINER => Some(single(Step::Stop)),
            test_names::REMOVE_CONTAINER => Some(single(Step::Remove)),
            test_names::CONTAINER_LIFECYCLE => Some(Self {
                last: Step::Remove,
                measured: None,
            }),
            _ => None,
        }
    }

    fn steps(self) -> impl Iterator<Item = Step> {
        Step::ALL.into_iter().take_while(move |step| *step <= self.last)
    }

    fn is_measured(self, step: Step) -> bool {
        self.measured.is_none_or(|measured| measured == step)
    }
}

/// Probe for any CRI runtime reachable by `crictl`
pub struct CriProbe {
    descriptor: ProbeDescriptor,
    runner: CommandRunner,
    image: String,
    workdir: Mutex<Option<TempDir>>,
}

impl CriProbe {
    pub fn new(engine: &EngineConfig, image: impl Into<String>) -> Self {
        let runner = CommandRunner::new(
            engine.binary.clone(),
            crictl_base_args(&engine.endpoint, engine.timeout()),
            engine.timeout(),
        );
        Self::with_runner(&engine.name, runner, image)
    }

    /// Build a probe around an existing runner
    pub fn with_runner(engine_name: &str, runner: CommandRunner, image: impl Into<String>) -> Self {
        Self {
            descriptor: ProbeDescriptor::new(engine_name, ExecutorKind::Cri),
            runner,
            image: image.into(),
            workdir: Mutex::new(None),
        }
    }

    fn cleanup_runner(&self) -> CommandRunner {
        self.runner
            .with_timeout(Duration::from_secs(CLEANUP_TIMEOUT_SECONDS))
    }

    fn workdir(&self) -> BenchResult<PathBuf> {
        let guard = self
            .workdir
            .lock()
            .map_err(|_| BenchError::Setup("work directory lock poisoned".to_string()))?;
        guard
            .as_ref()
            .map(|dir| dir.path().to_path_buf())
            .ok_or_else(|| BenchError::Setup("probe used before setup".to_string()))
    }

    /// Stop and remove every sandbox carrying the harness label
    async fn remove_labelled_pods(&self) -> usize {
        let cleanup = self.cleanup_runner();
        let label = format!("{RESOURCE_LABEL}=true");
        let Some(listing) = cleanup.run_quiet(&["pods", "-q", "--label", label.as_str()]).await else {
            return 0;
        };

        let ids: Vec<&str> = listing
            .stdout
            .lines()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .collect();
        for id in &ids {
            self.remove_pod(id).await;
        }
        ids.len()
    }

    async fn remove_pod(&self, sandbox_id: &str) {
        let cleanup = self.cleanup_runner();
        cleanup.run_quiet(&["stopp", sandbox_id]).await;
        cleanup.run_quiet(&["rmp", sandbox_id]).await;
    }

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

    /// Write the sandbox and container configs for one iteration
    async fn write_configs(&self, pod_name: &str, ctr_name: &str) -> BenchResult<(PathBuf, PathBuf)> {
        let workdir = self.workdir()?;
        let pod_uid = Uuid::new_v4().simple().to_string();
        let log_dir = workdir.join("logs").join(&pod_uid);
        tokio::fs::create_dir_all(&log_dir).await?;

        let pod_config = json!({
            "metadata": {
                "name": pod_name,
                "namespace": "default",
                "attempt": 1,
                "uid": pod_uid,
            },
            "labels": { RESOURCE_LABEL: "true" },
            "log_directory": log_dir,
            "linux": {},
        });
        let container_config = json!({
            "metadata": { "name": ctr_name },
            "image": { "image": self.image },
            "command": KEEPALIVE_COMMAND,
            "log_path": format!("{ctr_name}.log"),
            "linux": {},
        });

        let pod_path = workdir.join(format!("{pod_name}.pod.json"));
        let ctr_path = workdir.join(format!("{ctr_name}.ctr.json"));
        tokio::fs::write(&pod_path, serde_json::to_vec_pretty(&pod_config)?).await?;
        tokio::fs::write(&ctr_path, serde_json::to_vec_pretty(&container_config)?).await?;

        Ok((pod_path, ctr_path))
    }

    /// Run one lifecycle step, retrying stop/remove once
    async fn run_step(&self, step: Step, args: &[&str]) -> BenchResult<(MetricSample, Option<CommandOutput>)> {
        let clock = Instant::now();
        let (sample, output) = self.runner.measure(step.operation(), args).await?;
        if sample.success || !step.retries() {
            return Ok((sample, output));
        }

        tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MILLIS)).await;
        let (retry, output) = self.runner.measure(step.operation(), args).await?;
        // the recorded span covers both attempts
        let error = (!retry.success).then(|| retry.error_message.unwrap_or_default());
        let merged = MetricSample::spanning(step.operation(), sample.start_time, clock.elapsed(), error);
        Ok((merged, output))
    }

    async fn measure_lifecycle(&self, plan: LifecyclePlan) -> BenchResult<Vec<MetricSample>> {
        let pod_name = resource_name();
        let ctr_name = resource_name();
        let (pod_path, ctr_path) = self.write_configs(&pod_name, &ctr_name).await?;
        let pod_path = path_arg(&pod_path);
        let ctr_path = path_arg(&ctr_path);

        let mut samples = Vec::new();
        let mut sandbox_id = String::new();
        let mut container_id = String::new();
        let mut aborted = None;

        for step in plan.steps() {
            let args: Vec<&str> = match step {
                Step::RunPod => vec!["runp", pod_path.as_str()],
                Step::Create => vec!["create", sandbox_id.as_str(), ctr_path.as_str(), pod_path.as_str()],
                Step::Start => vec!["start", container_id.as_str()],
                Step::Stop => vec!["stop", container_id.as_str()],
                Step::Remove => vec!["rm", container_id.as_str()],
            };
            let (sample, output) = match self.run_step(step, &args).await {
                Ok(measured) => measured,
                Err(e) => {
                    aborted = Some(e);
                    break;
                }
            };
            let created_id = output
                .as_ref()
                .and_then(CommandOutput::last_line)
                .map(str::to_string);

            let failed = !sample.success;
            if plan.is_measured(step) {
                let sample = match step {
                    Step::RunPod => sample.with_metadata("pod_name", pod_name.clone()),
                    _ => sample.with_metadata("container_name", ctr_name.clone()),
                };
                samples.push(sample);
            } else if failed {
                if let Some(target) = plan.measured {
                    let reason = sample.error_message.unwrap_or_default();
                    samples.push(prerequisite_failed(target.operation(), &reason));
                }
            }

            if failed {
                break;
            }
            match step {
                Step::RunPod => sandbox_id = created_id.unwrap_or_default(),
                Step::Create => container_id = created_id.unwrap_or_default(),
                _ => {}
            }
        }

        if !sandbox_id.is_empty() {
            self.remove_pod(&sandbox_id).await;
        }
        for path in [&pod_path, &ctr_path] {
            if let Err(e) = tokio::fs::remove_file(path).await {
                tracing::debug!(path = %path, error = %e, "Config file already gone");
            }
        }

        match aborted {
            Some(e) => Err(e),
            None => Ok(samples),
        }
    }
}

/// Leading `crictl` arguments selecting the endpoint and its own timeout
fn crictl_base_args(endpoint: &str, timeout: Duration) -> Vec<String> {
    vec![
        "--timeout".to_string(),
        format!("{}s", timeout.as_secs().max(1)),
        "--runtime-endpoint".to_string(),
        endpoint.to_string(),
        "--image-endpoint".to_string(),
        endpoint.to_string(),
    ]
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

#[async_trait]
impl Probe for CriProbe {
    fn descriptor(&self) -> ProbeDescriptor {
        self.descriptor.clone()
    }

    async fn setup(&self) -> BenchResult<()> {
        let program = self.runner.program().to_string();
        match self.runner.run(&["version"]).await {
            Ok(CommandOutcome::Completed(output)) if output.success() => {}
            Ok(CommandOutcome::Completed(output)) => {
                return Err(BenchError::Unavailable(format!(
                    "{program} cannot reach the runtime: {}",
                    output.error_text()
                )));
            }
            Ok(CommandOutcome::TimedOut(limit)) => return Err(BenchError::Timeout(limit)),
            Err(e) => {
                return Err(BenchError::Unavailable(format!("{program} not usable: {e}")));
            }
        }

        let dir = tempfile::Builder::new().prefix("ctrperf-cri-").tempdir()?;
        tracing::debug!(engine = %self.descriptor.engine_name, workdir = %dir.path().display(), "CRI work directory ready");
        let mut guard = self
            .workdir
            .lock()
            .map_err(|_| BenchError::Setup("work directory lock poisoned".to_string()))?;
        *guard = Some(dir);
        Ok(())
    }

    async fn teardown(&self) -> BenchResult<()> {
        let removed = self.remove_labelled_pods().await;
        if removed > 0 {
            tracing::info!(engine = %self.descriptor.engine_name, removed, "Removed leftover pod sandboxes");
        }

        let dir = match self.workdir.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some(dir) = dir {
            dir.close()?;
        }
        Ok(())
    }

    async fn run_one_iteration(&self, ctx: &IterationContext) -> BenchResult<Vec<MetricSample>> {
        if let Some(plan) = LifecyclePlan::for_test(&ctx.test_name) {
            return self.measure_lifecycle(plan).await;
        }

        match ctx.test_name.as_str() {
            test_names::PULL_IMAGE => {
                self.measure_plain(operations::PULL_IMAGE, &["pull", self.image.as_str()])
                    .await
            }
            test_names::LIST_CONTAINERS => {
                self.measure_plain(operations::LIST_CONTAINERS, &["ps", "-a"])
                    .await
            }
            test_names::LIST_IMAGES => self.measure_plain(operations::LIST_IMAGES, &["images"]).await,
            test_names::CONTAINER_STATS => {
                self.measure_plain(operations::CONTAINER_STATS, &["stats"])
                    .await
            }
            other => Err(BenchError::UnsupportedTest(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fake crictl: prints IDs for runp/create, fails the verbs in `FAIL`
    const FAKE_CRICTL: &str = r#"
while [ "$#" -gt 0 ]; do
  case "$1" in
    --timeout|--runtime-endpoint|--image-endpoint) shift 2 ;;
    *) break ;;
  esac
done
for verb in $FAIL; do
  if [ "$1" = "$verb" ]; then echo "rpc error: $verb failed" >&2; exit 1; fi
done
case "$1" in
  runp) echo "sandbox-1234" ;;
  create) echo "container-5678"; if [ -n "$VANISH" ]; then rm -f "$VANISH"; fi ;;
  images) printf 'IMAGE   TAG\nbusybox   latest\nalpine   3\n' ;;
esac
exit 0
"#;

    fn fake_probe(dir: &Path, failing: &str) -> CriProbe {
        scripted_probe(dir, "sh", &format!("FAIL=\"{failing}\""))
    }

    fn scripted_probe(dir: &Path, program: &str, prelude: &str) -> CriProbe {
        let script = dir.join("fake-crictl.sh");
        std::fs::write(&script, format!("{prelude}\n{FAKE_CRICTL}")).unwrap();
        let mut args = vec![script.display().to_string()];
        args.extend(crictl_base_args("unix:///run/fake.sock", Duration::from_secs(5)));
        let runner = CommandRunner::new(program, args, Duration::from_secs(5));
        CriProbe::with_runner("isulad", runner, "busybox:latest")
    }

    fn ctx(test: &str) -> IterationContext {
        IterationContext::measured(test, 0)
    }

    #[test]
    fn test_base_args() {
        let args = crictl_base_args("unix:///var/run/isulad.sock", Duration::from_secs(30));
        assert_eq!(
            args,
            [
                "--timeout",
                "30s",
                "--runtime-endpoint",
                "unix:///var/run/isulad.sock",
                "--image-endpoint",
                "unix:///var/run/isulad.sock"
            ]
        );
    }

    #[test]
    fn test_plans() {
        let plan = LifecyclePlan::for_test("stop_container").unwrap();
        let steps: Vec<_> = plan.steps().collect();
        assert_eq!(steps, [Step::RunPod, Step::Create, Step::Start, Step::Stop]);
        assert!(plan.is_measured(Step::Stop));
        assert!(!plan.is_measured(Step::Start));

        let lifecycle = LifecyclePlan::for_test("container_lifecycle").unwrap();
        assert!(Step::ALL.iter().all(|step| lifecycle.is_measured(*step)));
        assert!(LifecyclePlan::for_test("list_images").is_none());
    }

    #[tokio::test]
    async fn test_lifecycle_records_every_step() {
        let dir = TempDir::new().unwrap();
        let probe = fake_probe(dir.path(), "");
        probe.setup().await.unwrap();

        let samples = probe.run_one_iteration(&ctx("container_lifecycle")).await.unwrap();
        let ops: Vec<_> = samples.iter().map(|s| s.operation.as_str()).collect();
        assert_eq!(
            ops,
            [
                "run_pod_sandbox",
                "create_container",
                "start_container",
                "stop_container",
                "remove_container"
            ]
        );
        assert!(samples.iter().all(|s| s.success));

        probe.teardown().await.unwrap();
    }

    #[tokio::test]
    async fn test_single_step_and_prerequisite_failure() {
        let dir = TempDir::new().unwrap();
        let probe = fake_probe(dir.path(), "start");
        probe.setup().await.unwrap();

        let samples = probe.run_one_iteration(&ctx("create_container")).await.unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].operation, "create_container");
        assert!(samples[0].success);

        let samples = probe.run_one_iteration(&ctx("stop_container")).await.unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].operation, "stop_container");
        assert!(!samples[0].success);
        assert_eq!(
            samples[0].error_message.as_deref(),
            Some("container setup failed: rpc error: start failed")
        );
    }

    #[tokio::test]
    async fn test_list_images_and_unknown_test() {
        let dir = TempDir::new().unwrap();
        let probe = fake_probe(dir.path(), "");
        probe.setup().await.unwrap();

        let samples = probe.run_one_iteration(&ctx("list_images")).await.unwrap();
        assert_eq!(samples[0].metadata["count"], 2);

        let err = probe.run_one_iteration(&ctx("exec_command")).await.unwrap_err();
        assert!(matches!(err, BenchError::UnsupportedTest(_)));
    }

    #[tokio::test]
    async fn test_launch_error_mid_lifecycle_still_removes_configs() {
        let dir = TempDir::new().unwrap();
        // crictl stand-in that deletes itself once the container exists
        let link = dir.path().join("crictl");
        std::os::unix::fs::symlink("/bin/sh", &link).unwrap();
        let probe = scripted_probe(
            dir.path(),
            &link.display().to_string(),
            &format!("FAIL=\"\"\nVANISH=\"{}\"", link.display()),
        );
        probe.setup().await.unwrap();

        let err = probe.run_one_iteration(&ctx("stop_container")).await.unwrap_err();
        assert!(matches!(err, BenchError::Io(_)));

        let workdir = probe.workdir().unwrap();
        let leftovers: Vec<_> = std::fs::read_dir(&workdir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "json"))
            .collect();
        assert!(leftovers.is_empty(), "config files left behind: {leftovers:?}");
    }

    #[tokio::test]
    async fn test_retried_step_spans_both_attempts() {
        let dir = TempDir::new().unwrap();
        let probe = fake_probe(dir.path(), "stop");
        probe.setup().await.unwrap();

        let samples = probe.run_one_iteration(&ctx("stop_container")).await.unwrap();
        assert_eq!(samples.len(), 1);
        assert!(!samples[0].success);
        assert_eq!(samples[0].error_message.as_deref(), Some("rpc error: stop failed"));
        assert!(samples[0].duration >= RETRY_DELAY_MILLIS as f64 / 1000.0);
    }

    #[tokio::test]
    async fn test_lifecycle_requires_setup() {
        let dir = TempDir::new().unwrap();
        let probe = fake_probe(dir.path(), "");
        let err = probe.run_one_iteration(&ctx("create_container")).await.unwrap_err();
        assert_eq!(err.error_code(), "SETUP_FAILED");
    }
}
