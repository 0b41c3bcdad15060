//! Subprocess execution for command line backends

use std::time::Duration;

use chrono::Utc;
use tokio::{process::Command, time::Instant};

use crate::error::BenchResult;
use crate::models::MetricSample;

use super::probe::timeout_message;

/// Captured output of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Best description of why the command failed
    pub fn error_text(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match self.status {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_string(),
        }
    }

    /// Last non-empty stdout line (IDs printed by create-style commands)
    pub fn last_line(&self) -> Option<&str> {
        self.stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
    }

    /// Rows of tabular output, excluding the header line
    pub fn row_count(&self) -> usize {
        self.stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .count()
            .saturating_sub(1)
    }
}

/// How a command invocation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Completed(CommandOutput),
    TimedOut(Duration),
}

/// Runs one backend binary with fixed leading arguments and a time limit
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: String,
    base_args: Vec<String>,
    timeout: Duration,
}

impl CommandRunner {
    pub fn new(program: impl Into<String>, base_args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            base_args,
            timeout,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Same binary and arguments with a different time limit
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            timeout,
            ..self.clone()
        }
    }

    /// Run `program base_args.. args..`
    ///
    /// Failing to launch the binary is an error; a non-zero exit status or an
    /// expired time limit is reported through the outcome. The child is
    /// killed when the limit expires.
    pub async fn run(&self, args: &[&str]) -> BenchResult<CommandOutcome> {
        tracing::debug!(
            program = %self.program,
            args = ?args,
            timeout_secs = self.timeout.as_secs_f64(),
            "Running command"
        );

        let mut command = Command::new(&self.program);
        command.args(&self.base_args).args(args).kill_on_drop(true);

        match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(output) => {
                let output = output?;
                Ok(CommandOutcome::Completed(CommandOutput {
                    status: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                }))
            }
            Err(_) => Ok(CommandOutcome::TimedOut(self.timeout)),
        }
    }

    /// Run and time a command as `operation`
    ///
    /// The output is returned only when the command exited successfully.
    pub async fn measure(
        &self,
        operation: &str,
        args: &[&str],
    ) -> BenchResult<(MetricSample, Option<CommandOutput>)> {
        let start = Utc::now();
        let clock = Instant::now();
        let outcome = self.run(args).await?;
        let elapsed = clock.elapsed();

        Ok(match outcome {
            CommandOutcome::Completed(output) if output.success() => (
                MetricSample::spanning(operation, start, elapsed, None),
                Some(output),
            ),
            CommandOutcome::Completed(output) => (
                MetricSample::spanning(operation, start, elapsed, Some(output.error_text())),
                None,
            ),
            CommandOutcome::TimedOut(limit) => (
                MetricSample::spanning(operation, start, elapsed, Some(timeout_message(limit))),
                None,
            ),
        })
    }

    /// Run a command whose outcome does not matter (untimed setup and cleanup)
    ///
    /// Returns the output when the command exited successfully.
    pub async fn run_quiet(&self, args: &[&str]) -> Option<CommandOutput> {
        match self.run(args).await {
            Ok(CommandOutcome::Completed(output)) if output.success() => Some(output),
            Ok(CommandOutcome::Completed(output)) => {
                tracing::debug!(program = %self.program, args = ?args, error = %output.error_text(), "Command failed");
                None
            }
            Ok(CommandOutcome::TimedOut(limit)) => {
                tracing::debug!(program = %self.program, args = ?args, "Command {}", timeout_message(limit));
                None
            }
            Err(e) => {
                tracing::debug!(program = %self.program, args = ?args, error = %e, "Command could not be launched");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BenchError;

    fn shell(timeout: Duration) -> CommandRunner {
        CommandRunner::new("sh", vec!["-c".to_string()], timeout)
    }

    #[tokio::test]
    async fn test_successful_command_is_measured() {
        let (sample, output) = shell(Duration::from_secs(5))
            .measure("list_images", &["printf 'REPO TAG\\nbusybox latest\\n'"])
            .await
            .unwrap();

        assert!(sample.success);
        let output = output.unwrap();
        assert_eq!(output.row_count(), 1);
        assert_eq!(output.last_line(), Some("busybox latest"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_failed_sample() {
        let (sample, output) = shell(Duration::from_secs(5))
            .measure("stop_container", &["echo 'No such container' >&2; exit 3"])
            .await
            .unwrap();

        assert!(!sample.success);
        assert_eq!(sample.error_message.as_deref(), Some("No such container"));
        assert!(output.is_none());
    }

    #[tokio::test]
    async fn test_timeout_is_failed_sample() {
        let (sample, _) = shell(Duration::from_millis(200))
            .measure("pull_image", &["sleep 5"])
            .await
            .unwrap();

        assert!(!sample.success);
        assert_eq!(sample.error_message.as_deref(), Some("timed out after 0.2s"));
        assert!(sample.duration >= 0.2);
        assert!(sample.duration < 5.0);
        let span = (sample.end_time - sample.start_time).to_std().unwrap();
        assert_eq!(span.as_secs_f64(), sample.duration);
    }

    #[tokio::test]
    async fn test_missing_binary_is_infrastructure_error() {
        let runner = CommandRunner::new("ctrperf-no-such-binary", Vec::new(), Duration::from_secs(1));
        let err = runner.measure("version", &[]).await.unwrap_err();
        assert!(matches!(err, BenchError::Io(_)));
        assert!(runner.run_quiet(&[]).await.is_none());
    }

    #[test]
    fn test_error_text_fallbacks() {
        let output = CommandOutput {
            status: Some(2),
            ..Default::default()
        };
        assert_eq!(output.error_text(), "exit status 2");
        assert_eq!(output.row_count(), 0);
    }
}
