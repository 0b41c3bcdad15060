//! Application configuration management
//!
//! This module handles loading and validating configuration from environment variables.
//! All configuration is loaded at startup and validated before any benchmark runs.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use validator::Validate;

use crate::constants::{
    DEFAULT_ANOMALY_SIGMA, DEFAULT_BENCHMARK_ITERATIONS, DEFAULT_BOTTLENECK_THRESHOLD_SECONDS,
    DEFAULT_CONCURRENCY, DEFAULT_DURATION_HINT_SECONDS, DEFAULT_IMAGE, DEFAULT_LOG_LEVEL,
    DEFAULT_OPERATION_TIMEOUT_SECONDS, DEFAULT_TOP_FINDINGS_LIMIT, DEFAULT_TREND_THRESHOLD,
    DEFAULT_WARMUP_ITERATIONS, test_names,
};
use crate::models::ExecutorKind;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub log: LogConfig,
    pub benchmark: BenchmarkConfig,
    pub analysis: AnalysisConfig,
    pub suite: SuiteConfig,
    pub engines: Vec<EngineConfig>,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub rust_log: String,
    /// Emit JSON log lines instead of the human formatter
    pub json: bool,
}

/// Benchmark execution configuration shared by every run
#[derive(Debug, Clone, Validate)]
pub struct BenchmarkConfig {
    /// Number of measured iterations per test (per task in concurrent mode)
    #[validate(range(min = 1))]
    pub iterations: u32,
    /// Number of warm-up iterations, sequential mode only
    pub warmup_iterations: u32,
    /// Number of concurrent tasks; 1 selects sequential mode
    #[validate(range(min = 1, max = 1024))]
    pub concurrency: u32,
    /// Advisory test duration in seconds (reported, never enforced)
    pub duration_hint_secs: u64,
    /// Timeout applied to every individual operation and to setup
    #[validate(range(min = 1, max = 3600))]
    pub timeout_secs: u64,
}

/// Cross-run analysis configuration
#[derive(Debug, Clone, Validate)]
pub struct AnalysisConfig {
    /// Engine used as the comparison baseline when it is present
    pub baseline_engine: Option<String>,
    #[validate(range(min = 0.0))]
    pub anomaly_sigma: f64,
    #[validate(range(min = 0.0))]
    pub trend_threshold: f64,
    #[validate(range(min = 0.0))]
    pub bottleneck_threshold_secs: f64,
    pub top_findings_limit: usize,
}

/// Which tests to run and how to sweep them
#[derive(Debug, Clone)]
pub struct SuiteConfig {
    pub tests: Vec<String>,
    /// Concurrency levels for scalability sweeps; empty disables sweeps
    pub concurrency_levels: Vec<u32>,
    /// Image used by container tests
    pub image: String,
}

/// One container engine under test
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub name: String,
    pub kind: ExecutorKind,
    /// CLI binary driven by client and CRI probes
    pub binary: String,
    /// Runtime endpoint (socket URL) where applicable
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key/value lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let benchmark = BenchmarkConfig::from_lookup(&lookup)?;
        let engines = EngineConfig::all_from_lookup(&lookup, benchmark.timeout_secs)?;

        Ok(Self {
            log: LogConfig::from_lookup(&lookup),
            analysis: AnalysisConfig::from_lookup(&lookup)?,
            suite: SuiteConfig::from_lookup(&lookup)?,
            benchmark,
            engines,
        })
    }
}

impl LogConfig {
    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: &F) -> Self {
        Self {
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            json: lookup("LOG_FORMAT")
                .map(|format| format.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        }
    }
}

impl BenchmarkConfig {
    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: &F) -> Result<Self, ConfigError> {
        let config = Self {
            iterations: parse_or(lookup, "BENCHMARK_ITERATIONS", DEFAULT_BENCHMARK_ITERATIONS)?,
            warmup_iterations: parse_or(
                lookup,
                "BENCHMARK_WARMUP_ITERATIONS",
                DEFAULT_WARMUP_ITERATIONS,
            )?,
            concurrency: parse_or(lookup, "BENCHMARK_CONCURRENCY", DEFAULT_CONCURRENCY)?,
            duration_hint_secs: parse_or(
                lookup,
                "BENCHMARK_DURATION_HINT_SECONDS",
                DEFAULT_DURATION_HINT_SECONDS,
            )?,
            timeout_secs: parse_or(
                lookup,
                "BENCHMARK_TIMEOUT_SECONDS",
                DEFAULT_OPERATION_TIMEOUT_SECONDS,
            )?,
        };

        config
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        Ok(config)
    }

    /// Per-operation timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Advisory duration of a test
    pub fn duration_hint(&self) -> Duration {
        Duration::from_secs(self.duration_hint_secs)
    }
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_BENCHMARK_ITERATIONS,
            warmup_iterations: DEFAULT_WARMUP_ITERATIONS,
            concurrency: DEFAULT_CONCURRENCY,
            duration_hint_secs: DEFAULT_DURATION_HINT_SECONDS,
            timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECONDS,
        }
    }
}

impl AnalysisConfig {
    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: &F) -> Result<Self, ConfigError> {
        let config = Self {
            baseline_engine: lookup("BASELINE_ENGINE")
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            anomaly_sigma: parse_or(lookup, "ANOMALY_SIGMA", DEFAULT_ANOMALY_SIGMA)?,
            trend_threshold: parse_or(lookup, "TREND_THRESHOLD", DEFAULT_TREND_THRESHOLD)?,
            bottleneck_threshold_secs: parse_or(
                lookup,
                "BOTTLENECK_THRESHOLD_SECONDS",
                DEFAULT_BOTTLENECK_THRESHOLD_SECONDS,
            )?,
            top_findings_limit: parse_or(lookup, "TOP_FINDINGS_LIMIT", DEFAULT_TOP_FINDINGS_LIMIT)?,
        };

        config
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        Ok(config)
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            baseline_engine: None,
            anomaly_sigma: DEFAULT_ANOMALY_SIGMA,
            trend_threshold: DEFAULT_TREND_THRESHOLD,
            bottleneck_threshold_secs: DEFAULT_BOTTLENECK_THRESHOLD_SECONDS,
            top_findings_limit: DEFAULT_TOP_FINDINGS_LIMIT,
        }
    }
}

impl SuiteConfig {
    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: &F) -> Result<Self, ConfigError> {
        let tests = match lookup("BENCHMARK_TESTS") {
            Some(raw) => split_list(&raw),
            None => test_names::DEFAULT_SUITE.iter().map(|t| t.to_string()).collect(),
        };

        let mut concurrency_levels = Vec::new();
        if let Some(raw) = lookup("CONCURRENCY_LEVELS") {
            for level in split_list(&raw) {
                let parsed: u32 = level
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("CONCURRENCY_LEVELS".to_string()))?;
                if parsed == 0 {
                    return Err(ConfigError::InvalidValue("CONCURRENCY_LEVELS".to_string()));
                }
                concurrency_levels.push(parsed);
            }
        }
        concurrency_levels.sort_unstable();
        concurrency_levels.dedup();

        Ok(Self {
            tests,
            concurrency_levels,
            image: lookup("BENCHMARK_IMAGE").unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
        })
    }
}

impl EngineConfig {
    /// Parse `ENGINES=name:kind,...` plus per-engine overrides
    fn all_from_lookup<F: Fn(&str) -> Option<String>>(
        lookup: &F,
        default_timeout_secs: u64,
    ) -> Result<Vec<Self>, ConfigError> {
        let raw = lookup("ENGINES").unwrap_or_else(|| "docker:client".to_string());

        let mut engines = Vec::new();
        for entry in split_list(&raw) {
            let (name, kind) = match entry.split_once(':') {
                Some((name, kind)) => {
                    let kind = ExecutorKind::from_str(kind.trim())
                        .map_err(|_| ConfigError::InvalidValue(format!("ENGINES ({entry})")))?;
                    (name.trim().to_string(), kind)
                }
                None => (entry.clone(), ExecutorKind::Client),
            };
            if name.is_empty() {
                return Err(ConfigError::InvalidValue(format!("ENGINES ({entry})")));
            }

            let key = name.to_ascii_uppercase().replace('-', "_");
            let binary = lookup(&format!("ENGINE_{key}_BINARY"))
                .unwrap_or_else(|| default_binary(&name, kind).to_string());
            let endpoint = lookup(&format!("ENGINE_{key}_ENDPOINT"))
                .unwrap_or_else(|| default_endpoint(&name).to_string());
            let timeout_secs = parse_or(
                lookup,
                &format!("ENGINE_{key}_TIMEOUT_SECONDS"),
                default_timeout_secs,
            )?;

            if kind == ExecutorKind::Cri && endpoint.is_empty() {
                return Err(ConfigError::Missing(format!("ENGINE_{key}_ENDPOINT")));
            }

            engines.push(Self {
                name,
                kind,
                binary,
                endpoint,
                timeout_secs,
            });
        }

        Ok(engines)
    }

    /// Per-operation timeout for this engine
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_binary(name: &str, kind: ExecutorKind) -> &str {
    match kind {
        ExecutorKind::Cri => "crictl",
        ExecutorKind::Api => "",
        ExecutorKind::Client => match name {
            "isulad" => "isula",
            "containerd" => "nerdctl",
            other => other,
        },
    }
}

fn default_endpoint(name: &str) -> &'static str {
    match name {
        "isulad" => "unix:///var/run/isulad.sock",
        "docker" => "unix:///var/run/docker.sock",
        "crio" => "unix:///var/run/crio/crio.sock",
        "containerd" => "unix:///run/containerd/containerd.sock",
        _ => "",
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.benchmark.iterations, 10);
        assert_eq!(config.benchmark.warmup_iterations, 5);
        assert_eq!(config.benchmark.concurrency, 1);
        assert_eq!(config.benchmark.timeout(), Duration::from_secs(30));
        assert_eq!(config.analysis.anomaly_sigma, 3.0);
        assert_eq!(config.analysis.top_findings_limit, 8);
        assert!(config.analysis.baseline_engine.is_none());
        assert_eq!(config.suite.image, "busybox:latest");
        assert!(config.suite.concurrency_levels.is_empty());
        assert_eq!(config.suite.tests, test_names::DEFAULT_SUITE);
        assert!(config.suite.tests.iter().any(|t| t == test_names::CONTAINER_LIFECYCLE));

        assert_eq!(config.engines.len(), 1);
        assert_eq!(config.engines[0].name, "docker");
        assert_eq!(config.engines[0].kind, ExecutorKind::Client);
        assert_eq!(config.engines[0].binary, "docker");
    }

    #[test]
    fn test_engine_list_with_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("ENGINES", "isulad:cri, docker:client,dockerd:api"),
            ("ENGINE_ISULAD_BINARY", "/opt/crictl"),
            ("ENGINE_DOCKERD_ENDPOINT", "unix:///tmp/docker.sock"),
            ("ENGINE_DOCKER_TIMEOUT_SECONDS", "5"),
        ]))
        .unwrap();

        let names: Vec<_> = config.engines.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["isulad", "docker", "dockerd"]);

        assert_eq!(config.engines[0].kind, ExecutorKind::Cri);
        assert_eq!(config.engines[0].binary, "/opt/crictl");
        assert_eq!(config.engines[0].endpoint, "unix:///var/run/isulad.sock");
        assert_eq!(config.engines[1].timeout_secs, 5);
        assert_eq!(config.engines[2].kind, ExecutorKind::Api);
        assert_eq!(config.engines[2].endpoint, "unix:///tmp/docker.sock");
    }

    #[test]
    fn test_cri_engine_requires_endpoint() {
        let err = Config::from_lookup(lookup_from(&[("ENGINES", "mystery:cri")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(key) if key == "ENGINE_MYSTERY_ENDPOINT"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = Config::from_lookup(lookup_from(&[("BENCHMARK_ITERATIONS", "many")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));

        let err = Config::from_lookup(lookup_from(&[("BENCHMARK_CONCURRENCY", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));

        let err = Config::from_lookup(lookup_from(&[("ENGINES", "docker:rest")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn test_suite_and_sweep_levels() {
        let config = Config::from_lookup(lookup_from(&[
            ("BENCHMARK_TESTS", "create_container, list_images"),
            ("CONCURRENCY_LEVELS", "4,1,2,4"),
            ("BASELINE_ENGINE", "  isulad "),
        ]))
        .unwrap();

        assert_eq!(config.suite.tests, ["create_container", "list_images"]);
        assert_eq!(config.suite.concurrency_levels, [1, 2, 4]);
        assert_eq!(config.analysis.baseline_engine.as_deref(), Some("isulad"));
    }
}
