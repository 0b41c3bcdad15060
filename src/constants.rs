//! Application-wide constants
//!
//! This module contains all constant values used throughout the harness.
//! Constants are grouped by their purpose for better organization.

// =============================================================================
// LOGGING DEFAULTS
// =============================================================================

/// Default tracing filter when `RUST_LOG` is not set
pub const DEFAULT_LOG_LEVEL: &str = "info";

// =============================================================================
// BENCHMARK DEFAULTS
// =============================================================================

/// Default number of measured iterations per test
pub const DEFAULT_BENCHMARK_ITERATIONS: u32 = 10;

/// Default number of warm-up iterations (discarded from the summary)
pub const DEFAULT_WARMUP_ITERATIONS: u32 = 5;

/// Default number of concurrent tasks (1 = sequential mode)
pub const DEFAULT_CONCURRENCY: u32 = 1;

/// Default advisory duration of a test in seconds
pub const DEFAULT_DURATION_HINT_SECONDS: u64 = 60;

/// Default per-operation timeout in seconds
pub const DEFAULT_OPERATION_TIMEOUT_SECONDS: u64 = 30;

/// Default image used by container tests
pub const DEFAULT_IMAGE: &str = "busybox:latest";

/// Name prefix of every resource created by the harness
pub const RESOURCE_PREFIX: &str = "ctrperf-";

/// Label attached to every resource created by the harness
pub const RESOURCE_LABEL: &str = "ctrperf";

/// Timeout used for best-effort cleanup commands
pub const CLEANUP_TIMEOUT_SECONDS: u64 = 10;

/// Command that keeps a test container running until it is stopped
pub const KEEPALIVE_COMMAND: &[&str] = &["sh", "-c", "echo hello; tail -f /dev/null"];

/// Delay before retrying a stop or remove that lost a state race
pub const RETRY_DELAY_MILLIS: u64 = 200;

// =============================================================================
// ANALYSIS DEFAULTS
// =============================================================================

/// Sigma multiplier above which a duration is reported as an anomaly
pub const DEFAULT_ANOMALY_SIGMA: f64 = 3.0;

/// Fraction by which an anomaly must exceed the mean of its siblings (10%)
pub const MIN_ANOMALY_RELATIVE_GAP: f64 = 0.1;

/// Relative change between run halves that counts as a trend (10%)
pub const DEFAULT_TREND_THRESHOLD: f64 = 0.1;

/// Average duration (seconds) above which a run is reported as a bottleneck
pub const DEFAULT_BOTTLENECK_THRESHOLD_SECONDS: f64 = 1.0;

/// Average duration (seconds) above which a bottleneck is high severity
pub const HIGH_SEVERITY_THRESHOLD_SECONDS: f64 = 5.0;

/// Maximum number of entries in the top findings digest
pub const DEFAULT_TOP_FINDINGS_LIMIT: usize = 8;

/// Maximum failure messages kept per engine in the per-test analysis
pub const MAX_FAILURE_SAMPLES: usize = 3;

/// Number of bins used for latency histograms
pub const HISTOGRAM_BINS: usize = 10;

/// Similarity above which two engines are considered strongly alike
pub const STRONG_SIMILARITY: f64 = 0.8;

/// Similarity below which two engines are considered weakly alike
pub const WEAK_SIMILARITY: f64 = 0.3;

/// Suffix marker used to name concurrent runs (`{test}_concurrent_{n}`)
pub const CONCURRENT_MARKER: &str = "_concurrent_";

// =============================================================================
// SUPPORTED TESTS
// =============================================================================

/// Test identifiers understood by the bundled probes
pub mod test_names {
    pub const PULL_IMAGE: &str = "pull_image";
    pub const CREATE_CONTAINER: &str = "create_container";
    pub const START_CONTAINER: &str = "start_container";
    pub const STOP_CONTAINER: &str = "stop_container";
    pub const REMOVE_CONTAINER: &str = "remove_container";
    pub const CONTAINER_LIFECYCLE: &str = "container_lifecycle";
    pub const LIST_CONTAINERS: &str = "list_containers";
    pub const LIST_IMAGES: &str = "list_images";
    pub const CONTAINER_STATS: &str = "container_stats";
    pub const EXEC_COMMAND: &str = "exec_command";
    pub const LOGS: &str = "logs";

    /// Tests run when none are configured
    pub const DEFAULT_SUITE: &[&str] = &[
        PULL_IMAGE,
        CREATE_CONTAINER,
        START_CONTAINER,
        STOP_CONTAINER,
        REMOVE_CONTAINER,
        LIST_CONTAINERS,
        LIST_IMAGES,
    ];
}

/// Operation names recorded on samples
pub mod operations {
    pub const RUN_POD_SANDBOX: &str = "run_pod_sandbox";
    pub const PULL_IMAGE: &str = "pull_image";
    pub const CREATE_CONTAINER: &str = "create_container";
    pub const START_CONTAINER: &str = "start_container";
    pub const STOP_CONTAINER: &str = "stop_container";
    pub const REMOVE_CONTAINER: &str = "remove_container";
    pub const LIST_CONTAINERS: &str = "list_containers";
    pub const LIST_IMAGES: &str = "list_images";
    pub const CONTAINER_STATS: &str = "container_stats";
    pub const EXEC_COMMAND: &str = "exec_command";
    pub const LOGS: &str = "logs";
}
