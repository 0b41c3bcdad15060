//! Run summary model

use serde::{Deserialize, Serialize};

/// Statistical summary of a run's measured samples
///
/// Always derived from a sample set by [`crate::benchmark::summarize`]; an
/// all-zero value means "no data", not "zero latency".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_iterations: usize,
    pub successful_iterations: usize,
    pub failed_iterations: usize,
    pub success_rate: f64,

    // Duration statistics (seconds)
    pub avg_duration: f64,
    pub min_duration: f64,
    pub max_duration: f64,
    pub p50_duration: f64,
    pub p95_duration: f64,
    pub p99_duration: f64,
    pub total_time: f64,

    pub operations_per_second: f64,
}

impl Summary {
    /// True when no measured samples were available
    pub fn is_empty(&self) -> bool {
        self.total_iterations == 0
    }
}
