//! Metric sample model

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::time::elapsed_secs;

/// Outcome of one timed operation against a backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Operation name (e.g. "create_container")
    pub operation: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Elapsed seconds, always `end_time - start_time` and never negative
    pub duration: f64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Free-form context (image, container id, row counts)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Warm-up samples are kept in the run but excluded from every summary
    #[serde(default)]
    pub is_warmup: bool,
}

impl MetricSample {
    /// A failed operation spanning `start..end`
    pub fn failed(
        operation: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        error: impl Into<String>,
    ) -> Self {
        Self::new(operation.into(), start, end, false, Some(error.into()))
    }

    /// A sample starting at `start` whose length was read from a monotonic clock
    ///
    /// `end_time` is derived from `elapsed`, so a wall-clock step during the
    /// operation cannot distort the duration.
    pub fn spanning(
        operation: impl Into<String>,
        start: DateTime<Utc>,
        elapsed: Duration,
        error: Option<String>,
    ) -> Self {
        let span = TimeDelta::from_std(elapsed).unwrap_or(TimeDelta::zero());
        Self::new(operation.into(), start, start + span, error.is_none(), error)
    }

    /// A sample of `seconds` length starting at `start`
    pub fn from_duration(
        operation: impl Into<String>,
        start: DateTime<Utc>,
        seconds: f64,
        success: bool,
    ) -> Self {
        let elapsed = if seconds.is_finite() && seconds > 0.0 {
            TimeDelta::nanoseconds((seconds * 1e9).round() as i64)
        } else {
            TimeDelta::zero()
        };
        let error = (!success).then(|| "operation failed".to_string());

        Self::new(operation.into(), start, start + elapsed, success, error)
    }

    fn new(
        operation: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        success: bool,
        error_message: Option<String>,
    ) -> Self {
        let end = end.max(start);
        let duration = elapsed_secs(start, end);

        Self {
            operation,
            start_time: start,
            end_time: end,
            duration,
            success,
            error_message,
            metadata: BTreeMap::new(),
            is_warmup: false,
        }
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Tag the sample as a warm-up measurement
    pub fn into_warmup(mut self) -> Self {
        self.is_warmup = true;
        self
    }

    /// Whether the sample counts toward summaries
    pub fn is_measured(&self) -> bool {
        !self.is_warmup
    }
}
