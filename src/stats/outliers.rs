//! Z-score outlier detection
//!
//! Outliers are reported, never removed. Tail latency is the signal a
//! container benchmark is looking for.

use serde::{Deserialize, Serialize};

use super::moments::{mean, std_dev};

/// Default z-score threshold
pub const DEFAULT_Z_THRESHOLD: f64 = 3.0;

/// Minimum number of values before outliers are evaluated
pub const MIN_OUTLIER_SAMPLES: usize = 3;

/// A value whose z-score exceeds the threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Outlier {
    /// Position in the input slice
    pub index: usize,
    pub value: f64,
    pub z_score: f64,
}

/// Values more than `threshold` sample standard deviations from the mean
///
/// Needs at least three values; zero spread yields no outliers.
pub fn zscore_outliers(data: &[f64], threshold: f64) -> Vec<Outlier> {
    if data.len() < MIN_OUTLIER_SAMPLES {
        return Vec::new();
    }

    let mu = mean(data);
    let sigma = std_dev(data);
    if sigma <= 0.0 {
        return Vec::new();
    }

    data.iter()
        .enumerate()
        .filter_map(|(index, &value)| {
            let z_score = (value - mu).abs() / sigma;
            (z_score > threshold).then_some(Outlier {
                index,
                value,
                z_score,
            })
        })
        .collect()
}
