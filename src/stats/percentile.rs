//! Nearest-rank percentiles and quartiles
//!
//! Every percentile in the harness uses the same rule: sort ascending, take
//! index `floor(n * p / 100)`, clamp to the last element. Results must stay
//! comparable with previously recorded runs, so no interpolation is done.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Percentiles reported in distribution tables
pub const REPORTED_PERCENTILES: &[f64] = &[50.0, 75.0, 90.0, 95.0, 99.0, 99.9];

/// Quartiles of a sample with the interquartile range
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Quartiles {
    pub q1: f64,
    pub q2: f64,
    pub q3: f64,
    pub iqr: f64,
}

/// Sort a copy of `data` ascending
pub fn sorted(data: &[f64]) -> Vec<f64> {
    let mut sorted = data.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Nearest-rank percentile of already sorted data
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }

    let n = sorted.len();
    let rank = (n as f64 * p / 100.0).floor();
    let index = if rank.is_finite() && rank > 0.0 {
        (rank as usize).min(n - 1)
    } else {
        0
    };

    sorted[index]
}

/// Nearest-rank percentile of unsorted data; 0.0 for empty input
pub fn percentile(data: &[f64], p: f64) -> f64 {
    percentile_sorted(&sorted(data), p)
}

/// Quartiles at the 25/50/75 nearest ranks
pub fn quartiles(data: &[f64]) -> Option<Quartiles> {
    if data.is_empty() {
        return None;
    }

    let sorted = sorted(data);
    let q1 = percentile_sorted(&sorted, 25.0);
    let q2 = percentile_sorted(&sorted, 50.0);
    let q3 = percentile_sorted(&sorted, 75.0);

    Some(Quartiles {
        q1,
        q2,
        q3,
        iqr: q3 - q1,
    })
}

/// Table of [`REPORTED_PERCENTILES`] keyed `p50`, `p75`, ..., `p99.9`
pub fn percentile_table(data: &[f64]) -> BTreeMap<String, f64> {
    if data.is_empty() {
        return BTreeMap::new();
    }

    let sorted = sorted(data);
    REPORTED_PERCENTILES
        .iter()
        .map(|&p| (format!("p{p}"), percentile_sorted(&sorted, p)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_rank_index() {
        let data = [5.0, 1.0, 4.0, 2.0, 3.0];
        // floor(5 * 0.5) = 2 -> third smallest
        assert_eq!(percentile(&data, 50.0), 3.0);
        // floor(5 * 0.95) = 4
        assert_eq!(percentile(&data, 95.0), 5.0);
        assert_eq!(percentile(&data, 0.0), 1.0);
        // clamped to the last element
        assert_eq!(percentile(&data, 100.0), 5.0);
    }

    #[test]
    fn test_even_count_takes_upper_middle() {
        let data = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&data, 50.0), 3.0);
    }

    #[test]
    fn test_empty_is_zero() {
        assert_eq!(percentile(&[], 95.0), 0.0);
        assert!(quartiles(&[]).is_none());
        assert!(percentile_table(&[]).is_empty());
    }

    #[test]
    fn test_monotonic_and_idempotent() {
        let data: Vec<f64> = (1..=50).map(|i| (i * 37 % 50) as f64 * 0.01).collect();
        let p50 = percentile(&data, 50.0);
        let p95 = percentile(&data, 95.0);
        let p99 = percentile(&data, 99.0);
        assert!(p50 <= p95 && p95 <= p99);
        assert_eq!(percentile(&data, 95.0), p95);
    }

    #[test]
    fn test_quartiles_and_table() {
        let data: Vec<f64> = (1..=8).map(f64::from).collect();
        let q = quartiles(&data).unwrap();
        assert_eq!(q.q1, 3.0);
        assert_eq!(q.q2, 5.0);
        assert_eq!(q.q3, 7.0);
        assert_eq!(q.iqr, 4.0);

        let table = percentile_table(&data);
        assert_eq!(table.len(), 6);
        assert_eq!(table["p50"], 5.0);
        assert_eq!(table["p99.9"], 8.0);
    }
}
