//! Fixed-bin-count histogram

use serde::{Deserialize, Serialize};

/// Equal-width histogram over the sample range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub bins: usize,
    pub counts: Vec<usize>,
    /// `bins + 1` ascending edges
    pub bin_edges: Vec<f64>,
    pub bin_centers: Vec<f64>,
}

impl Histogram {
    /// Build a histogram with `bins` equal-width bins
    ///
    /// Bins are half-open `[lo, hi)` except the last, which also includes the
    /// maximum. When every value is equal the range is widened to `x ± 0.5`.
    /// Returns `None` for empty input or zero bins.
    pub fn build(data: &[f64], bins: usize) -> Option<Self> {
        if data.is_empty() || bins == 0 {
            return None;
        }

        let min = data.iter().copied().fold(f64::INFINITY, f64::min);
        let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let (lo, hi) = if max > min {
            (min, max)
        } else {
            (min - 0.5, max + 0.5)
        };

        let width = (hi - lo) / bins as f64;
        let bin_edges: Vec<f64> = (0..=bins).map(|i| lo + width * i as f64).collect();

        let mut counts = vec![0usize; bins];
        for &value in data {
            let slot = ((value - lo) / width).floor();
            let index = if slot.is_finite() && slot > 0.0 {
                (slot as usize).min(bins - 1)
            } else {
                0
            };
            counts[index] += 1;
        }

        let bin_centers = bin_edges
            .windows(2)
            .map(|edge| (edge[0] + edge[1]) / 2.0)
            .collect();

        Some(Self {
            bins,
            counts,
            bin_edges,
            bin_centers,
        })
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_cover_all_values() {
        let data: Vec<f64> = (0..=10).map(f64::from).collect();
        let hist = Histogram::build(&data, 10).unwrap();

        assert_eq!(hist.counts.len(), 10);
        assert_eq!(hist.bin_edges.len(), 11);
        assert_eq!(hist.total(), data.len());
        // maximum lands in the last, closed bin
        assert_eq!(hist.counts[9], 2);
        assert_eq!(hist.bin_edges[0], 0.0);
        assert_eq!(hist.bin_edges[10], 10.0);
        assert!((hist.bin_centers[0] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_constant_data_widens_range() {
        let hist = Histogram::build(&[2.0, 2.0, 2.0], 10).unwrap();
        assert_eq!(hist.bin_edges[0], 1.5);
        assert_eq!(hist.bin_edges[10], 2.5);
        assert_eq!(hist.counts[5], 3);
    }

    #[test]
    fn test_empty_input() {
        assert!(Histogram::build(&[], 10).is_none());
        assert!(Histogram::build(&[1.0], 0).is_none());
    }
}
