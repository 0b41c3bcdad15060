//! Similarity between two scalar metrics
//!
//! This is a closeness score, not a statistical correlation: it only says how
//! near two averages are relative to the larger one.

/// `1 - |a - b| / max(|a|, |b|)`, in `[0, 1]` for same-sign inputs
///
/// Two zeros are identical and score 1.0.
pub fn similarity(a: f64, b: f64) -> f64 {
    let scale = a.abs().max(b.abs());
    if scale == 0.0 {
        return 1.0;
    }
    1.0 - (a - b).abs() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity() {
        assert_eq!(similarity(2.0, 2.0), 1.0);
        assert_eq!(similarity(0.0, 0.0), 1.0);
        assert!((similarity(1.0, 2.0) - 0.5).abs() < 1e-9);
        assert_eq!(similarity(0.0, 3.0), 0.0);
        assert_eq!(similarity(1.0, 4.0), similarity(4.0, 1.0));
    }
}
