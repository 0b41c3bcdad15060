//! Central tendency, dispersion and shape
//!
//! Skewness and kurtosis are population moments. They classify the rough
//! shape of a latency distribution relative to other runs; they are not a
//! normality test.

use serde::{Deserialize, Serialize};

use super::percentile::sorted;

/// Arithmetic mean; 0.0 for empty input
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Median, averaging the two middle values for even counts
pub fn median(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }

    let sorted = sorted(data);
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Most frequent value; ties resolve to the first value seen
pub fn mode(data: &[f64]) -> f64 {
    let mut best = match data.first() {
        Some(&first) => (first, 0usize),
        None => return 0.0,
    };

    for &candidate in data {
        let count = data.iter().filter(|&&v| v == candidate).count();
        if count > best.1 {
            best = (candidate, count);
        }
    }

    best.0
}

/// Sample variance (n - 1 denominator); 0.0 below two values
pub fn variance(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }

    let mu = mean(data);
    data.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / (data.len() - 1) as f64
}

/// Sample standard deviation
pub fn std_dev(data: &[f64]) -> f64 {
    variance(data).sqrt()
}

/// Standard deviation divided by the mean; 0.0 when undefined
pub fn coefficient_of_variation(data: &[f64]) -> f64 {
    let mu = mean(data);
    if data.len() < 2 || mu == 0.0 {
        return 0.0;
    }
    std_dev(data) / mu
}

fn central_moment(data: &[f64], mu: f64, order: i32) -> f64 {
    data.iter().map(|v| (v - mu).powi(order)).sum::<f64>() / data.len() as f64
}

/// Population skewness `m3 / m2^1.5`; 0.0 below three values or zero spread
pub fn skewness(data: &[f64]) -> f64 {
    if data.len() < 3 {
        return 0.0;
    }

    let mu = mean(data);
    let m2 = central_moment(data, mu, 2);
    if m2 <= 0.0 {
        return 0.0;
    }
    central_moment(data, mu, 3) / m2.powf(1.5)
}

/// Excess kurtosis `m4 / m2^2 - 3`; 0.0 below four values or zero spread
pub fn excess_kurtosis(data: &[f64]) -> f64 {
    if data.len() < 4 {
        return 0.0;
    }

    let mu = mean(data);
    let m2 = central_moment(data, mu, 2);
    if m2 <= 0.0 {
        return 0.0;
    }
    central_moment(data, mu, 4) / (m2 * m2) - 3.0
}

/// Jarque-Bera statistic `n/6 * (S^2 + K^2/4)`, reported without a p-value
pub fn jarque_bera_proxy(n: usize, skewness: f64, kurtosis: f64) -> f64 {
    n as f64 / 6.0 * (skewness.powi(2) + 0.25 * kurtosis.powi(2))
}

/// Coarse shape label derived from skewness and excess kurtosis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionShape {
    ApproximatelyNormal,
    RightSkewed,
    LeftSkewed,
    HeavyTailed,
    LightTailed,
    ModeratelySkewed,
}

impl DistributionShape {
    pub fn classify(skewness: f64, kurtosis: f64) -> Self {
        if skewness.abs() < 0.5 && kurtosis.abs() < 0.5 {
            Self::ApproximatelyNormal
        } else if skewness > 1.0 {
            Self::RightSkewed
        } else if skewness < -1.0 {
            Self::LeftSkewed
        } else if kurtosis > 1.0 {
            Self::HeavyTailed
        } else if kurtosis < -1.0 {
            Self::LightTailed
        } else {
            Self::ModeratelySkewed
        }
    }
}
