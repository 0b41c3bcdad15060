//! Statistics toolkit
//!
//! Numeric routines shared by the run aggregator and the analyzers. All
//! functions take plain `f64` slices and tolerate empty input.

pub mod histogram;
pub mod moments;
pub mod outliers;
pub mod percentile;
pub mod similarity;

pub use histogram::Histogram;
pub use moments::{
    DistributionShape, coefficient_of_variation, excess_kurtosis, jarque_bera_proxy, mean, median,
    mode, skewness, std_dev, variance,
};
pub use outliers::{MIN_OUTLIER_SAMPLES, Outlier, zscore_outliers};
pub use percentile::{Quartiles, percentile, percentile_sorted, percentile_table, quartiles, sorted};
pub use similarity::similarity;
