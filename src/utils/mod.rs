//! Utility functions

pub mod time;

pub use time::{elapsed_secs, format_duration_secs};
