//! Domain models
//!
//! This module contains the measurement data model shared by the runner and
//! the analyzers.

pub mod run;
pub mod sample;
pub mod summary;

pub use run::*;
pub use sample::*;
pub use summary::*;
