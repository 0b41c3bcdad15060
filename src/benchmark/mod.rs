//! Benchmark execution engine
//!
//! The runner drives a [`Probe`] through warm-up, measured and concurrent
//! iterations and freezes the samples into a [`crate::models::RunResult`].
//! Three probes are bundled, one per [`ExecutorKind`]:
//!
//! 1. **Client** (`client.rs`): docker-compatible command line clients.
//! 2. **CRI** (`cri.rs`): any runtime reachable through `crictl`.
//! 3. **API** (`docker.rs`): the Docker Engine HTTP API via `bollard`.

pub mod client;
pub mod command;
pub mod cri;
pub mod docker;
pub mod metrics;
pub mod probe;
pub mod runner;

use std::sync::Arc;

pub use client::ClientProbe;
pub use cri::CriProbe;
pub use docker::DockerApiProbe;
pub use metrics::{MetricsCollector, summarize};
pub use probe::{IterationContext, Probe, ProbeDescriptor};
pub use runner::{BenchmarkRunner, ProgressCallback, concurrent_test_name};

use crate::{config::EngineConfig, error::BenchResult, models::ExecutorKind};

/// Build the probe matching an engine's executor kind
pub fn build_probe(engine: &EngineConfig, image: &str) -> BenchResult<Arc<dyn Probe>> {
    let probe: Arc<dyn Probe> = match engine.kind {
        ExecutorKind::Client => Arc::new(ClientProbe::new(engine, image)),
        ExecutorKind::Cri => Arc::new(CriProbe::new(engine, image)),
        ExecutorKind::Api => Arc::new(DockerApiProbe::new(engine, image)?),
    };
    Ok(probe)
}
