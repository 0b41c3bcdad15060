//! Docker Engine API probe

use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use bollard::{
    API_DEFAULT_VERSION, Docker,
    models::ContainerCreateBody,
    query_parameters::{
        CreateContainerOptionsBuilder, CreateImageOptionsBuilder, ListContainersOptionsBuilder,
        ListImagesOptions, RemoveContainerOptionsBuilder, StartContainerOptions,
        StatsOptionsBuilder, StopContainerOptions,
    },
};
use futures::StreamExt;

use crate::{
    config::EngineConfig,
    constants::{KEEPALIVE_COMMAND, RESOURCE_LABEL, RESOURCE_PREFIX, operations, test_names},
    error::{BenchError, BenchResult},
    models::{ExecutorKind, MetricSample},
};

use super::probe::{
    IterationContext, Probe, ProbeDescriptor, prerequisite_failed, resource_name, timed,
};

/// Where the Docker daemon listens
#[derive(Debug, Clone, PartialEq, Eq)]
enum Endpoint {
    LocalDefaults,
    Unix(String),
    Http(String),
}

impl Endpoint {
    /// `unix://`, `tcp://`/`http://`, or local defaults when empty
    fn parse(endpoint: &str) -> BenchResult<Self> {
        if endpoint.is_empty() {
            Ok(Self::LocalDefaults)
        } else if endpoint.starts_with("unix://") {
            Ok(Self::Unix(endpoint.to_string()))
        } else if endpoint.starts_with("tcp://") || endpoint.starts_with("http://") {
            Ok(Self::Http(endpoint.to_string()))
        } else {
            Err(BenchError::Configuration(format!(
                "unsupported Docker endpoint: {endpoint}"
            )))
        }
    }

    fn connect(&self, timeout: Duration) -> Result<Docker, bollard::errors::Error> {
        let secs = timeout.as_secs().max(1);
        match self {
            Self::LocalDefaults => Docker::connect_with_local_defaults(),
            Self::Unix(path) => Docker::connect_with_unix(path, secs, API_DEFAULT_VERSION),
            Self::Http(url) => Docker::connect_with_http(url, secs, API_DEFAULT_VERSION),
        }
    }
}

/// Probe talking to the Docker Engine HTTP API
pub struct DockerApiProbe {
    descriptor: ProbeDescriptor,
    endpoint: Endpoint,
    /// Created by `setup`
    docker: OnceLock<Docker>,
    image: String,
    timeout: Duration,
}

impl DockerApiProbe {
    /// Validate the engine's endpoint; the daemon is contacted in `setup`
    pub fn new(engine: &EngineConfig, image: impl Into<String>) -> BenchResult<Self> {
        Ok(Self {
            descriptor: ProbeDescriptor::new(&engine.name, ExecutorKind::Api),
            endpoint: Endpoint::parse(&engine.endpoint)?,
            docker: OnceLock::new(),
            image: image.into(),
            timeout: engine.timeout(),
        })
    }

    fn connect(&self) -> BenchResult<&Docker> {
        if let Some(docker) = self.docker.get() {
            return Ok(docker);
        }
        let docker = self
            .endpoint
            .connect(self.timeout)
            .map_err(|e| BenchError::Unavailable(e.to_string()))?;
        Ok(self.docker.get_or_init(|| docker))
    }

    fn client(&self) -> BenchResult<&Docker> {
        self.docker
            .get()
            .ok_or_else(|| BenchError::Unavailable("Docker client not connected".to_string()))
    }

    fn container_body(&self) -> ContainerCreateBody {
        ContainerCreateBody {
            image: Some(self.image.clone()),
            cmd: Some(KEEPALIVE_COMMAND.iter().map(|s| s.to_string()).collect()),
            labels: Some(HashMap::from([(
                RESOURCE_LABEL.to_string(),
                "true".to_string(),
            )])),
            ..Default::default()
        }
    }

    async fn create(&self, name: &str) -> BenchResult<String> {
        let options = CreateContainerOptionsBuilder::default().name(name).build();
        let created = self
            .client()?
            .create_container(Some(options), self.container_body())
            .await?;
        Ok(created.id)
    }

    async fn start(&self, id: &str) -> BenchResult<()> {
        self.client()?
            .start_container(id, None::<StartContainerOptions>)
            .await?;
        Ok(())
    }

    async fn stop(&self, id: &str) -> BenchResult<()> {
        self.client()?
            .stop_container(id, None::<StopContainerOptions>)
            .await?;
        Ok(())
    }

    async fn remove(&self, id: &str, force: bool) -> BenchResult<()> {
        let options = RemoveContainerOptionsBuilder::default().force(force).build();
        self.client()?.remove_container(id, Some(options)).await?;
        Ok(())
    }

    async fn pull(&self) -> BenchResult<()> {
        let options = CreateImageOptionsBuilder::default()
            .from_image(&self.image)
            .build();
        let mut progress = self.client()?.create_image(Some(options), None, None);
        while let Some(update) = progress.next().await {
            update?;
        }
        Ok(())
    }

    async fn one_stats_snapshot(&self, id: &str) -> BenchResult<()> {
        let options = StatsOptionsBuilder::default().stream(false).build();
        let mut stats = self.client()?.stats(id, Some(options));
        if let Some(snapshot) = stats.next().await {
            snapshot?;
        }
        Ok(())
    }

    async fn count_containers(&self) -> BenchResult<usize> {
        let options = ListContainersOptionsBuilder::default().all(true).build();
        Ok(self.client()?.list_containers(Some(options)).await?.len())
    }

    async fn count_images(&self) -> BenchResult<usize> {
        Ok(self
            .client()?
            .list_images(None::<ListImagesOptions>)
            .await?
            .len())
    }

    async fn remove_quietly(&self, id: &str) {
        if let Err(e) = self.remove(id, true).await {
            tracing::debug!(container = %id, error = %e, "Cleanup remove failed");
        }
    }

    /// Create (and optionally start) a container untimed
    async fn prepare(&self, name: &str, running: bool) -> Result<String, String> {
        let id = self.create(name).await.map_err(|e| e.to_string())?;
        if running {
            if let Err(e) = self.start(&id).await {
                self.remove_quietly(&id).await;
                return Err(e.to_string());
            }
        }
        Ok(id)
    }

    /// Measure one container operation against a private container
    async fn measure_on_container(&self, test: &str, running: bool) -> Vec<MetricSample> {
        let name = resource_name();
        let id = match self.prepare(&name, running).await {
            Ok(id) => id,
            Err(reason) => return vec![prerequisite_failed(test, &reason)],
        };

        let limit = self.timeout;
        let (sample, _) = match test {
            test_names::START_CONTAINER => timed(operations::START_CONTAINER, limit, self.start(&id)).await,
            test_names::STOP_CONTAINER => timed(operations::STOP_CONTAINER, limit, self.stop(&id)).await,
            test_names::REMOVE_CONTAINER => {
                timed(operations::REMOVE_CONTAINER, limit, self.remove(&id, false)).await
            }
            _ => timed(operations::CONTAINER_STATS, limit, self.one_stats_snapshot(&id)).await,
        };

        self.remove_quietly(&id).await;
        vec![
            sample
                .with_metadata("container_name", name)
                .with_metadata("container_id", id),
        ]
    }

    async fn measure_create(&self) -> Vec<MetricSample> {
        let name = resource_name();
        let (sample, id) = timed(operations::CREATE_CONTAINER, self.timeout, self.create(&name)).await;
        let mut sample = sample
            .with_metadata("container_name", name)
            .with_metadata("image", self.image.clone());
        if let Some(id) = id {
            self.remove_quietly(&id).await;
            sample = sample.with_metadata("container_id", id);
        }
        vec![sample]
    }

    async fn measure_lifecycle(&self) -> Vec<MetricSample> {
        let limit = self.timeout;
        let name = resource_name();
        let mut samples = Vec::with_capacity(4);

        let (sample, id) = timed(operations::CREATE_CONTAINER, limit, self.create(&name)).await;
        samples.push(sample.with_metadata("container_name", name));
        let Some(id) = id else {
            return samples;
        };

        let (sample, started) = timed(operations::START_CONTAINER, limit, self.start(&id)).await;
        samples.push(sample);
        if started.is_some() {
            let (sample, stopped) = timed(operations::STOP_CONTAINER, limit, self.stop(&id)).await;
            samples.push(sample);
            if stopped.is_some() {
                let (sample, removed) =
                    timed(operations::REMOVE_CONTAINER, limit, self.remove(&id, false)).await;
                samples.push(sample);
                if removed.is_some() {
                    return samples;
                }
            }
        }

        self.remove_quietly(&id).await;
        samples
    }

    /// IDs of containers created by the harness
    async fn harness_containers(&self) -> BenchResult<Vec<String>> {
        let options = ListContainersOptionsBuilder::default().all(true).build();
        let containers = self.client()?.list_containers(Some(options)).await?;

        Ok(containers
            .into_iter()
            .filter(|c| {
                let labelled = c
                    .labels
                    .as_ref()
                    .is_some_and(|labels| labels.contains_key(RESOURCE_LABEL));
                let named = c.names.as_ref().is_some_and(|names| {
                    names
                        .iter()
                        .any(|n| n.trim_start_matches('/').starts_with(RESOURCE_PREFIX))
                });
                labelled || named
            })
            .filter_map(|c| c.id)
            .collect())
    }
}

#[async_trait]
impl Probe for DockerApiProbe {
    fn descriptor(&self) -> ProbeDescriptor {
        self.descriptor.clone()
    }

    async fn setup(&self) -> BenchResult<()> {
        let version = self
            .connect()?
            .version()
            .await
            .map_err(|e| BenchError::Unavailable(e.to_string()))?;
        tracing::info!(
            engine = %self.descriptor.engine_name,
            version = %version.version.unwrap_or_default(),
            "Connected to Docker"
        );

        for id in self.harness_containers().await? {
            self.remove_quietly(&id).await;
        }
        Ok(())
    }

    async fn teardown(&self) -> BenchResult<()> {
        if self.docker.get().is_none() {
            return Ok(());
        }
        let leftovers = self.harness_containers().await?;
        if !leftovers.is_empty() {
            tracing::info!(engine = %self.descriptor.engine_name, removed = leftovers.len(), "Removing leftover containers");
        }
        for id in &leftovers {
            self.remove_quietly(id).await;
        }
        Ok(())
    }

    async fn run_one_iteration(&self, ctx: &IterationContext) -> BenchResult<Vec<MetricSample>> {
        let limit = self.timeout;
        let samples = match ctx.test_name.as_str() {
            test_names::PULL_IMAGE => {
                let (sample, _) = timed(operations::PULL_IMAGE, limit, self.pull()).await;
                vec![sample.with_metadata("image", self.image.clone())]
            }
            test_names::LIST_CONTAINERS => {
                let (sample, count) =
                    timed(operations::LIST_CONTAINERS, limit, self.count_containers()).await;
                vec![sample.with_metadata("count", count.unwrap_or_default())]
            }
            test_names::LIST_IMAGES => {
                let (sample, count) = timed(operations::LIST_IMAGES, limit, self.count_images()).await;
                vec![sample.with_metadata("count", count.unwrap_or_default())]
            }
            test_names::CREATE_CONTAINER => self.measure_create().await,
            test_names::START_CONTAINER | test_names::REMOVE_CONTAINER => {
                self.measure_on_container(&ctx.test_name, false).await
            }
            test_names::STOP_CONTAINER | test_names::CONTAINER_STATS => {
                self.measure_on_container(&ctx.test_name, true).await
            }
            test_names::CONTAINER_LIFECYCLE => self.measure_lifecycle().await,
            other => return Err(BenchError::UnsupportedTest(other.to_string())),
        };
        Ok(samples)
    }
}
