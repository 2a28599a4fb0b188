use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::error;

use crate::domain::{
    ContainerInfo, ContainerInfoRequest, Event, EventRequest, MachineInfo, ProcessInfo,
    RequestOptions, VersionInfo,
};

use super::HandlerError;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("unknown container {0:?}")]
    UnknownContainer(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error("{0}")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Result of a multi-container query that may have partially failed
#[derive(Debug, Default)]
pub struct RequestedContainers {
    pub infos: BTreeMap<String, ContainerInfo>,
    pub failures: Vec<(String, ManagerError)>,
}

impl RequestedContainers {
    /// Fails only when nothing at all came back; otherwise logs the failures
    /// and keeps the partial result.
    pub fn into_infos(mut self) -> Result<BTreeMap<String, ContainerInfo>, ManagerError> {
        if self.infos.is_empty() && !self.failures.is_empty() {
            let (_, err) = self.failures.swap_remove(0);
            return Err(err);
        }
        for (name, err) in &self.failures {
            error!(container = %name, error = %err, "partial failure collecting container info");
        }
        Ok(self.infos)
    }
}

/// Live event subscription; the channel closes when the watch is torn down
#[derive(Debug)]
pub struct EventWatch {
    pub id: u64,
    pub events: mpsc::Receiver<Event>,
}

/// Port answering API queries about the host and its containers
#[async_trait]
pub trait Manager: Send + Sync {
    async fn machine_info(&self) -> Result<MachineInfo, ManagerError>;

    async fn version_info(&self) -> Result<VersionInfo, ManagerError>;

    /// Info for one container by cgroup name
    async fn container_info(
        &self,
        name: &str,
        query: &ContainerInfoRequest,
    ) -> Result<ContainerInfo, ManagerError>;

    /// Info for a container and every container below it
    async fn subcontainers_info(
        &self,
        name: &str,
        query: &ContainerInfoRequest,
    ) -> Result<Vec<ContainerInfo>, ManagerError>;

    /// All Docker containers keyed by cgroup name
    async fn all_docker_containers(
        &self,
        query: &ContainerInfoRequest,
    ) -> Result<BTreeMap<String, ContainerInfo>, ManagerError>;

    /// One Docker container by name or id
    async fn docker_container(
        &self,
        name: &str,
        query: &ContainerInfoRequest,
    ) -> Result<ContainerInfo, ManagerError>;

    async fn requested_containers_info(
        &self,
        name: &str,
        options: &RequestOptions,
    ) -> Result<RequestedContainers, ManagerError>;

    async fn process_list(
        &self,
        name: &str,
        options: &RequestOptions,
    ) -> Result<Vec<ProcessInfo>, ManagerError>;

    async fn past_events(&self, request: &EventRequest) -> Result<Vec<Event>, ManagerError>;

    async fn watch_for_events(&self, request: EventRequest) -> Result<EventWatch, ManagerError>;

    /// Tear down a watch created by `watch_for_events`
    fn close_event_watch(&self, id: u64);
}
