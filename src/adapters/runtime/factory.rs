use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bollard::container::InspectContainerOptions;
use bollard::errors::Error as EngineError;
use bollard::models::ContainerInspectResponse;
use bollard::Docker;
use tracing::debug;

use crate::adapters::cgroup::CgroupReader;
use crate::ports::{Claim, ContainerHandler, ContainerHandlerFactory, FactoryError};

use super::{RuntimeHandler, RuntimeKind, RuntimeMetadata};

/// Factory for containers managed by a Docker-compatible engine
pub struct RuntimeFactory {
    kind: RuntimeKind,
    client: Docker,
    endpoint: String,
    reader: Arc<CgroupReader>,
}

impl RuntimeFactory {
    pub fn new(kind: RuntimeKind, client: Docker, endpoint: impl Into<String>, reader: Arc<CgroupReader>) -> Self {
        Self {
            kind,
            client,
            endpoint: endpoint.into(),
            reader,
        }
    }

    /// `None` when the engine does not know the container
    async fn inspect(&self, id: &str) -> Result<Option<ContainerInspectResponse>, FactoryError> {
        match self
            .client
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
        {
            Ok(inspect) => Ok(Some(inspect)),
            Err(EngineError::DockerResponseServerError { status_code: 404, .. }) => Ok(None),
            Err(e) => Err(FactoryError::Engine(Box::new(e))),
        }
    }
}

#[async_trait]
impl ContainerHandlerFactory for RuntimeFactory {
    fn name(&self) -> &str {
        self.kind.name()
    }

    async fn can_handle_and_accept(&self, name: &str) -> Result<Claim, FactoryError> {
        let Some(id) = self.kind.container_id(name) else {
            return Ok(Claim::Pass);
        };

        let running = self
            .inspect(id)
            .await?
            .and_then(|inspect| inspect.state)
            .and_then(|state| state.running)
            .unwrap_or(false);

        if !running {
            // Leftover cgroup of an exited container
            debug!(runtime = self.kind.name(), container = name, "container is not running");
            return Ok(Claim::Pass);
        }
        Ok(Claim::Accept)
    }

    async fn new_container_handler(
        &self,
        name: &str,
        metadata_env_allow_list: &[String],
        in_host_namespace: bool,
    ) -> Result<Arc<dyn ContainerHandler>, FactoryError> {
        let id = self.kind.container_id(name).ok_or_else(|| {
            FactoryError::Engine(format!("{:?} is not a {} container", name, self.kind.name()).into())
        })?;
        let inspect = self.inspect(id).await?.ok_or_else(|| {
            FactoryError::Engine(format!("container {} no longer exists", id).into())
        })?;

        let metadata = RuntimeMetadata::from_inspect(inspect, metadata_env_allow_list, in_host_namespace);
        Ok(Arc::new(RuntimeHandler::new(
            self.kind,
            name,
            metadata,
            Arc::clone(&self.reader),
        )))
    }

    fn debug_info(&self) -> BTreeMap<String, Vec<String>> {
        BTreeMap::from([("endpoint".to_string(), vec![self.endpoint.clone()])])
    }
}
