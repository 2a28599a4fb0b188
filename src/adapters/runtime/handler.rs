use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bollard::models::ContainerInspectResponse;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::adapters::cgroup::CgroupReader;
use crate::domain::{ContainerReference, ContainerSpec, ContainerStats, ContainerType};
use crate::ports::{ContainerHandler, HandlerError};

use super::RuntimeKind;

/// Engine-side metadata captured when the handler is built
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeMetadata {
    pub id: String,
    /// Engine name without the leading slash
    pub container_name: String,
    pub image: String,
    pub labels: BTreeMap<String, String>,
    pub envs: BTreeMap<String, String>,
    pub created: Option<DateTime<Utc>>,
    /// Init pid, set only when the daemon shares the host pid namespace
    pub pid: Option<i64>,
}

impl RuntimeMetadata {
    pub fn from_inspect(
        inspect: ContainerInspectResponse,
        metadata_env_allow_list: &[String],
        in_host_namespace: bool,
    ) -> Self {
        let config = inspect.config.unwrap_or_default();

        let envs = config
            .env
            .unwrap_or_default()
            .into_iter()
            .filter_map(|entry| {
                let (key, value) = entry.split_once('=')?;
                metadata_env_allow_list
                    .iter()
                    .any(|allowed| allowed == key)
                    .then(|| (key.to_string(), value.to_string()))
            })
            .collect();

        let pid = inspect
            .state
            .and_then(|state| state.pid)
            .filter(|pid| in_host_namespace && *pid > 0);

        Self {
            id: inspect.id.unwrap_or_default(),
            container_name: inspect
                .name
                .unwrap_or_default()
                .trim_start_matches('/')
                .to_string(),
            image: config.image.unwrap_or_default(),
            labels: config.labels.unwrap_or_default().into_iter().collect(),
            envs,
            created: inspect
                .created
                .and_then(|created| DateTime::parse_from_rfc3339(&created).ok())
                .map(|created| created.with_timezone(&Utc)),
            pid,
        }
    }
}

/// Handler for a Docker or Podman container
pub struct RuntimeHandler {
    kind: RuntimeKind,
    name: String,
    path: PathBuf,
    metadata: RuntimeMetadata,
    reader: Arc<CgroupReader>,
}

impl RuntimeHandler {
    pub fn new(
        kind: RuntimeKind,
        name: &str,
        metadata: RuntimeMetadata,
        reader: Arc<CgroupReader>,
    ) -> Self {
        Self {
            kind,
            name: name.to_string(),
            path: reader.path_for(name),
            metadata,
            reader,
        }
    }
}

#[async_trait]
impl ContainerHandler for RuntimeHandler {
    fn reference(&self) -> ContainerReference {
        let mut aliases = Vec::with_capacity(2);
        if !self.metadata.container_name.is_empty() {
            aliases.push(self.metadata.container_name.clone());
        }
        aliases.push(self.metadata.id.clone());

        ContainerReference::new(&self.name)
            .with_aliases(aliases)
            .with_namespace(self.kind.name())
    }

    fn container_type(&self) -> ContainerType {
        self.kind.container_type()
    }

    fn cgroup_path(&self) -> &Path {
        &self.path
    }

    async fn spec(&self) -> Result<ContainerSpec, HandlerError> {
        let mut spec = self.reader.spec(&self.name)?;
        spec.creation_time = self.metadata.created.or(spec.creation_time);
        spec.labels = self.metadata.labels.clone();
        spec.envs = self.metadata.envs.clone();
        spec.image = self.metadata.image.clone();
        spec.has_network = self.metadata.pid.is_some();
        Ok(spec)
    }

    async fn stats(&self) -> Result<ContainerStats, HandlerError> {
        let mut stats = self.reader.sample(&self.name)?;
        if let Some(pid) = self.metadata.pid {
            match self.reader.process_network(pid) {
                Ok(network) => stats.network = network,
                Err(e) => debug!(container = %self.name, error = %e, "network stats unavailable"),
            }
        }
        Ok(stats)
    }
}
