use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{ContainerReference, ContainerSpec, ContainerStats, ContainerType};

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("container {0:?} no longer exists")]
    Gone(String),

    #[error("runtime engine error: {0}")]
    Engine(String),
}

/// Port for the runtime-specific object representing one monitored container
#[async_trait]
pub trait ContainerHandler: Send + Sync {
    /// Name, aliases and namespace of the container
    fn reference(&self) -> ContainerReference;

    fn container_type(&self) -> ContainerType;

    /// Absolute path of the container's cgroup directory
    fn cgroup_path(&self) -> &Path;

    /// Static description, refreshed on every call
    async fn spec(&self) -> Result<ContainerSpec, HandlerError>;

    /// Take one stats sample
    async fn stats(&self) -> Result<ContainerStats, HandlerError>;
}
