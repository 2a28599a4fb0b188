use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::WatchSource;

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("runtime engine error: {0}")]
    Engine(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Add,
    Delete,
}

/// A container appeared or disappeared on a discovery channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    /// cgroup name, e.g. `/system.slice/docker-<id>.scope`
    pub name: String,
    pub source: WatchSource,
}

impl WatchEvent {
    pub fn add(name: impl Into<String>, source: WatchSource) -> Self {
        Self {
            kind: WatchEventKind::Add,
            name: name.into(),
            source,
        }
    }

    pub fn delete(name: impl Into<String>, source: WatchSource) -> Self {
        Self {
            kind: WatchEventKind::Delete,
            name: name.into(),
            source,
        }
    }
}

/// Port for a discovery channel
#[async_trait]
pub trait ContainerWatcher: Send + Sync {
    fn source(&self) -> WatchSource;

    /// Emit events until the receiving side goes away
    async fn run(&self, events: mpsc::Sender<WatchEvent>) -> Result<(), WatcherError>;
}
