use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bollard::container::ListContainersOptions;
use bollard::system::EventsOptions;
use bollard::Docker;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::adapters::cgroup::CgroupReader;
use crate::domain::WatchSource;
use crate::ports::{ContainerWatcher, WatchEvent, WatcherError};

use super::RuntimeKind;

/// Follows the engine's container start and die events
pub struct RuntimeEventWatcher {
    kind: RuntimeKind,
    client: Docker,
    reader: Arc<CgroupReader>,
}

impl RuntimeEventWatcher {
    pub fn new(kind: RuntimeKind, client: Docker, reader: Arc<CgroupReader>) -> Self {
        Self { kind, client, reader }
    }

    /// Cgroup name of container `id`, whichever cgroup driver is in use
    fn cgroup_name(&self, id: &str) -> String {
        let [systemd, cgroupfs] = self.kind.candidate_cgroups(id);
        if !self.reader.exists(&systemd) && self.reader.exists(&cgroupfs) {
            return cgroupfs;
        }
        systemd
    }
}

#[async_trait]
impl ContainerWatcher for RuntimeEventWatcher {
    fn source(&self) -> WatchSource {
        self.kind.watch_source()
    }

    async fn run(&self, events: mpsc::Sender<WatchEvent>) -> Result<(), WatcherError> {
        let source = self.source();

        // Subscribe first so nothing started during the listing is missed
        let filters = HashMap::from([
            ("type".to_string(), vec!["container".to_string()]),
            ("event".to_string(), vec!["start".to_string(), "die".to_string()]),
        ]);
        let mut stream = self.client.events(Some(EventsOptions::<String> {
            filters,
            ..Default::default()
        }));

        let running = self
            .client
            .list_containers(Some(ListContainersOptions::<String> {
                all: false,
                ..Default::default()
            }))
            .await
            .map_err(|e| WatcherError::Engine(Box::new(e)))?;

        info!(runtime = self.kind.name(), count = running.len(), "Watching runtime containers");
        for container in running {
            let Some(id) = container.id else { continue };
            if events.send(WatchEvent::add(self.cgroup_name(&id), source)).await.is_err() {
                return Ok(());
            }
        }

        while let Some(message) = stream.next().await {
            let message = message.map_err(|e| WatcherError::Engine(Box::new(e)))?;
            let Some(id) = message.actor.and_then(|actor| actor.id) else {
                continue;
            };

            let event = match message.action.as_deref() {
                Some("start") => WatchEvent::add(self.cgroup_name(&id), source),
                Some("die") => WatchEvent::delete(self.cgroup_name(&id), source),
                _ => continue,
            };
            debug!(runtime = self.kind.name(), container = %event.name, kind = ?event.kind, "runtime event");
            if events.send(event).await.is_err() {
                return Ok(());
            }
        }

        Err(WatcherError::Engine("engine event stream closed".into()))
    }
}
