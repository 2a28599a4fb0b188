use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::adapters::store::RingBuffer;
use crate::domain::{
    ContainerInfo, ContainerInfoRequest, ContainerReference, ContainerSpec, ContainerStats, Event,
    EventRequest, EventType, IdType, MachineInfo, ProcessInfo, RequestOptions, VersionInfo,
    WatchSource,
};
use crate::ports::{
    ContainerHandler, ContainerWatcher, EventWatch, HandlerError, MachineSource, Manager,
    ManagerError, ProcessSource, RequestedContainers, WatchEvent, WatchEventKind,
};

use super::events::EventStore;
use super::factory_registry::{Dispatch, FactoryRegistry, RegistryError};

/// Delay before a failed watcher is started again
const WATCHER_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("failed to read spec of container {container:?}: {source}")]
    Spec {
        container: String,
        #[source]
        source: HandlerError,
    },
}

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub housekeeping_interval: Duration,
    /// Stats samples kept per container
    pub history_size: usize,
    pub event_history_size: usize,
    pub metadata_env_allow_list: Vec<String>,
    pub in_host_namespace: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            housekeeping_interval: Duration::from_secs(1),
            history_size: 60,
            event_history_size: 1000,
            metadata_env_allow_list: Vec::new(),
            in_host_namespace: true,
        }
    }
}

/// A monitored container and its stats history
struct ContainerData {
    handler: Arc<dyn ContainerHandler>,
    reference: ContainerReference,
    spec: ContainerSpec,
    history: Mutex<RingBuffer<ContainerStats>>,
}

impl ContainerData {
    fn last_update(&self) -> Option<DateTime<Utc>> {
        self.history.lock().latest().map(|s| s.timestamp)
    }

    async fn update_stats(&self) -> Result<(), HandlerError> {
        let stats = self.handler.stats().await?;
        self.history.lock().push(stats);
        Ok(())
    }

    fn info(&self, subcontainers: Vec<ContainerReference>, query: &ContainerInfoRequest) -> ContainerInfo {
        let history = self.history.lock();
        let stats = history.iter().cloned().collect::<Vec<_>>();
        ContainerInfo {
            reference: self.reference.clone(),
            subcontainers,
            spec: self.spec.clone(),
            stats: query.select(&stats),
        }
    }
}

fn parent_of(name: &str) -> Option<&str> {
    if name == "/" {
        return None;
    }
    match name.rsplit_once('/') {
        Some(("", _)) => Some("/"),
        Some((parent, _)) => Some(parent),
        None => None,
    }
}

fn nearest_tracked_ancestor<'a, V>(
    containers: &BTreeMap<String, V>,
    name: &'a str,
) -> Option<&'a str> {
    let mut current = parent_of(name)?;
    while !containers.contains_key(current) {
        current = parent_of(current)?;
    }
    Some(current)
}

fn is_descendant(ancestor: &str, name: &str) -> bool {
    if ancestor == "/" {
        return name != "/";
    }
    name.strip_prefix(ancestor)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Tracks discovered containers, samples them, and answers API queries
pub struct ContainerManager {
    registry: Arc<FactoryRegistry>,
    machine: Arc<dyn MachineSource>,
    processes: Arc<dyn ProcessSource>,
    config: ManagerConfig,
    engine_version: (String, String),
    containers: RwLock<BTreeMap<String, Arc<ContainerData>>>,
    events: EventStore,
}

impl ContainerManager {
    pub fn new(
        registry: Arc<FactoryRegistry>,
        machine: Arc<dyn MachineSource>,
        processes: Arc<dyn ProcessSource>,
        config: ManagerConfig,
    ) -> Self {
        let events = EventStore::new(config.event_history_size);
        Self {
            registry,
            machine,
            processes,
            config,
            engine_version: (String::new(), String::new()),
            containers: RwLock::new(BTreeMap::new()),
            events,
        }
    }

    /// Docker engine and API versions reported by `version_info`
    pub fn with_engine_version(mut self, version: String, api_version: String) -> Self {
        self.engine_version = (version, api_version);
        self
    }

    pub fn registry(&self) -> &Arc<FactoryRegistry> {
        &self.registry
    }

    /// Start monitoring `name` if a factory accepts it.
    ///
    /// Returns whether a new container was added.
    pub async fn add_container(&self, name: &str, source: WatchSource) -> Result<bool, DiscoveryError> {
        if self.containers.read().await.contains_key(name) {
            return Ok(false);
        }

        let handler = match self
            .registry
            .dispatch(
                name,
                source,
                &self.config.metadata_env_allow_list,
                self.config.in_host_namespace,
            )
            .await?
        {
            Dispatch::Handler { handler, .. } => handler,
            Dispatch::Ignored { factory } => {
                debug!(container = name, factory = %factory, "Ignoring container");
                return Ok(false);
            }
        };

        let spec = handler.spec().await.map_err(|source| DiscoveryError::Spec {
            container: name.to_string(),
            source,
        })?;
        let data = Arc::new(ContainerData {
            reference: handler.reference(),
            handler,
            spec,
            history: Mutex::new(RingBuffer::new(self.config.history_size)),
        });

        {
            let mut containers = self.containers.write().await;
            if containers.contains_key(name) {
                return Ok(false);
            }
            containers.insert(name.to_string(), Arc::clone(&data));
        }

        if let Err(e) = data.update_stats().await {
            debug!(container = name, error = %e, "Initial stats sample failed");
        }
        info!(container = name, source = %source, "Added container");
        self.events.publish(Event::new(name, EventType::ContainerCreation));
        Ok(true)
    }

    /// Stop monitoring `name`. Returns whether it was known.
    pub async fn remove_container(&self, name: &str) -> bool {
        let removed = self.containers.write().await.remove(name).is_some();
        if removed {
            info!(container = name, "Removed container");
            self.events.publish(Event::new(name, EventType::ContainerDeletion));
        }
        removed
    }

    pub async fn container_names(&self) -> Vec<String> {
        self.containers.read().await.keys().cloned().collect()
    }

    /// Take one stats sample of every container
    pub async fn housekeep_once(&self) {
        let containers: Vec<(String, Arc<ContainerData>)> = self
            .containers
            .read()
            .await
            .iter()
            .map(|(name, data)| (name.clone(), Arc::clone(data)))
            .collect();

        for (name, data) in containers {
            match data.update_stats().await {
                Ok(()) => {}
                Err(HandlerError::Gone(_)) => {
                    self.remove_container(&name).await;
                }
                Err(e) => warn!(container = %name, error = %e, "Failed to update stats"),
            }
        }
    }

    pub fn spawn_housekeeping(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(manager.config.housekeeping_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                manager.housekeep_once().await;
            }
        })
    }

    /// Run `watcher` and apply its events, restarting it after failures
    pub fn spawn_watcher(self: &Arc<Self>, watcher: Arc<dyn ContainerWatcher>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let source = watcher.source();
            loop {
                let (tx, mut rx) = mpsc::channel(64);
                let consume = async {
                    while let Some(event) = rx.recv().await {
                        manager.handle_watch_event(event).await;
                    }
                };
                let (result, ()) = tokio::join!(watcher.run(tx), consume);

                match result {
                    Ok(()) => {
                        info!(source = %source, "Watcher stopped");
                        return;
                    }
                    Err(e) => {
                        warn!(source = %source, error = %e, "Watcher failed, restarting");
                        tokio::time::sleep(WATCHER_RETRY_DELAY).await;
                    }
                }
            }
        })
    }

    pub async fn handle_watch_event(&self, event: WatchEvent) {
        match event.kind {
            WatchEventKind::Add => match self.add_container(&event.name, event.source).await {
                Ok(_) => {}
                Err(DiscoveryError::Registry(RegistryError::NoHandlerFound { container })) => {
                    warn!(container = %container, source = %event.source, "No factory for container");
                }
                Err(e) => error!(error = %e, "Failed to add container"),
            },
            WatchEventKind::Delete => {
                self.remove_container(&event.name).await;
            }
        }
    }

    /// Record an event observed outside discovery, e.g. an OOM kill
    pub fn publish_event(&self, event: Event) {
        self.events.publish(event);
    }

    async fn get(&self, name: &str) -> Result<Arc<ContainerData>, ManagerError> {
        self.containers
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| ManagerError::UnknownContainer(name.to_string()))
    }

    /// Tracked containers whose nearest tracked ancestor is `name`
    async fn children_of(&self, name: &str) -> Vec<ContainerReference> {
        let containers = self.containers.read().await;
        containers
            .iter()
            .filter(|(child, _)| nearest_tracked_ancestor(&containers, child) == Some(name))
            .map(|(_, data)| data.reference.clone())
            .collect()
    }

    async fn info_for(&self, data: &ContainerData, query: &ContainerInfoRequest) -> ContainerInfo {
        let children = self.children_of(&data.reference.name).await;
        data.info(children, query)
    }

    /// Containers a v2 request refers to, keyed by cgroup name
    async fn resolve(
        &self,
        name: &str,
        options: &RequestOptions,
    ) -> Result<Vec<Arc<ContainerData>>, ManagerError> {
        let containers = self.containers.read().await;

        let Some(namespace) = options.id_type.namespace() else {
            let root = containers
                .get(name)
                .ok_or_else(|| ManagerError::UnknownContainer(name.to_string()))?;
            let mut targets = vec![Arc::clone(root)];
            if options.recursive {
                targets.extend(
                    containers
                        .iter()
                        .filter(|(child, _)| is_descendant(name, child))
                        .map(|(_, data)| Arc::clone(data)),
                );
            }
            return Ok(targets);
        };

        let in_namespace = containers
            .values()
            .filter(|data| data.reference.namespace == namespace);

        let id = name.trim_start_matches('/');
        if id.is_empty() {
            if !options.recursive {
                return Err(ManagerError::InvalidRequest(format!(
                    "a {} container name or id is required unless recursive",
                    options.id_type
                )));
            }
            return Ok(in_namespace.cloned().collect());
        }

        in_namespace
            .filter(|data| data.reference.matches_alias(id))
            .cloned()
            .map(|data| vec![data])
            .next()
            .ok_or_else(|| ManagerError::UnknownContainer(name.to_string()))
    }
}

#[async_trait]
impl Manager for ContainerManager {
    async fn machine_info(&self) -> Result<MachineInfo, ManagerError> {
        self.machine.machine_info().await.map_err(ManagerError::Source)
    }

    async fn version_info(&self) -> Result<VersionInfo, ManagerError> {
        let kernel_version = self
            .machine
            .kernel_version()
            .await
            .map_err(ManagerError::Source)?;
        let container_os_version = self.machine.os_version().await.map_err(ManagerError::Source)?;

        Ok(VersionInfo {
            kernel_version,
            container_os_version,
            docker_version: self.engine_version.0.clone(),
            docker_api_version: self.engine_version.1.clone(),
            cadmon_version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    async fn container_info(
        &self,
        name: &str,
        query: &ContainerInfoRequest,
    ) -> Result<ContainerInfo, ManagerError> {
        let data = self.get(name).await?;
        Ok(self.info_for(&data, query).await)
    }

    async fn subcontainers_info(
        &self,
        name: &str,
        query: &ContainerInfoRequest,
    ) -> Result<Vec<ContainerInfo>, ManagerError> {
        let matching: Vec<Arc<ContainerData>> = self
            .containers
            .read()
            .await
            .iter()
            .filter(|(candidate, _)| candidate.as_str() == name || is_descendant(name, candidate))
            .map(|(_, data)| Arc::clone(data))
            .collect();

        if matching.is_empty() {
            return Err(ManagerError::UnknownContainer(name.to_string()));
        }

        let mut infos = Vec::with_capacity(matching.len());
        for data in matching {
            infos.push(self.info_for(&data, query).await);
        }
        Ok(infos)
    }

    async fn all_docker_containers(
        &self,
        query: &ContainerInfoRequest,
    ) -> Result<BTreeMap<String, ContainerInfo>, ManagerError> {
        let docker: Vec<Arc<ContainerData>> = self
            .containers
            .read()
            .await
            .values()
            .filter(|data| data.reference.namespace == "docker")
            .cloned()
            .collect();

        let mut infos = BTreeMap::new();
        for data in docker {
            infos.insert(data.reference.name.clone(), self.info_for(&data, query).await);
        }
        Ok(infos)
    }

    async fn docker_container(
        &self,
        name: &str,
        query: &ContainerInfoRequest,
    ) -> Result<ContainerInfo, ManagerError> {
        let options = RequestOptions {
            id_type: IdType::Docker,
            ..RequestOptions::default()
        };
        let data = self
            .resolve(name, &options)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ManagerError::UnknownContainer(name.to_string()))?;
        Ok(self.info_for(&data, query).await)
    }

    async fn requested_containers_info(
        &self,
        name: &str,
        options: &RequestOptions,
    ) -> Result<RequestedContainers, ManagerError> {
        let targets = self.resolve(name, options).await?;
        let num_stats = i32::try_from(options.count).unwrap_or(i32::MAX);
        let query = ContainerInfoRequest::with_num_stats(num_stats);
        let mut requested = RequestedContainers::default();

        for data in targets {
            let container = data.reference.name.clone();

            if let Some(max_age) = options.max_age {
                let stale = data.last_update().map_or(true, |last| {
                    Utc::now()
                        .signed_duration_since(last)
                        .to_std()
                        .map_or(false, |age| age > max_age)
                });
                if stale {
                    if let Err(e) = data.update_stats().await {
                        requested.failures.push((container, ManagerError::Handler(e)));
                        continue;
                    }
                }
            }

            let info = self.info_for(&data, &query).await;
            requested.infos.insert(container, info);
        }

        Ok(requested)
    }

    async fn process_list(
        &self,
        name: &str,
        options: &RequestOptions,
    ) -> Result<Vec<ProcessInfo>, ManagerError> {
        let targets: Vec<String> = self
            .resolve(name, options)
            .await?
            .into_iter()
            .map(|data| data.reference.name.clone())
            .collect();

        let processes = self
            .processes
            .list_processes()
            .await
            .map_err(ManagerError::Source)?;

        Ok(processes
            .into_iter()
            .filter(|process| {
                targets
                    .iter()
                    .any(|target| process.belongs_to(target, options.recursive))
            })
            .collect())
    }

    async fn past_events(&self, request: &EventRequest) -> Result<Vec<Event>, ManagerError> {
        Ok(self.events.past(request))
    }

    async fn watch_for_events(&self, request: EventRequest) -> Result<EventWatch, ManagerError> {
        Ok(self.events.watch(request))
    }

    fn close_event_watch(&self, id: u64) {
        self.events.close(id);
    }
}
