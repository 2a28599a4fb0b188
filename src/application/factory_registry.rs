//! Registry deciding which runtime factory owns a discovered container.
//!
//! Factories are registered per [`WatchSource`] at startup. For every
//! discovered container the registry asks the factories of that source, in
//! order, whether they recognize the name; the first one that does owns it.
//! The generic `"raw"` factory can recognize any cgroup, so it is always
//! consulted last: runtime-specific factories get first refusal.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::WatchSource;
use crate::ports::{Claim, ContainerHandler, ContainerHandlerFactory, FactoryError};

/// Identity of the fallback factory that must sort last
pub const RAW_FACTORY_NAME: &str = "raw";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no known factory can handle creation of container {container:?}")]
    NoHandlerFound { container: String },

    #[error("factory {factory:?} failed to check container {container:?}: {source}")]
    Claim {
        container: String,
        factory: String,
        #[source]
        source: FactoryError,
    },

    #[error("factory {factory:?} failed to create handler for container {container:?}: {source}")]
    HandlerConstruction {
        container: String,
        factory: String,
        #[source]
        source: FactoryError,
    },
}

/// Outcome of a successful dispatch
pub enum Dispatch {
    /// A factory accepted the container and built its handler
    Handler {
        factory: String,
        handler: Arc<dyn ContainerHandler>,
    },
    /// A factory recognized the container but excluded it from monitoring
    Ignored { factory: String },
}

impl Dispatch {
    pub fn accepted(&self) -> bool {
        matches!(self, Self::Handler { .. })
    }
}

impl fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handler { factory, handler } => f
                .debug_struct("Handler")
                .field("factory", factory)
                .field("container", &handler.reference().name)
                .finish(),
            Self::Ignored { factory } => {
                f.debug_struct("Ignored").field("factory", factory).finish()
            }
        }
    }
}

/// Snapshot served by the validation endpoint
#[derive(Debug, Clone, Serialize)]
pub struct RegistryDebugInfo {
    /// Factory names per watch source, in dispatch order
    pub sources: BTreeMap<WatchSource, Vec<String>>,
    pub factories: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

/// Per-source ordered factory lists behind one lock.
///
/// The lock only covers copying or mutating the lists; it is never held while
/// a factory is consulted, so one slow runtime cannot stall discovery on the
/// others.
#[derive(Default)]
pub struct FactoryRegistry {
    factories: Mutex<HashMap<WatchSource, Vec<Arc<dyn ContainerHandlerFactory>>>>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `factory` to the list of each source. Duplicates are kept.
    pub fn register(&self, factory: Arc<dyn ContainerHandlerFactory>, sources: &[WatchSource]) {
        info!(factory = factory.name(), ?sources, "Registering container handler factory");
        let mut factories = self.factories.lock();
        for source in sources {
            factories
                .entry(*source)
                .or_default()
                .push(Arc::clone(&factory));
        }
    }

    /// Drop every registration. Meant for test harnesses.
    pub fn clear(&self) {
        self.factories.lock().clear();
    }

    /// Factories of `source` in dispatch order: registration order, with the
    /// ones named `"raw"` moved to the end.
    pub fn reordered_list(&self, source: WatchSource) -> Vec<Arc<dyn ContainerHandlerFactory>> {
        let registered = {
            let factories = self.factories.lock();
            factories.get(&source).cloned().unwrap_or_default()
        };

        let (mut ordered, raw): (Vec<_>, Vec<_>) = registered
            .into_iter()
            .partition(|f| f.name() != RAW_FACTORY_NAME);
        ordered.extend(raw);
        ordered
    }

    /// Find the factory owning `name` and build its handler.
    ///
    /// The first factory that recognizes the name decides: if it does not
    /// accept the container, the result is [`Dispatch::Ignored`] and no
    /// handler is built. An error from a factory's check aborts the dispatch
    /// without consulting the remaining factories.
    pub async fn dispatch(
        &self,
        name: &str,
        source: WatchSource,
        metadata_env_allow_list: &[String],
        in_host_namespace: bool,
    ) -> Result<Dispatch, RegistryError> {
        for factory in self.reordered_list(source) {
            let claim = factory
                .can_handle_and_accept(name)
                .await
                .map_err(|source| RegistryError::Claim {
                    container: name.to_string(),
                    factory: factory.name().to_string(),
                    source,
                })?;

            match claim {
                Claim::Pass => {
                    debug!(factory = factory.name(), container = name, "Factory was unable to handle container");
                }
                Claim::Ignore => {
                    debug!(factory = factory.name(), container = name, "Factory can handle container, but ignoring");
                    return Ok(Dispatch::Ignored {
                        factory: factory.name().to_string(),
                    });
                }
                Claim::Accept => {
                    debug!(factory = factory.name(), container = name, "Using factory for container");
                    let handler = factory
                        .new_container_handler(name, metadata_env_allow_list, in_host_namespace)
                        .await
                        .map_err(|source| RegistryError::HandlerConstruction {
                            container: name.to_string(),
                            factory: factory.name().to_string(),
                            source,
                        })?;
                    return Ok(Dispatch::Handler {
                        factory: factory.name().to_string(),
                        handler,
                    });
                }
            }
        }

        Err(RegistryError::NoHandlerFound {
            container: name.to_string(),
        })
    }

    pub fn debug_info(&self) -> RegistryDebugInfo {
        let mut sources = BTreeMap::new();
        let mut factories = BTreeMap::new();

        for source in WatchSource::ALL {
            let list = self.reordered_list(source);
            if list.is_empty() {
                continue;
            }
            for factory in &list {
                factories
                    .entry(factory.name().to_string())
                    .or_insert_with(|| factory.debug_info());
            }
            sources.insert(source, list.iter().map(|f| f.name().to_string()).collect());
        }

        RegistryDebugInfo { sources, factories }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use crate::domain::{ContainerReference, ContainerSpec, ContainerStats, ContainerType};
    use crate::ports::HandlerError;

    struct FakeHandler {
        name: String,
        path: PathBuf,
    }

    #[async_trait]
    impl ContainerHandler for FakeHandler {
        fn reference(&self) -> ContainerReference {
            ContainerReference::new(&self.name)
        }

        fn container_type(&self) -> ContainerType {
            ContainerType::Raw
        }

        fn cgroup_path(&self) -> &Path {
            &self.path
        }

        async fn spec(&self) -> Result<ContainerSpec, HandlerError> {
            Ok(ContainerSpec::default())
        }

        async fn stats(&self) -> Result<ContainerStats, HandlerError> {
            Ok(ContainerStats::new(chrono::Utc::now()))
        }
    }

    type ClaimFn = dyn Fn(&str) -> Result<Claim, FactoryError> + Send + Sync;

    struct FakeFactory {
        name: String,
        claim: Box<ClaimFn>,
        fail_construction: bool,
        claims: AtomicUsize,
        constructed: AtomicUsize,
    }

    impl FakeFactory {
        fn with(name: &str, claim: impl Fn(&str) -> Result<Claim, FactoryError> + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                claim: Box::new(claim),
                fail_construction: false,
                claims: AtomicUsize::new(0),
                constructed: AtomicUsize::new(0),
            })
        }

        fn fixed(name: &str, claim: Claim) -> Arc<Self> {
            Self::with(name, move |_| Ok(claim))
        }

        fn failing_construction(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                claim: Box::new(|_| Ok(Claim::Accept)),
                fail_construction: true,
                claims: AtomicUsize::new(0),
                constructed: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ContainerHandlerFactory for FakeFactory {
        fn name(&self) -> &str {
            &self.name
        }

        async fn can_handle_and_accept(&self, name: &str) -> Result<Claim, FactoryError> {
            self.claims.fetch_add(1, Ordering::SeqCst);
            (self.claim)(name)
        }

        async fn new_container_handler(
            &self,
            name: &str,
            _metadata_env_allow_list: &[String],
            _in_host_namespace: bool,
        ) -> Result<Arc<dyn ContainerHandler>, FactoryError> {
            self.constructed.fetch_add(1, Ordering::SeqCst);
            if self.fail_construction {
                return Err(FactoryError::Io(std::io::Error::other("cgroup vanished")));
            }
            Ok(Arc::new(FakeHandler {
                name: name.to_string(),
                path: PathBuf::from("/sys/fs/cgroup").join(name.trim_start_matches('/')),
            }))
        }
    }

    fn names(list: &[Arc<dyn ContainerHandlerFactory>]) -> Vec<String> {
        list.iter().map(|f| f.name().to_string()).collect()
    }

    async fn dispatch(registry: &FactoryRegistry, name: &str) -> Result<Dispatch, RegistryError> {
        registry.dispatch(name, WatchSource::Raw, &[], true).await
    }

    #[test]
    fn test_raw_factory_sorts_last() {
        let registry = FactoryRegistry::new();
        registry.register(FakeFactory::fixed("raw", Claim::Pass), &[WatchSource::Raw]);
        registry.register(FakeFactory::fixed("crio", Claim::Pass), &[WatchSource::Raw]);
        registry.register(FakeFactory::fixed("containerd", Claim::Pass), &[WatchSource::Raw]);

        let list = registry.reordered_list(WatchSource::Raw);
        assert_eq!(names(&list), vec!["crio", "containerd", "raw"]);
    }

    #[test]
    fn test_reordering_keeps_every_registration() {
        let registry = FactoryRegistry::new();
        let order = ["docker", "raw", "podman", "docker", "containerd"];
        for name in order {
            registry.register(FakeFactory::fixed(name, Claim::Pass), &[WatchSource::Raw]);
        }

        let list = registry.reordered_list(WatchSource::Raw);
        assert_eq!(list.len(), order.len());
        assert_eq!(names(&list), vec!["docker", "podman", "docker", "containerd", "raw"]);
    }

    #[test]
    fn test_reordering_without_raw_is_identity() {
        let registry = FactoryRegistry::new();
        registry.register(FakeFactory::fixed("b", Claim::Pass), &[WatchSource::Raw]);
        registry.register(FakeFactory::fixed("a", Claim::Pass), &[WatchSource::Raw]);
        assert_eq!(names(&registry.reordered_list(WatchSource::Raw)), vec!["b", "a"]);
    }

    #[test]
    fn test_every_raw_named_factory_anchors_last() {
        let registry = FactoryRegistry::new();
        registry.register(FakeFactory::fixed("raw", Claim::Pass), &[WatchSource::Raw]);
        registry.register(FakeFactory::fixed("docker", Claim::Pass), &[WatchSource::Raw]);
        registry.register(FakeFactory::fixed("raw", Claim::Pass), &[WatchSource::Raw]);
        assert_eq!(
            names(&registry.reordered_list(WatchSource::Raw)),
            vec!["docker", "raw", "raw"]
        );
    }

    #[test]
    fn test_factory_serves_several_sources() {
        let registry = FactoryRegistry::new();
        registry.register(
            FakeFactory::fixed("docker", Claim::Pass),
            &[WatchSource::Raw, WatchSource::Docker],
        );
        registry.register(FakeFactory::fixed("raw", Claim::Pass), &[WatchSource::Raw]);

        assert_eq!(names(&registry.reordered_list(WatchSource::Raw)), vec!["docker", "raw"]);
        assert_eq!(names(&registry.reordered_list(WatchSource::Docker)), vec!["docker"]);
        assert!(registry.reordered_list(WatchSource::Podman).is_empty());
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let registry = FactoryRegistry::new();
        let no1 = FakeFactory::fixed("no1", Claim::Pass);
        let no2 = FakeFactory::fixed("no2", Claim::Pass);
        let yes1 = FakeFactory::fixed("yes1", Claim::Accept);
        let yes2 = FakeFactory::fixed("yes2", Claim::Accept);
        for f in [&no1, &no2, &yes1, &yes2] {
            registry.register(f.clone(), &[WatchSource::Raw]);
        }

        let result = dispatch(&registry, "/test").await.unwrap();
        match result {
            Dispatch::Handler { factory, handler } => {
                assert_eq!(factory, "yes1");
                assert_eq!(handler.reference().name, "/test");
            }
            other => panic!("expected handler, got {:?}", other),
        }
        assert_eq!(yes1.constructed.load(Ordering::SeqCst), 1);
        assert_eq!(yes2.claims.load(Ordering::SeqCst), 0);
        assert_eq!(yes2.constructed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_none_match() {
        let registry = FactoryRegistry::new();
        registry.register(FakeFactory::fixed("no", Claim::Pass), &[WatchSource::Raw]);
        registry.register(FakeFactory::fixed("no", Claim::Pass), &[WatchSource::Raw]);

        let err = dispatch(&registry, "/test").await.unwrap_err();
        assert!(matches!(err, RegistryError::NoHandlerFound { ref container } if container == "/test"));
        assert!(err.to_string().contains("/test"));
    }

    #[tokio::test]
    async fn test_empty_source_finds_nothing() {
        let registry = FactoryRegistry::new();
        registry.register(FakeFactory::fixed("yes", Claim::Accept), &[WatchSource::Docker]);
        assert!(dispatch(&registry, "/test").await.is_err());
    }

    #[tokio::test]
    async fn test_handle_without_accept_is_ignored() {
        let registry = FactoryRegistry::new();
        let cannot_handle = FakeFactory::fixed("no", Claim::Pass);
        let cannot_accept = FakeFactory::fixed("picky", Claim::Ignore);
        registry.register(cannot_handle, &[WatchSource::Raw]);
        registry.register(cannot_accept.clone(), &[WatchSource::Raw]);

        let result = dispatch(&registry, "/test").await.unwrap();
        assert!(!result.accepted());
        assert!(matches!(result, Dispatch::Ignored { ref factory } if factory == "picky"));
        assert_eq!(cannot_accept.constructed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_construction_error_is_tagged() {
        let registry = FactoryRegistry::new();
        registry.register(FakeFactory::failing_construction("docker"), &[WatchSource::Raw]);

        let err = dispatch(&registry, "/docker/abc").await.unwrap_err();
        match &err {
            RegistryError::HandlerConstruction { container, factory, source } => {
                assert_eq!(container, "/docker/abc");
                assert_eq!(factory, "docker");
                assert!(source.to_string().contains("cgroup vanished"));
            }
            other => panic!("unexpected error {:?}", other),
        }
        let message = err.to_string();
        assert!(message.contains("docker") && message.contains("/docker/abc"));
    }

    #[tokio::test]
    async fn test_claim_error_aborts_dispatch() {
        let registry = FactoryRegistry::new();
        let broken = FakeFactory::with("broken", |_| {
            Err(FactoryError::Engine("engine unreachable".into()))
        });
        let fallback = FakeFactory::fixed("raw", Claim::Accept);
        registry.register(fallback.clone(), &[WatchSource::Raw]);
        registry.register(broken, &[WatchSource::Raw]);

        let err = dispatch(&registry, "/test").await.unwrap_err();
        assert!(matches!(err, RegistryError::Claim { ref factory, .. } if factory == "broken"));
        assert_eq!(fallback.claims.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_clear_then_register_observes_only_new_factory() {
        let registry = FactoryRegistry::new();
        registry.register(FakeFactory::fixed("old", Claim::Accept), &[WatchSource::Raw]);
        registry.clear();
        assert!(registry.reordered_list(WatchSource::Raw).is_empty());

        registry.register(FakeFactory::fixed("new", Claim::Accept), &[WatchSource::Raw]);
        let result = dispatch(&registry, "/test").await.unwrap();
        assert!(matches!(result, Dispatch::Handler { ref factory, .. } if factory == "new"));
    }

    #[tokio::test]
    async fn test_raw_fallback_still_catches_non_runtime_paths() {
        let registry = FactoryRegistry::new();
        registry.register(FakeFactory::fixed("raw", Claim::Accept), &[WatchSource::Raw]);
        registry.register(
            FakeFactory::with("docker", |name| {
                Ok(if name.starts_with("/docker/") {
                    Claim::Accept
                } else {
                    Claim::Pass
                })
            }),
            &[WatchSource::Raw],
        );

        let docker = dispatch(&registry, "/docker/abc").await.unwrap();
        assert!(matches!(docker, Dispatch::Handler { ref factory, .. } if factory == "docker"));

        let plain = dispatch(&registry, "/system.slice/sshd.service").await.unwrap();
        assert!(matches!(plain, Dispatch::Handler { ref factory, .. } if factory == "raw"));
    }

    struct SlowFactory {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl ContainerHandlerFactory for SlowFactory {
        fn name(&self) -> &str {
            "slow"
        }

        async fn can_handle_and_accept(&self, _name: &str) -> Result<Claim, FactoryError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(Claim::Ignore)
        }

        async fn new_container_handler(
            &self,
            _name: &str,
            _metadata_env_allow_list: &[String],
            _in_host_namespace: bool,
        ) -> Result<Arc<dyn ContainerHandler>, FactoryError> {
            unreachable!("slow factory never accepts")
        }
    }

    #[tokio::test]
    async fn test_slow_factory_does_not_hold_the_lock() {
        let registry = Arc::new(FactoryRegistry::new());
        let slow = Arc::new(SlowFactory {
            entered: Notify::new(),
            release: Notify::new(),
        });
        registry.register(slow.clone(), &[WatchSource::Docker]);

        let pending = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.dispatch("/docker/x", WatchSource::Docker, &[], true).await })
        };
        slow.entered.notified().await;

        // The slow check is in flight; other discovery paths keep working.
        registry.register(FakeFactory::fixed("raw", Claim::Accept), &[WatchSource::Raw]);
        let raw = dispatch(&registry, "/other").await.unwrap();
        assert!(raw.accepted());

        slow.release.notify_one();
        let result = pending.await.unwrap().unwrap();
        assert!(!result.accepted());
    }

    #[tokio::test]
    async fn test_concurrent_registration_and_dispatch() {
        let registry = Arc::new(FactoryRegistry::new());
        registry.register(FakeFactory::fixed("raw", Claim::Accept), &[WatchSource::Raw]);

        let mut tasks = Vec::new();
        for i in 0..16 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    registry.register(
                        FakeFactory::fixed(&format!("f{}", i), Claim::Pass),
                        &[WatchSource::Raw],
                    );
                    None
                } else {
                    Some(registry.dispatch("/c", WatchSource::Raw, &[], true).await)
                }
            }));
        }

        for task in tasks {
            if let Some(result) = task.await.unwrap() {
                assert!(matches!(result, Ok(Dispatch::Handler { ref factory, .. }) if factory == "raw"));
            }
        }

        let list = registry.reordered_list(WatchSource::Raw);
        assert_eq!(list.len(), 9);
        assert_eq!(list.last().unwrap().name(), "raw");
    }

    #[test]
    fn test_debug_info_lists_sources_in_dispatch_order() {
        let registry = FactoryRegistry::new();
        registry.register(FakeFactory::fixed("raw", Claim::Pass), &[WatchSource::Raw]);
        registry.register(
            FakeFactory::fixed("docker", Claim::Pass),
            &[WatchSource::Raw, WatchSource::Docker],
        );

        let info = registry.debug_info();
        assert_eq!(info.sources[&WatchSource::Raw], vec!["docker", "raw"]);
        assert_eq!(info.sources[&WatchSource::Docker], vec!["docker"]);
        assert_eq!(info.factories.len(), 2);
    }
}
