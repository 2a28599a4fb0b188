use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cadmon::adapters::{
    runtime, CgroupReader, ProcfsAdapter, ProcfsConfig, RawFactory, RawWatcher,
    RuntimeEventWatcher, RuntimeFactory, RuntimeKind,
};
use cadmon::application::{ContainerManager, FactoryRegistry};
use cadmon::config::Config;
use cadmon::domain::WatchSource;
use cadmon::interface::http::create_router;
use cadmon::ports::{ContainerWatcher, Manager};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("cadmon={},tower_http=info", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting cadmon v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: {:?}", config);

    let reader = Arc::new(CgroupReader::new(&config.cgroup_root, &config.proc_path));
    let procfs = ProcfsAdapter::new(ProcfsConfig::new(&config.proc_path, &config.etc_path));

    // Register factories; raw serves every source as the fallback
    let registry = Arc::new(FactoryRegistry::new());
    registry.register(
        Arc::new(RawFactory::new(
            Arc::clone(&reader),
            config.raw_cgroup_prefix_allow_list.clone(),
        )),
        &[WatchSource::Raw, WatchSource::Docker, WatchSource::Podman],
    );

    let mut watchers: Vec<Arc<dyn ContainerWatcher>> = vec![Arc::new(RawWatcher::new(
        Arc::clone(&reader),
        config.manager_config().housekeeping_interval,
    ))];
    let mut engine_version = (String::new(), String::new());

    let engines = [
        (RuntimeKind::Docker, &config.docker_host, config.disable_docker),
        (RuntimeKind::Podman, &config.podman_socket, config.disable_podman),
    ];
    for (kind, socket, disabled) in engines {
        if disabled {
            info!("{} support disabled", kind.name());
            continue;
        }
        let client = match runtime::connect(socket) {
            Ok(client) => client,
            Err(e) => {
                warn!(
                    "Failed to connect to {} at {}: {}. Falling back to raw cgroups.",
                    kind.name(),
                    socket,
                    e
                );
                continue;
            }
        };
        if kind == RuntimeKind::Docker {
            engine_version = runtime::engine_version(&client).await;
        }

        registry.register(
            Arc::new(RuntimeFactory::new(kind, client.clone(), socket.as_str(), Arc::clone(&reader))),
            &[WatchSource::Raw, kind.watch_source()],
        );
        watchers.push(Arc::new(RuntimeEventWatcher::new(kind, client, Arc::clone(&reader))));
        info!("✓ Registered {} factory ({})", kind.name(), socket);
    }

    // Create container manager
    let (version, api_version) = engine_version;
    let manager = Arc::new(
        ContainerManager::new(
            Arc::clone(&registry),
            Arc::new(procfs.machine_source()),
            Arc::new(procfs.process_source()),
            config.manager_config(),
        )
        .with_engine_version(version, api_version),
    );

    for watcher in watchers {
        manager.spawn_watcher(watcher);
    }
    manager.spawn_housekeeping();
    info!("✓ Container manager started");

    // Create HTTP server
    let app = create_router(Arc::clone(&manager) as Arc<dyn Manager>, registry);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("✓ cadmon listening on {}", addr);
    info!("  → API: http://localhost:{}/api/v2.1/machinestats", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
