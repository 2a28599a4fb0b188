use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tempfile::TempDir;

use cadmon::adapters::cgroup::RawHandler;
use cadmon::adapters::{CgroupReader, RawFactory};
use cadmon::application::{ContainerManager, FactoryRegistry, ManagerConfig};
use cadmon::domain::{
    ContainerReference, ContainerSpec, ContainerStats, ContainerType, FsInfo, MachineInfo,
    ProcessInfo, WatchSource,
};
use cadmon::interface::http::create_router;
use cadmon::ports::{
    Claim, ContainerHandler, ContainerHandlerFactory, FactoryError, HandlerError, MachineSource,
    ProcessSource,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub const CONTAINER_ID: &str = "4f1c2a9b7e3d4c5a6b7c8d9e0f1a2b3c4d5e6f708192a3b4c5d6e7f8091a2b3c";
pub const CONTAINER_NAME: &str = "web";

pub fn docker_cgroup() -> String {
    format!("/docker/{}", CONTAINER_ID)
}

struct StaticMachine;

#[async_trait]
impl MachineSource for StaticMachine {
    async fn machine_info(&self) -> Result<MachineInfo, BoxError> {
        Ok(MachineInfo {
            timestamp: Utc::now(),
            hostname: "test-node".to_string(),
            num_cores: 2,
            memory_capacity: 4 << 20,
            machine_id: "machine-1".to_string(),
            boot_id: "boot-1".to_string(),
            kernel_version: "6.8.0".to_string(),
            filesystems: vec![FsInfo::new(
                "/dev/vda1".to_string(),
                "/".to_string(),
                "ext4".to_string(),
                1000,
                400,
                600,
            )],
        })
    }

    async fn kernel_version(&self) -> Result<String, BoxError> {
        Ok("6.8.0".to_string())
    }

    async fn os_version(&self) -> Result<String, BoxError> {
        Ok("Test Linux".to_string())
    }
}

struct NoProcesses;

#[async_trait]
impl ProcessSource for NoProcesses {
    async fn list_processes(&self) -> Result<Vec<ProcessInfo>, BoxError> {
        Ok(Vec::new())
    }
}

/// Engine-style factory for `/docker/<id>` cgroups, without an engine
struct LabelledFactory {
    reader: Arc<CgroupReader>,
}

struct LabelledHandler {
    raw: RawHandler,
    id: String,
}

#[async_trait]
impl ContainerHandlerFactory for LabelledFactory {
    fn name(&self) -> &str {
        "docker"
    }

    async fn can_handle_and_accept(&self, name: &str) -> Result<Claim, FactoryError> {
        match name.strip_prefix("/docker/") {
            Some(id) if id == CONTAINER_ID => Ok(Claim::Accept),
            _ => Ok(Claim::Pass),
        }
    }

    async fn new_container_handler(
        &self,
        name: &str,
        _metadata_env_allow_list: &[String],
        _in_host_namespace: bool,
    ) -> Result<Arc<dyn ContainerHandler>, FactoryError> {
        Ok(Arc::new(LabelledHandler {
            raw: RawHandler::new(name, Arc::clone(&self.reader))?,
            id: CONTAINER_ID.to_string(),
        }))
    }
}

#[async_trait]
impl ContainerHandler for LabelledHandler {
    fn reference(&self) -> ContainerReference {
        self.raw
            .reference()
            .with_aliases(vec![CONTAINER_NAME.to_string(), self.id.clone()])
            .with_namespace("docker")
    }

    fn container_type(&self) -> ContainerType {
        ContainerType::Docker
    }

    fn cgroup_path(&self) -> &Path {
        self.raw.cgroup_path()
    }

    async fn spec(&self) -> Result<ContainerSpec, HandlerError> {
        let mut spec = self.raw.spec().await?;
        spec.image = "nginx:1.27".to_string();
        Ok(spec)
    }

    async fn stats(&self) -> Result<ContainerStats, HandlerError> {
        self.raw.stats().await
    }
}

fn write_tree(dir: &Path) -> Arc<CgroupReader> {
    let root = dir.join("cgroup");
    let proc_path = dir.join("proc");

    fs::create_dir_all(proc_path.join("net")).unwrap();
    fs::write(
        proc_path.join("meminfo"),
        "MemTotal: 4096 kB\nMemAvailable: 2048 kB\nCached: 256 kB\nBuffers: 0 kB\n",
    )
    .unwrap();
    fs::write(
        proc_path.join("net/dev"),
        "Inter-|\n face |\n eth0: 100 1 0 0 0 0 0 0 200 2 0 0 0 0 0 0\n",
    )
    .unwrap();

    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("cpu.stat"), "usage_usec 500\nuser_usec 300\nsystem_usec 200\n").unwrap();

    let service = root.join("system.slice/sshd.service");
    fs::create_dir_all(&service).unwrap();
    fs::write(service.join("cpu.stat"), "usage_usec 50\nuser_usec 30\nsystem_usec 20\n").unwrap();
    fs::write(service.join("memory.current"), "4096\n").unwrap();
    fs::write(service.join("memory.max"), "max\n").unwrap();
    fs::write(service.join("pids.current"), "1\n").unwrap();

    let container = root.join("docker").join(CONTAINER_ID);
    fs::create_dir_all(&container).unwrap();
    fs::write(container.join("memory.current"), "8192\n").unwrap();
    fs::write(container.join("memory.max"), "65536\n").unwrap();

    Arc::new(CgroupReader::new(root, proc_path))
}

/// A daemon wired to a fake cgroup tree and serving on an ephemeral port
pub struct TestDaemon {
    pub base_url: String,
    pub manager: Arc<ContainerManager>,
    _dir: TempDir,
}

impl TestDaemon {
    pub async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let reader = write_tree(dir.path());

        let registry = Arc::new(FactoryRegistry::new());
        registry.register(
            Arc::new(RawFactory::new(Arc::clone(&reader), Vec::new())),
            &[WatchSource::Raw, WatchSource::Docker],
        );
        registry.register(
            Arc::new(LabelledFactory {
                reader: Arc::clone(&reader),
            }),
            &[WatchSource::Raw, WatchSource::Docker],
        );

        let manager = Arc::new(ContainerManager::new(
            Arc::clone(&registry),
            Arc::new(StaticMachine),
            Arc::new(NoProcesses),
            ManagerConfig::default(),
        ));
        for name in reader.list_cgroups() {
            manager.add_container(&name, WatchSource::Raw).await.unwrap();
        }

        let app = create_router(Arc::clone(&manager) as _, registry);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            manager,
            _dir: dir,
        }
    }
}
