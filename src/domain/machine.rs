use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mounted filesystem with capacity information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FsInfo {
    pub device: String,
    pub mountpoint: String,
    #[serde(rename = "type")]
    pub fs_type: String,
    pub capacity: u64,
    pub usage: u64,
    pub available: u64,
}

impl FsInfo {
    pub fn new(
        device: String,
        mountpoint: String,
        fs_type: String,
        capacity: u64,
        usage: u64,
        available: u64,
    ) -> Self {
        Self {
            device,
            mountpoint,
            fs_type,
            capacity,
            usage,
            available,
        }
    }

    pub fn usage_percent(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        (self.usage as f64 / self.capacity as f64) * 100.0
    }
}

/// Static description of the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineInfo {
    pub timestamp: DateTime<Utc>,
    pub hostname: String,
    pub num_cores: usize,
    pub memory_capacity: u64,
    #[serde(default)]
    pub machine_id: String,
    #[serde(default)]
    pub boot_id: String,
    #[serde(default)]
    pub kernel_version: String,
    #[serde(default)]
    pub filesystems: Vec<FsInfo>,
}

/// Versions of the daemon and the software it talks to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub kernel_version: String,
    pub container_os_version: String,
    pub docker_version: String,
    pub docker_api_version: String,
    pub cadmon_version: String,
}

/// Host attributes served by the v2 `attributes` endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attributes {
    pub kernel_version: String,
    pub container_os_version: String,
    pub docker_version: String,
    pub docker_api_version: String,
    pub cadmon_version: String,
    pub num_cores: usize,
    pub memory_capacity: u64,
    pub machine_id: String,
    pub boot_id: String,
    pub filesystems: Vec<FsInfo>,
}

impl Attributes {
    pub fn new(machine: &MachineInfo, version: &VersionInfo) -> Self {
        Self {
            kernel_version: version.kernel_version.clone(),
            container_os_version: version.container_os_version.clone(),
            docker_version: version.docker_version.clone(),
            docker_api_version: version.docker_api_version.clone(),
            cadmon_version: version.cadmon_version.clone(),
            num_cores: machine.num_cores,
            memory_capacity: machine.memory_capacity,
            machine_id: machine.machine_id.clone(),
            boot_id: machine.boot_id.clone(),
            filesystems: machine.filesystems.clone(),
        }
    }
}
