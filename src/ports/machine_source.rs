use async_trait::async_trait;

use crate::domain::MachineInfo;

/// Port for fetching host-level information
#[async_trait]
pub trait MachineSource: Send + Sync {
    /// Hostname, cores, memory capacity, ids and filesystems
    async fn machine_info(&self) -> Result<MachineInfo, Box<dyn std::error::Error + Send + Sync>>;

    /// Running kernel release, e.g. `6.8.0-45-generic`
    async fn kernel_version(&self) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;

    /// Distribution name from os-release, e.g. `Debian GNU/Linux 12 (bookworm)`
    async fn os_version(&self) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

