use std::collections::HashSet;
use std::fs;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::domain::{FsInfo, MachineInfo};
use crate::ports::MachineSource;

use super::parser::{self, ParseError};
use super::ProcfsConfig;

/// Filesystem types never reported as storage
const VIRTUAL_FILESYSTEMS: &[&str] = &[
    "proc", "sysfs", "tmpfs", "devtmpfs", "devpts", "cgroup", "cgroup2", "securityfs",
    "debugfs", "tracefs", "pstore", "bpf", "mqueue", "hugetlbfs", "configfs", "fusectl",
    "autofs", "overlay", "nsfs", "squashfs", "binfmt_misc",
];

/// Machine source reading /proc and /etc
pub struct ProcfsMachineSource {
    config: ProcfsConfig,
}

impl ProcfsMachineSource {
    pub fn new(config: ProcfsConfig) -> Self {
        Self { config }
    }

    fn read_proc(&self, relative: &str) -> Result<String, ParseError> {
        Ok(fs::read_to_string(self.config.proc_path.join(relative))?)
    }

    fn read_trimmed(&self, relative: &str) -> String {
        self.read_proc(relative)
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    }

    fn machine_id(&self) -> String {
        fs::read_to_string(self.config.etc_path.join("machine-id"))
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    }

    fn list_filesystems(&self) -> Result<Vec<FsInfo>, ParseError> {
        let mounts = parser::parse_mounts(&self.read_proc("mounts")?);
        let mut seen = HashSet::new();
        let mut filesystems = Vec::new();

        for mount in mounts {
            if VIRTUAL_FILESYSTEMS.contains(&mount.filesystem.as_str()) {
                continue;
            }
            // Bind mounts repeat the same device
            if !seen.insert(mount.device.clone()) {
                continue;
            }

            match nix::sys::statvfs::statvfs(mount.mount_point.as_str()) {
                Ok(stat) => {
                    let block_size = stat.fragment_size() as u64;
                    let capacity = stat.blocks() as u64 * block_size;
                    let available = stat.blocks_available() as u64 * block_size;
                    let free = stat.blocks_free() as u64 * block_size;

                    filesystems.push(FsInfo::new(
                        mount.device,
                        mount.mount_point,
                        mount.filesystem,
                        capacity,
                        capacity.saturating_sub(free),
                        available,
                    ));
                }
                Err(e) => {
                    debug!(mountpoint = %mount.mount_point, error = %e, "statvfs failed, skipping mount");
                }
            }
        }

        Ok(filesystems)
    }
}

#[async_trait]
impl MachineSource for ProcfsMachineSource {
    async fn machine_info(&self) -> Result<MachineInfo, Box<dyn std::error::Error + Send + Sync>> {
        let meminfo = parser::parse_meminfo(&self.read_proc("meminfo")?)?;
        let num_cores = parser::parse_cpu_count(&self.read_proc("stat")?);

        Ok(MachineInfo {
            timestamp: Utc::now(),
            hostname: self.read_trimmed("sys/kernel/hostname"),
            num_cores,
            memory_capacity: meminfo.get("MemTotal").copied().unwrap_or(0),
            machine_id: self.machine_id(),
            boot_id: self.read_trimmed("sys/kernel/random/boot_id"),
            kernel_version: self.read_trimmed("sys/kernel/osrelease"),
            filesystems: self.list_filesystems()?,
        })
    }

    async fn kernel_version(&self) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.read_proc("sys/kernel/osrelease")?.trim().to_string())
    }

    async fn os_version(&self) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let content = fs::read_to_string(self.config.etc_path.join("os-release"))?;
        Ok(parser::parse_os_release(&content).unwrap_or_else(|| "Linux".to_string()))
    }
}
