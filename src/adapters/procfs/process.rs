use std::collections::HashMap;
use std::fs;

use async_trait::async_trait;
use tracing::trace;

use crate::domain::{ProcessInfo, ProcessState};
use crate::ports::ProcessSource;

use super::parser::{self, ParseError};
use super::ProcfsConfig;

/// Typical USER_HZ value
const CLOCK_TICKS: f64 = 100.0;
const PAGE_SIZE: u64 = 4096;

/// Process source implementation using procfs
pub struct ProcfsProcessSource {
    config: ProcfsConfig,
}

impl ProcfsProcessSource {
    pub fn new(config: ProcfsConfig) -> Self {
        Self { config }
    }

    fn list_pids(&self) -> Result<Vec<u32>, ParseError> {
        let mut pids = Vec::new();

        for entry in fs::read_dir(&self.config.proc_path)? {
            let entry = entry?;
            if let Ok(pid) = entry.file_name().to_string_lossy().parse::<u32>() {
                pids.push(pid);
            }
        }

        pids.sort_unstable();
        Ok(pids)
    }

    fn read_process(
        &self,
        pid: u32,
        uptime: f64,
        total_memory: u64,
        users: &HashMap<u32, String>,
    ) -> Result<ProcessInfo, ParseError> {
        let pid_path = self.config.proc_path.join(pid.to_string());

        let stat = parser::parse_proc_stat(&fs::read_to_string(pid_path.join("stat"))?)?;
        let uid = parser::parse_proc_status_uid(&fs::read_to_string(pid_path.join("status"))?)?;
        let user = users.get(&uid).cloned().unwrap_or_else(|| uid.to_string());

        let cmdline = fs::read_to_string(pid_path.join("cmdline")).unwrap_or_default();
        let cmd = if cmdline.is_empty() {
            // Kernel thread
            fs::read_to_string(pid_path.join("comm"))
                .map(|comm| format!("[{}]", comm.trim()))
                .unwrap_or_else(|_| format!("[pid:{}]", pid))
        } else {
            cmdline.replace('\0', " ").trim().to_string()
        };

        let cpu_seconds = (stat.utime + stat.stime) as f64 / CLOCK_TICKS;
        let elapsed = uptime - stat.start_time as f64 / CLOCK_TICKS;
        let percent_cpu = if elapsed > 0.0 {
            cpu_seconds / elapsed * 100.0
        } else {
            0.0
        };

        let rss = stat.rss * PAGE_SIZE;
        let percent_mem = if total_memory > 0 {
            rss as f64 / total_memory as f64 * 100.0
        } else {
            0.0
        };

        let cgroup = fs::read_to_string(pid_path.join("cgroup"))
            .ok()
            .and_then(|content| parser::parse_proc_cgroup(&content))
            .unwrap_or_else(|| "/".to_string());

        Ok(ProcessInfo::new(
            stat.pid,
            stat.ppid,
            user,
            cmd,
            ProcessState::from_char(stat.state),
        )
        .with_metrics(percent_cpu, percent_mem, rss)
        .with_cgroup(cgroup))
    }
}

#[async_trait]
impl ProcessSource for ProcfsProcessSource {
    async fn list_processes(&self) -> Result<Vec<ProcessInfo>, Box<dyn std::error::Error + Send + Sync>> {
        let uptime = parser::parse_uptime(&fs::read_to_string(self.config.proc_path.join("uptime"))?)?;
        let meminfo = parser::parse_meminfo(&fs::read_to_string(self.config.proc_path.join("meminfo"))?)?;
        let total_memory = meminfo.get("MemTotal").copied().unwrap_or(0);
        let users = fs::read_to_string(self.config.etc_path.join("passwd"))
            .map(|content| parser::parse_passwd(&content))
            .unwrap_or_default();

        let mut processes = Vec::new();
        for pid in self.list_pids()? {
            // Processes exit between readdir and read
            match self.read_process(pid, uptime, total_memory, &users) {
                Ok(process) => processes.push(process),
                Err(e) => trace!(pid, error = %e, "skipping process"),
            }
        }

        Ok(processes)
    }
}
