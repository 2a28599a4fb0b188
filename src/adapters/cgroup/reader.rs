use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::adapters::procfs;
use crate::domain::{ContainerSpec, ContainerStats, MemoryMetrics, NetworkMetrics};
use crate::ports::HandlerError;

use super::parser;

/// Reads resource counters from a cgroup v2 hierarchy
#[derive(Debug, Clone)]
pub struct CgroupReader {
    root: PathBuf,
    proc_path: PathBuf,
}

impl CgroupReader {
    pub fn new(root: impl Into<PathBuf>, proc_path: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            proc_path: proc_path.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of the cgroup called `name`
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name.trim_start_matches('/'))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_dir()
    }

    /// Every cgroup below the root, parents before children
    pub fn list_cgroups(&self) -> Vec<String> {
        let mut names = vec!["/".to_string()];
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            // Cgroups may vanish mid-walk
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                if !is_dir {
                    continue;
                }
                let path = entry.path();
                if let Ok(relative) = path.strip_prefix(&self.root) {
                    names.push(format!("/{}", relative.to_string_lossy()));
                }
                pending.push(path);
            }
        }

        names.sort();
        names
    }

    /// Static capabilities of the cgroup
    pub fn spec(&self, name: &str) -> Result<ContainerSpec, HandlerError> {
        let path = self.existing_path(name)?;
        let is_root = name == "/";

        let creation_time = fs::metadata(&path)
            .and_then(|m| m.created().or_else(|_| m.modified()))
            .ok()
            .map(DateTime::<Utc>::from);

        let memory_limit = match read_optional(&path.join("memory.max"))? {
            Some(content) => parse_with(&path.join("memory.max"), parser::parse_limit(&content))?,
            None => None,
        };

        Ok(ContainerSpec {
            creation_time,
            has_cpu: path.join("cpu.stat").exists(),
            has_memory: is_root || path.join("memory.current").exists(),
            memory_limit,
            has_network: is_root,
            has_diskio: path.join("io.stat").exists(),
            has_processes: path.join("cgroup.procs").exists(),
            ..ContainerSpec::default()
        })
    }

    /// Take one sample of the cgroup's counters
    pub fn sample(&self, name: &str) -> Result<ContainerStats, HandlerError> {
        let path = self.existing_path(name)?;

        let cpu = read_optional(&path.join("cpu.stat"))?
            .map(|content| parser::cpu_from_stat(&parser::parse_flat_keyed(&content)))
            .unwrap_or_default();

        let memory = if name == "/" {
            self.host_memory()?
        } else {
            self.cgroup_memory(&path)?
        };

        let network = if name == "/" {
            read_optional(&self.proc_path.join("net/dev"))?
                .map(|content| parser::parse_net_dev(&content))
                .unwrap_or_default()
        } else {
            NetworkMetrics::zero()
        };

        let diskio = read_optional(&path.join("io.stat"))?
            .map(|content| parser::parse_io_stat(&content))
            .unwrap_or_default();

        let processes = match read_optional(&path.join("pids.current"))? {
            Some(content) => parse_with(&path.join("pids.current"), parser::parse_counter(&content))?,
            None => read_optional(&path.join("cgroup.procs"))?
                .map(|content| content.lines().count() as u64)
                .unwrap_or(0),
        };

        Ok(ContainerStats::new(Utc::now())
            .with_metrics(cpu, memory, network, diskio)
            .with_processes(processes))
    }

    /// Network counters seen from inside the namespace of process `pid`
    pub fn process_network(&self, pid: i64) -> Result<NetworkMetrics, HandlerError> {
        let path = self.proc_path.join(pid.to_string()).join("net/dev");
        let content = fs::read_to_string(&path).map_err(|source| HandlerError::Io { path, source })?;
        Ok(parser::parse_net_dev(&content))
    }

    fn existing_path(&self, name: &str) -> Result<PathBuf, HandlerError> {
        let path = self.path_for(name);
        if !path.is_dir() {
            return Err(HandlerError::Gone(name.to_string()));
        }
        Ok(path)
    }

    fn cgroup_memory(&self, path: &Path) -> Result<MemoryMetrics, HandlerError> {
        let current_path = path.join("memory.current");
        let usage = match read_optional(&current_path)? {
            Some(content) => parse_with(&current_path, parser::parse_counter(&content))?,
            None => return Ok(MemoryMetrics::default()),
        };

        let max_path = path.join("memory.max");
        let limit = match read_optional(&max_path)? {
            Some(content) => parse_with(&max_path, parser::parse_limit(&content))?,
            None => None,
        };

        let mut memory = MemoryMetrics::new(usage, limit);
        if let Some(stat) = read_optional(&path.join("memory.stat"))? {
            if let Some(file) = parser::parse_flat_keyed(&stat).get("file") {
                memory = memory.with_cache(*file);
            }
        }
        if let Some(swap) = read_optional(&path.join("memory.swap.current"))? {
            if let Ok(swap) = parser::parse_counter(&swap) {
                memory = memory.with_swap(swap);
            }
        }
        Ok(memory)
    }

    fn host_memory(&self) -> Result<MemoryMetrics, HandlerError> {
        let meminfo_path = self.proc_path.join("meminfo");
        let content = fs::read_to_string(&meminfo_path).map_err(|source| HandlerError::Io {
            path: meminfo_path.clone(),
            source,
        })?;
        let meminfo = procfs::parser::parse_meminfo(&content).map_err(|e| HandlerError::Parse {
            path: meminfo_path,
            message: e.to_string(),
        })?;

        let field = |key: &str| meminfo.get(key).copied().unwrap_or(0);
        let total = field("MemTotal");
        let used = total.saturating_sub(field("MemAvailable"));

        Ok(MemoryMetrics::new(used, Some(total))
            .with_cache(field("Cached") + field("Buffers"))
            .with_swap(field("SwapTotal").saturating_sub(field("SwapFree"))))
    }
}

/// Read a cgroup file that the kernel may not expose for every controller set
fn read_optional(path: &Path) -> Result<Option<String>, HandlerError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(HandlerError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn parse_with<T>(path: &Path, parsed: Result<T, String>) -> Result<T, HandlerError> {
    parsed.map_err(|message| HandlerError::Parse {
        path: path.to_path_buf(),
        message,
    })
}
