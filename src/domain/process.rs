use serde::{Deserialize, Serialize};

/// Process state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessState {
    Running,
    Sleeping,
    Waiting,
    Zombie,
    Stopped,
    TracingStop,
    Dead,
    Unknown,
}

impl ProcessState {
    pub fn from_char(c: char) -> Self {
        match c {
            'R' => Self::Running,
            'S' => Self::Sleeping,
            'D' => Self::Waiting,
            'Z' => Self::Zombie,
            'T' => Self::Stopped,
            't' => Self::TracingStop,
            'X' | 'x' => Self::Dead,
            _ => Self::Unknown,
        }
    }
}

/// A process as listed by the `ps` endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub ppid: u32,
    pub user: String,
    pub cmd: String,
    pub status: ProcessState,
    pub percent_cpu: f64,
    pub percent_mem: f64,
    pub rss: u64,
    /// cgroup the process belongs to, e.g. `/system.slice/docker-<id>.scope`
    pub cgroup_path: String,
}

impl ProcessInfo {
    pub fn new(pid: u32, ppid: u32, user: String, cmd: String, status: ProcessState) -> Self {
        Self {
            pid,
            ppid,
            user,
            cmd,
            status,
            percent_cpu: 0.0,
            percent_mem: 0.0,
            rss: 0,
            cgroup_path: String::new(),
        }
    }

    pub fn with_metrics(mut self, percent_cpu: f64, percent_mem: f64, rss: u64) -> Self {
        self.percent_cpu = percent_cpu;
        self.percent_mem = percent_mem;
        self.rss = rss;
        self
    }

    pub fn with_cgroup(mut self, cgroup_path: String) -> Self {
        self.cgroup_path = cgroup_path;
        self
    }

    /// Whether the process lives in `container` (or below it when `recursive`)
    pub fn belongs_to(&self, container: &str, recursive: bool) -> bool {
        if self.cgroup_path == container {
            return true;
        }
        if !recursive {
            return false;
        }
        container == "/"
            || self
                .cgroup_path
                .strip_prefix(container)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}
