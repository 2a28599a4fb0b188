use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CpuMetrics, CustomMetric, IoMetrics, MemoryMetrics, NetworkMetrics};

/// Runtime that owns a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerType {
    Raw,
    Docker,
    Podman,
}

/// Identity of a container: its cgroup name plus any runtime aliases
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerReference {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

impl ContainerReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            namespace: String::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn matches_alias(&self, alias: &str) -> bool {
        self.aliases.iter().any(|a| a == alias)
    }
}

/// Static description of a container
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub envs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    pub has_cpu: bool,
    pub has_memory: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<u64>,
    pub has_network: bool,
    pub has_diskio: bool,
    pub has_processes: bool,
    pub has_custom_metrics: bool,
}

/// One sample of a container's resource usage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerStats {
    pub timestamp: DateTime<Utc>,
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
    pub network: NetworkMetrics,
    pub diskio: IoMetrics,
    #[serde(default)]
    pub processes: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_metrics: BTreeMap<String, Vec<CustomMetric>>,
}

impl ContainerStats {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            cpu: CpuMetrics::default(),
            memory: MemoryMetrics::default(),
            network: NetworkMetrics::zero(),
            diskio: IoMetrics::zero(),
            processes: 0,
            custom_metrics: BTreeMap::new(),
        }
    }

    pub fn with_metrics(
        mut self,
        cpu: CpuMetrics,
        memory: MemoryMetrics,
        network: NetworkMetrics,
        diskio: IoMetrics,
    ) -> Self {
        self.cpu = cpu;
        self.memory = memory;
        self.network = network;
        self.diskio = diskio;
        self
    }

    pub fn with_processes(mut self, processes: u64) -> Self {
        self.processes = processes;
        self
    }
}

/// Everything known about one container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerInfo {
    #[serde(flatten)]
    pub reference: ContainerReference,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subcontainers: Vec<ContainerReference>,
    pub spec: ContainerSpec,
    #[serde(default)]
    pub stats: Vec<ContainerStats>,
}

impl ContainerInfo {
    pub fn name(&self) -> &str {
        &self.reference.name
    }
}

/// Body of v1 container queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerInfoRequest {
    /// Max number of stats to return, newest last; -1 returns all
    #[serde(default = "default_num_stats")]
    pub num_stats: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

fn default_num_stats() -> i32 {
    60
}

impl Default for ContainerInfoRequest {
    fn default() -> Self {
        Self {
            num_stats: default_num_stats(),
            start: None,
            end: None,
        }
    }
}

impl ContainerInfoRequest {
    pub fn with_num_stats(num_stats: i32) -> Self {
        Self {
            num_stats,
            ..Self::default()
        }
    }

    /// Pick the samples this request asks for from an oldest-first history
    pub fn select(&self, history: &[ContainerStats]) -> Vec<ContainerStats> {
        let in_range: Vec<&ContainerStats> = history
            .iter()
            .filter(|s| self.start.map_or(true, |start| s.timestamp >= start))
            .filter(|s| self.end.map_or(true, |end| s.timestamp <= end))
            .collect();

        let skip = match usize::try_from(self.num_stats) {
            Ok(n) => in_range.len().saturating_sub(n),
            Err(_) => 0,
        };

        in_range.into_iter().skip(skip).cloned().collect()
    }
}
