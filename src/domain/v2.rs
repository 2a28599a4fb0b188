//! Views served by the v2 API revisions, derived from the v1 info types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    ContainerInfo, ContainerSpec, ContainerStats, CpuMetrics, CustomMetric, IoMetrics,
    MemoryMetrics, NetworkMetrics,
};

/// Per-sample stats of the v2.0 `stats` endpoint, gated by the container's `has_*` flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeprecatedContainerStats {
    pub timestamp: DateTime<Utc>,
    pub has_cpu: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuMetrics>,
    pub has_memory: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryMetrics>,
    pub has_network: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkMetrics>,
    pub has_diskio: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diskio: Option<IoMetrics>,
    pub has_custom_metrics: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_metrics: BTreeMap<String, Vec<CustomMetric>>,
}

impl DeprecatedContainerStats {
    pub fn from_v1(info: &ContainerInfo) -> Vec<Self> {
        let spec = &info.spec;
        info.stats
            .iter()
            .map(|s| Self {
                timestamp: s.timestamp,
                has_cpu: spec.has_cpu,
                cpu: spec.has_cpu.then(|| s.cpu.clone()),
                has_memory: spec.has_memory,
                memory: spec.has_memory.then(|| s.memory.clone()),
                has_network: spec.has_network,
                network: spec.has_network.then(|| s.network.clone()),
                has_diskio: spec.has_diskio,
                diskio: spec.has_diskio.then(|| s.diskio.clone()),
                has_custom_metrics: spec.has_custom_metrics,
                custom_metrics: if spec.has_custom_metrics {
                    s.custom_metrics.clone()
                } else {
                    BTreeMap::new()
                },
            })
            .collect()
    }
}

/// CPU usage rate over the interval ending at a sample, in nanocores
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuInstUsage {
    pub total: u64,
    pub user: u64,
    pub system: u64,
}

impl CpuInstUsage {
    /// `None` when the interval is empty or counters went backwards
    pub fn between(prev: &ContainerStats, cur: &ContainerStats) -> Option<Self> {
        let elapsed = (cur.timestamp - prev.timestamp).num_nanoseconds()?;
        if elapsed <= 0 {
            return None;
        }
        let rate = |now: u64, before: u64| -> Option<u64> {
            let delta = now.checked_sub(before)?;
            Some(((delta as u128 * 1_000_000_000) / elapsed as u128) as u64)
        };
        Some(Self {
            total: rate(cur.cpu.total_ns, prev.cpu.total_ns)?,
            user: rate(cur.cpu.user_ns, prev.cpu.user_ns)?,
            system: rate(cur.cpu.system_ns, prev.cpu.system_ns)?,
        })
    }
}

/// Spec as served by v2 endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpecV2 {
    #[serde(flatten)]
    pub spec: ContainerSpec,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

impl ContainerSpecV2 {
    pub fn from_v1(info: &ContainerInfo) -> Self {
        Self {
            spec: info.spec.clone(),
            aliases: info.reference.aliases.clone(),
            namespace: info.reference.namespace.clone(),
        }
    }
}

/// Stats sample as served by v2.1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerStatsV2 {
    pub timestamp: DateTime<Utc>,
    pub cpu: CpuMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_inst: Option<CpuInstUsage>,
    pub memory: MemoryMetrics,
    pub network: NetworkMetrics,
    pub diskio: IoMetrics,
    pub processes: u64,
}

impl ContainerStatsV2 {
    pub fn from_v1(stats: &[ContainerStats]) -> Vec<Self> {
        stats
            .iter()
            .enumerate()
            .map(|(i, s)| Self {
                timestamp: s.timestamp,
                cpu: s.cpu.clone(),
                cpu_inst: i
                    .checked_sub(1)
                    .and_then(|prev| CpuInstUsage::between(&stats[prev], s)),
                memory: s.memory.clone(),
                network: s.network.clone(),
                diskio: s.diskio.clone(),
                processes: s.processes,
            })
            .collect()
    }
}

/// v2.1 per-container answer of the `stats` endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerInfoV2 {
    pub spec: ContainerSpecV2,
    pub stats: Vec<ContainerStatsV2>,
}

impl ContainerInfoV2 {
    pub fn from_v1(info: &ContainerInfo) -> Self {
        Self {
            spec: ContainerSpecV2::from_v1(info),
            stats: ContainerStatsV2::from_v1(&info.stats),
        }
    }
}

/// Machine-wide sample served by v2.1 `machinestats`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineStats {
    pub timestamp: DateTime<Utc>,
    pub cpu: CpuMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_inst: Option<CpuInstUsage>,
    pub memory: MemoryMetrics,
    pub network: NetworkMetrics,
}

impl MachineStats {
    pub fn from_v1(root: Option<&ContainerInfo>) -> Vec<Self> {
        let Some(root) = root else {
            return Vec::new();
        };
        ContainerStatsV2::from_v1(&root.stats)
            .into_iter()
            .map(|s| Self {
                timestamp: s.timestamp,
                cpu: s.cpu,
                cpu_inst: s.cpu_inst,
                memory: s.memory,
                network: s.network,
            })
            .collect()
    }
}

/// Usage at one point or aggregated over a window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    /// CPU in nanocores
    pub cpu: u64,
    /// Memory in bytes
    pub memory: u64,
}

/// Summary served by the v2.0 `summary` endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedStats {
    pub timestamp: DateTime<Utc>,
    pub samples: usize,
    pub latest_usage: Usage,
    pub mean_usage: Usage,
    pub max_usage: Usage,
}

impl DerivedStats {
    /// Summarise an oldest-first history; `None` when it is empty
    pub fn from_v1(stats: &[ContainerStats]) -> Option<Self> {
        let last = stats.last()?;
        let usages: Vec<Usage> = stats
            .windows(2)
            .map(|w| Usage {
                cpu: CpuInstUsage::between(&w[0], &w[1])
                    .map(|c| c.total)
                    .unwrap_or(0),
                memory: w[1].memory.usage_bytes,
            })
            .collect();

        let latest_usage = usages.last().cloned().unwrap_or(Usage {
            cpu: 0,
            memory: last.memory.usage_bytes,
        });

        let (mean_usage, max_usage) = if usages.is_empty() {
            (latest_usage.clone(), latest_usage.clone())
        } else {
            let n = usages.len() as u64;
            let mean = Usage {
                cpu: usages.iter().map(|u| u.cpu).sum::<u64>() / n,
                memory: usages.iter().map(|u| u.memory).sum::<u64>() / n,
            };
            let max = Usage {
                cpu: usages.iter().map(|u| u.cpu).max().unwrap_or(0),
                memory: usages.iter().map(|u| u.memory).max().unwrap_or(0),
            };
            (mean, max)
        };

        Some(Self {
            timestamp: last.timestamp,
            samples: stats.len(),
            latest_usage,
            mean_usage,
            max_usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample(at: DateTime<Utc>, cpu_ns: u64, memory: u64) -> ContainerStats {
        ContainerStats::new(at).with_metrics(
            CpuMetrics::new(cpu_ns, cpu_ns / 2, cpu_ns / 2),
            MemoryMetrics::new(memory, None),
            NetworkMetrics::zero(),
            IoMetrics::zero(),
        )
    }

    #[test]
    fn test_cpu_inst_is_rate_in_nanocores() {
        let t0 = Utc::now();
        let prev = sample(t0, 0, 0);
        let cur = sample(t0 + Duration::seconds(2), 1_000_000_000, 0);
        let inst = CpuInstUsage::between(&prev, &cur).unwrap();
        // one CPU-second over two seconds is half a core
        assert_eq!(inst.total, 500_000_000);
    }

    #[test]
    fn test_cpu_inst_rejects_counter_reset() {
        let t0 = Utc::now();
        let prev = sample(t0, 10, 0);
        let cur = sample(t0 + Duration::seconds(1), 5, 0);
        assert!(CpuInstUsage::between(&prev, &cur).is_none());
    }

    #[test]
    fn test_derived_stats_summary() {
        let t0 = Utc::now();
        let stats = vec![
            sample(t0, 0, 100),
            sample(t0 + Duration::seconds(1), 1_000_000_000, 300),
            sample(t0 + Duration::seconds(2), 1_500_000_000, 200),
        ];
        let derived = DerivedStats::from_v1(&stats).unwrap();
        assert_eq!(derived.samples, 3);
        assert_eq!(derived.latest_usage.memory, 200);
        assert_eq!(derived.latest_usage.cpu, 500_000_000);
        assert_eq!(derived.max_usage.cpu, 1_000_000_000);
        assert_eq!(derived.mean_usage.memory, 250);
        assert!(DerivedStats::from_v1(&[]).is_none());
    }

    #[test]
    fn test_deprecated_stats_respect_capabilities() {
        let info = ContainerInfo {
            reference: crate::domain::ContainerReference::new("/a"),
            subcontainers: Vec::new(),
            spec: ContainerSpec {
                has_cpu: true,
                ..ContainerSpec::default()
            },
            stats: vec![sample(Utc::now(), 1, 1)],
        };
        let out = DeprecatedContainerStats::from_v1(&info);
        assert!(out[0].cpu.is_some());
        assert!(out[0].memory.is_none());
    }
}
