use serde::{Deserialize, Serialize};

/// Cumulative CPU usage of a cgroup, in nanoseconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuMetrics {
    pub total_ns: u64,
    pub user_ns: u64,
    pub system_ns: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throttled_ns: Option<u64>,
}

impl CpuMetrics {
    pub fn new(total_ns: u64, user_ns: u64, system_ns: u64) -> Self {
        Self {
            total_ns,
            user_ns,
            system_ns,
            throttled_ns: None,
        }
    }

    pub fn with_throttled(mut self, throttled_ns: u64) -> Self {
        self.throttled_ns = Some(throttled_ns);
        self
    }
}

/// Memory metrics for a machine or container
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetrics {
    pub usage_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_bytes: Option<u64>, // None when unlimited
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_bytes: Option<u64>,
}

impl MemoryMetrics {
    pub fn new(usage_bytes: u64, limit_bytes: Option<u64>) -> Self {
        Self {
            usage_bytes,
            limit_bytes,
            cache_bytes: None,
            swap_bytes: None,
        }
    }

    pub fn with_cache(mut self, cache_bytes: u64) -> Self {
        self.cache_bytes = Some(cache_bytes);
        self
    }

    pub fn with_swap(mut self, swap_bytes: u64) -> Self {
        self.swap_bytes = Some(swap_bytes);
        self
    }

    pub fn usage_percent(&self) -> Option<f64> {
        match self.limit_bytes {
            Some(0) | None => None,
            Some(limit) => Some((self.usage_bytes as f64 / limit as f64) * 100.0),
        }
    }
}

/// Block I/O counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IoMetrics {
    pub read_bytes: u64,
    pub write_bytes: u64,
}

impl IoMetrics {
    pub fn new(read_bytes: u64, write_bytes: u64) -> Self {
        Self {
            read_bytes,
            write_bytes,
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}

/// Network counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkMetrics {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
}

impl NetworkMetrics {
    pub fn new(rx_bytes: u64, tx_bytes: u64, rx_errors: u64, tx_errors: u64) -> Self {
        Self {
            rx_bytes,
            tx_bytes,
            rx_errors,
            tx_errors,
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}

/// Application-reported metric sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomMetric {
    pub label: String,
    pub value: f64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}
