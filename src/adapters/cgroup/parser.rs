//! Parsers for cgroup v2 interface files.

use std::collections::HashMap;

use crate::domain::{CpuMetrics, IoMetrics, NetworkMetrics};

/// Parse a flat-keyed file such as `cpu.stat` or `memory.stat`
pub fn parse_flat_keyed(content: &str) -> HashMap<String, u64> {
    content
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(' ')?;
            Some((key.to_string(), value.trim().parse().ok()?))
        })
        .collect()
}

/// Parse a single-value counter such as `memory.current`
pub fn parse_counter(content: &str) -> Result<u64, String> {
    let value = content.trim();
    value
        .parse()
        .map_err(|e| format!("invalid counter {:?}: {}", value, e))
}

/// Parse a limit file such as `memory.max`; `max` means unlimited
pub fn parse_limit(content: &str) -> Result<Option<u64>, String> {
    match content.trim() {
        "max" => Ok(None),
        _ => parse_counter(content).map(Some),
    }
}

/// CPU counters from `cpu.stat` (microseconds) converted to nanoseconds
pub fn cpu_from_stat(stat: &HashMap<String, u64>) -> CpuMetrics {
    let usec = |key: &str| stat.get(key).copied().unwrap_or(0) * 1_000;
    let cpu = CpuMetrics::new(usec("usage_usec"), usec("user_usec"), usec("system_usec"));
    match stat.get("throttled_usec") {
        Some(throttled) => cpu.with_throttled(throttled * 1_000),
        None => cpu,
    }
}

/// Sum `rbytes` and `wbytes` over every device line of `io.stat`
pub fn parse_io_stat(content: &str) -> IoMetrics {
    let mut io = IoMetrics::zero();

    for line in content.lines() {
        for field in line.split_whitespace().skip(1) {
            let Some((key, value)) = field.split_once('=') else {
                continue;
            };
            let Ok(value) = value.parse::<u64>() else {
                continue;
            };
            match key {
                "rbytes" => io.read_bytes += value,
                "wbytes" => io.write_bytes += value,
                _ => {}
            }
        }
    }

    io
}

/// Totals of /proc/net/dev, loopback excluded
pub fn parse_net_dev(content: &str) -> NetworkMetrics {
    let mut net = NetworkMetrics::zero();

    for line in content.lines().skip(2) {
        let Some((interface, counters)) = line.split_once(':') else {
            continue;
        };
        if interface.trim() == "lo" {
            continue;
        }
        let fields: Vec<u64> = counters
            .split_whitespace()
            .filter_map(|f| f.parse().ok())
            .collect();
        if fields.len() < 11 {
            continue;
        }
        net.rx_bytes += fields[0];
        net.rx_errors += fields[2];
        net.tx_bytes += fields[8];
        net.tx_errors += fields[10];
    }

    net
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_stat() {
        let content = "usage_usec 2500\nuser_usec 2000\nsystem_usec 500\nnr_periods 0\nthrottled_usec 7\n";
        let cpu = cpu_from_stat(&parse_flat_keyed(content));
        assert_eq!(cpu.total_ns, 2_500_000);
        assert_eq!(cpu.user_ns, 2_000_000);
        assert_eq!(cpu.system_ns, 500_000);
        assert_eq!(cpu.throttled_ns, Some(7_000));
    }

    #[test]
    fn test_limits() {
        assert_eq!(parse_limit("max\n").unwrap(), None);
        assert_eq!(parse_limit("536870912\n").unwrap(), Some(536870912));
        assert!(parse_limit("lots").is_err());
    }

    #[test]
    fn test_io_stat_sums_devices() {
        let content = "8:0 rbytes=100 wbytes=10 rios=1 wios=1 dbytes=0 dios=0\n259:0 rbytes=5 wbytes=1\n";
        assert_eq!(parse_io_stat(content), IoMetrics::new(105, 11));
    }

    #[test]
    fn test_net_dev_skips_loopback() {
        let content = "Inter-|   Receive                                                |  Transmit\n \
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed\n    \
lo: 9999 10 0 0 0 0 0 0 9999 10 0 0 0 0 0 0\n  \
eth0: 1000 10 2 0 0 0 0 0 500 5 1 0 0 0 0 0\n";
        let net = parse_net_dev(content);
        assert_eq!(net, NetworkMetrics::new(1000, 500, 2, 1));
    }
}
