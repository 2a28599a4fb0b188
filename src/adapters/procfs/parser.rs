use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Missing field: {0}")]
    MissingField(String),
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parse /proc/uptime into seconds since boot
pub fn parse_uptime(content: &str) -> ParseResult<f64> {
    let first = content
        .split_whitespace()
        .next()
        .ok_or_else(|| ParseError::Parse("Empty uptime file".to_string()))?;

    first
        .parse::<f64>()
        .map_err(|e| ParseError::Parse(format!("Invalid uptime value: {}", e)))
}

/// Count the per-CPU lines (`cpu0`, `cpu1`, ...) of /proc/stat
pub fn parse_cpu_count(content: &str) -> usize {
    content
        .lines()
        .filter(|line| {
            line.strip_prefix("cpu")
                .and_then(|rest| rest.chars().next())
                .is_some_and(|c| c.is_ascii_digit())
        })
        .count()
}

/// Parse /proc/meminfo into a map of bytes
pub fn parse_meminfo(content: &str) -> ParseResult<HashMap<String, u64>> {
    let mut map = HashMap::new();

    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value_str = value.trim().trim_end_matches(" kB");

        if let Ok(value) = value_str.parse::<u64>() {
            map.insert(key.trim().to_string(), value * 1024);
        }
    }

    if map.is_empty() {
        return Err(ParseError::Parse("Empty meminfo file".to_string()));
    }
    Ok(map)
}

#[derive(Debug, Clone)]
pub struct MountInfo {
    pub device: String,
    pub mount_point: String,
    pub filesystem: String,
}

/// Parse /proc/mounts
pub fn parse_mounts(content: &str) -> Vec<MountInfo> {
    content
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            Some(MountInfo {
                device: parts.next()?.to_string(),
                mount_point: parts.next()?.replace("\\040", " "),
                filesystem: parts.next()?.to_string(),
            })
        })
        .collect()
}

/// Fields of /proc/{pid}/stat used by the process listing
#[derive(Debug, Clone, PartialEq)]
pub struct ProcStat {
    pub pid: u32,
    pub ppid: u32,
    pub state: char,
    pub utime: u64,
    pub stime: u64,
    /// Clock ticks after boot at which the process started
    pub start_time: u64,
    /// Resident set size in pages
    pub rss: u64,
}

/// Parse /proc/{pid}/stat
pub fn parse_proc_stat(content: &str) -> ParseResult<ProcStat> {
    // Format: pid (comm) state ppid ... ; comm may contain spaces and parentheses
    let start = content.find('(').ok_or_else(|| ParseError::Parse("No ( found".to_string()))?;
    let end = content.rfind(')').ok_or_else(|| ParseError::Parse("No ) found".to_string()))?;

    let pid_str = content[..start].trim();
    let parts: Vec<&str> = content[end + 1..].split_whitespace().collect();
    if parts.len() < 22 {
        return Err(ParseError::Parse("Incomplete proc stat".to_string()));
    }

    let field = |index: usize, name: &str| -> ParseResult<u64> {
        parts[index]
            .parse()
            .map_err(|e| ParseError::Parse(format!("{}: {}", name, e)))
    };

    Ok(ProcStat {
        pid: pid_str.parse().map_err(|e| ParseError::Parse(format!("pid: {}", e)))?,
        ppid: parts[1].parse().map_err(|e| ParseError::Parse(format!("ppid: {}", e)))?,
        state: parts[0].chars().next().unwrap_or('?'),
        utime: field(11, "utime")?,
        stime: field(12, "stime")?,
        start_time: field(19, "starttime")?,
        rss: field(21, "rss")?,
    })
}

/// Parse /proc/{pid}/status for the real UID
pub fn parse_proc_status_uid(content: &str) -> ParseResult<u32> {
    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("Uid:") {
            if let Some(uid) = rest.split_whitespace().next() {
                return uid
                    .parse()
                    .map_err(|e| ParseError::Parse(format!("uid: {}", e)));
            }
        }
    }
    Err(ParseError::MissingField("Uid".to_string()))
}

/// Parse /proc/{pid}/cgroup into the process's cgroup path.
///
/// The unified (`0::`) entry wins; on v1-only hosts the memory controller's
/// path is used.
pub fn parse_proc_cgroup(content: &str) -> Option<String> {
    let mut v1_memory = None;

    for line in content.lines() {
        let mut parts = line.splitn(3, ':');
        let (Some(id), Some(controllers), Some(path)) = (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        if id == "0" && controllers.is_empty() {
            return Some(path.to_string());
        }
        if controllers.split(',').any(|c| c == "memory") {
            v1_memory = Some(path.to_string());
        }
    }

    v1_memory
}

/// Map uid to user name from an /etc/passwd file
pub fn parse_passwd(content: &str) -> HashMap<u32, String> {
    content
        .lines()
        .filter_map(|line| {
            let mut parts = line.split(':');
            let name = parts.next()?;
            let uid = parts.nth(1)?.parse().ok()?;
            Some((uid, name.to_string()))
        })
        .collect()
}

/// `PRETTY_NAME` from an os-release file
pub fn parse_os_release(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        line.strip_prefix("PRETTY_NAME=")
            .map(|value| value.trim().trim_matches('"').to_string())
    })
}
