use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::application::ManagerConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value {value:?} for {key}")]
    Env { key: String, value: String },
}

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub log_level: String,
    pub housekeeping_interval: u64,
    pub history_size: usize,
    pub event_history_size: usize,
    pub cgroup_root: PathBuf,
    pub proc_path: PathBuf,
    pub etc_path: PathBuf,
    pub docker_host: String,
    pub podman_socket: String,
    pub metadata_env_allow_list: Vec<String>,
    pub in_host_namespace: bool,
    pub raw_cgroup_prefix_allow_list: Vec<String>,
    pub disable_docker: bool,
    pub disable_podman: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            log_level: "info".to_string(),
            housekeeping_interval: 1,
            history_size: 60,
            event_history_size: 1000,
            cgroup_root: PathBuf::from("/sys/fs/cgroup"),
            proc_path: PathBuf::from("/proc"),
            etc_path: PathBuf::from("/etc"),
            docker_host: "unix:///var/run/docker.sock".to_string(),
            podman_socket: "unix:///run/podman/podman.sock".to_string(),
            metadata_env_allow_list: Vec::new(),
            in_host_namespace: true,
            raw_cgroup_prefix_allow_list: Vec::new(),
            disable_docker: false,
            disable_podman: false,
        }
    }
}

/// Optional settings read from the file named by `CADMON_CONFIG`
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    port: Option<u16>,
    log_level: Option<String>,
    housekeeping_interval: Option<u64>,
    history_size: Option<usize>,
    event_history_size: Option<usize>,
    cgroup_root: Option<PathBuf>,
    proc_path: Option<PathBuf>,
    etc_path: Option<PathBuf>,
    docker_host: Option<String>,
    podman_socket: Option<String>,
    metadata_env_allow_list: Option<Vec<String>>,
    in_host_namespace: Option<bool>,
    raw_cgroup_prefix_allow_list: Option<Vec<String>>,
    disable_docker: Option<bool>,
    disable_podman: Option<bool>,
}

impl Config {
    /// Defaults, then the TOML file named by `CADMON_CONFIG`, then `CADMON_*`
    /// variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(|key| env::var(key).ok())
    }

    fn load(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = var("CADMON_CONFIG") {
            config.apply_file(Self::read_file(Path::new(&path))?);
        }
        config.apply_env(var)?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::File {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_file(&mut self, file: FileConfig) {
        fn set<T>(target: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *target = value;
            }
        }

        set(&mut self.port, file.port);
        set(&mut self.log_level, file.log_level);
        set(&mut self.housekeeping_interval, file.housekeeping_interval);
        set(&mut self.history_size, file.history_size);
        set(&mut self.event_history_size, file.event_history_size);
        set(&mut self.cgroup_root, file.cgroup_root);
        set(&mut self.proc_path, file.proc_path);
        set(&mut self.etc_path, file.etc_path);
        set(&mut self.docker_host, file.docker_host);
        set(&mut self.podman_socket, file.podman_socket);
        set(&mut self.metadata_env_allow_list, file.metadata_env_allow_list);
        set(&mut self.in_host_namespace, file.in_host_namespace);
        set(&mut self.raw_cgroup_prefix_allow_list, file.raw_cgroup_prefix_allow_list);
        set(&mut self.disable_docker, file.disable_docker);
        set(&mut self.disable_podman, file.disable_podman);
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        fn parse<T: FromStr>(
            target: &mut T,
            key: &str,
            var: &impl Fn(&str) -> Option<String>,
        ) -> Result<(), ConfigError> {
            if let Some(value) = var(key) {
                *target = value.trim().parse().map_err(|_| ConfigError::Env {
                    key: key.to_string(),
                    value: value.clone(),
                })?;
            }
            Ok(())
        }
        fn list(value: String) -> Vec<String> {
            value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        }

        parse(&mut self.port, "CADMON_PORT", &var)?;
        parse(&mut self.housekeeping_interval, "CADMON_HOUSEKEEPING_INTERVAL", &var)?;
        parse(&mut self.history_size, "CADMON_HISTORY_SIZE", &var)?;
        parse(&mut self.event_history_size, "CADMON_EVENT_HISTORY_SIZE", &var)?;
        parse(&mut self.in_host_namespace, "CADMON_IN_HOST_NAMESPACE", &var)?;
        parse(&mut self.disable_docker, "CADMON_DISABLE_DOCKER", &var)?;
        parse(&mut self.disable_podman, "CADMON_DISABLE_PODMAN", &var)?;

        if let Some(level) = var("CADMON_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(path) = var("CADMON_CGROUP_ROOT") {
            self.cgroup_root = PathBuf::from(path);
        }
        if let Some(path) = var("CADMON_PROC_PATH") {
            self.proc_path = PathBuf::from(path);
        }
        if let Some(path) = var("CADMON_ETC_PATH") {
            self.etc_path = PathBuf::from(path);
        }
        if let Some(host) = var("DOCKER_HOST") {
            self.docker_host = host;
        }
        if let Some(socket) = var("CADMON_PODMAN_SOCKET") {
            self.podman_socket = socket;
        }
        if let Some(allow) = var("CADMON_METADATA_ENV_ALLOW_LIST") {
            self.metadata_env_allow_list = list(allow);
        }
        if let Some(allow) = var("CADMON_RAW_CGROUP_PREFIX_ALLOW_LIST") {
            self.raw_cgroup_prefix_allow_list = list(allow);
        }
        Ok(())
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            housekeeping_interval: Duration::from_secs(self.housekeeping_interval.max(1)),
            history_size: self.history_size,
            event_history_size: self.event_history_size,
            metadata_env_allow_list: self.metadata_env_allow_list.clone(),
            in_host_namespace: self.in_host_namespace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::load(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.port, 8080);
        assert_eq!(config.manager_config().housekeeping_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_env_overrides() {
        let config = load(&[
            ("CADMON_PORT", "9100"),
            ("CADMON_HISTORY_SIZE", "120"),
            ("CADMON_DISABLE_PODMAN", "true"),
            ("CADMON_METADATA_ENV_ALLOW_LIST", "APP_, TIER ,"),
            ("DOCKER_HOST", "unix:///tmp/docker.sock"),
        ])
        .unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.history_size, 120);
        assert!(config.disable_podman);
        assert_eq!(config.metadata_env_allow_list, vec!["APP_", "TIER"]);
        assert_eq!(config.docker_host, "unix:///tmp/docker.sock");
    }

    #[test]
    fn test_invalid_env_value() {
        let err = load(&[("CADMON_PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Env { ref key, .. } if key == "CADMON_PORT"));
    }

    #[test]
    fn test_file_then_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "port = 7000\nhistory_size = 10\nraw_cgroup_prefix_allow_list = [\"/system.slice\"]"
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = load(&[("CADMON_CONFIG", path.as_str()), ("CADMON_PORT", "7001")]).unwrap();
        assert_eq!(config.port, 7001);
        assert_eq!(config.history_size, 10);
        assert_eq!(config.raw_cgroup_prefix_allow_list, vec!["/system.slice"]);
    }

    #[test]
    fn test_bad_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "colour = \"blue\"").unwrap();
        let path = file.path().to_str().unwrap().to_string();
        assert!(matches!(
            load(&[("CADMON_CONFIG", path.as_str())]),
            Err(ConfigError::File { .. })
        ));
        assert!(matches!(
            load(&[("CADMON_CONFIG", "/nonexistent/cadmon.toml")]),
            Err(ConfigError::Read { .. })
        ));
    }
}
