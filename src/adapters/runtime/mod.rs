//! Docker and Podman support through the engine API.
//!
//! Both engines speak the same API, so one factory, handler and watcher
//! serve either runtime, parametrized by [`RuntimeKind`].

mod factory;
mod handler;
mod watcher;

use bollard::Docker;

use crate::domain::{ContainerType, WatchSource};

pub use factory::RuntimeFactory;
pub use handler::{RuntimeHandler, RuntimeMetadata};
pub use watcher::RuntimeEventWatcher;

const ENGINE_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeKind {
    Docker,
    Podman,
}

impl RuntimeKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Podman => "podman",
        }
    }

    pub fn container_type(&self) -> ContainerType {
        match self {
            Self::Docker => ContainerType::Docker,
            Self::Podman => ContainerType::Podman,
        }
    }

    pub fn watch_source(&self) -> WatchSource {
        match self {
            Self::Docker => WatchSource::Docker,
            Self::Podman => WatchSource::Podman,
        }
    }

    fn scope_prefix(&self) -> &'static str {
        match self {
            Self::Docker => "docker-",
            Self::Podman => "libpod-",
        }
    }

    /// Parent cgroup used by the cgroupfs driver
    fn cgroupfs_parent(&self) -> &'static str {
        match self {
            Self::Docker => "/docker/",
            Self::Podman => "/libpod_parent/",
        }
    }

    /// Extract the container id from a cgroup name owned by this runtime
    pub fn container_id<'a>(&self, name: &'a str) -> Option<&'a str> {
        let last = name.rsplit('/').next()?;
        if last.ends_with(".mount") {
            return None;
        }

        let id = match last.strip_prefix(self.scope_prefix()) {
            Some(rest) => rest.strip_suffix(".scope").unwrap_or(rest),
            None if name.starts_with(self.cgroupfs_parent()) => last,
            None => return None,
        };

        is_container_id(id).then_some(id)
    }

    /// Cgroup names the container may live under, systemd driver first
    pub fn candidate_cgroups(&self, id: &str) -> [String; 2] {
        match self {
            Self::Docker => [
                format!("/system.slice/docker-{}.scope", id),
                format!("/docker/{}", id),
            ],
            Self::Podman => [
                format!("/machine.slice/libpod-{}.scope", id),
                format!("/libpod_parent/libpod-{}", id),
            ],
        }
    }
}

/// Full-length engine container id: 64 lowercase hex digits
pub fn is_container_id(id: &str) -> bool {
    id.len() == 64 && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Connect to an engine socket, e.g. `unix:///var/run/docker.sock`
pub fn connect(socket: &str) -> Result<Docker, bollard::errors::Error> {
    Docker::connect_with_socket(socket, ENGINE_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
}

/// Engine version and API version, empty when the engine is unreachable
pub async fn engine_version(client: &Docker) -> (String, String) {
    match client.version().await {
        Ok(version) => (
            version.version.unwrap_or_default(),
            version.api_version.unwrap_or_default(),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to query engine version");
            (String::new(), String::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> String {
        "0123456789abcdef".repeat(4)
    }

    #[test]
    fn test_docker_names() {
        let id = id();
        let systemd = format!("/system.slice/docker-{}.scope", id);
        let cgroupfs = format!("/docker/{}", id);

        assert_eq!(RuntimeKind::Docker.container_id(&systemd), Some(id.as_str()));
        assert_eq!(RuntimeKind::Docker.container_id(&cgroupfs), Some(id.as_str()));
        assert_eq!(RuntimeKind::Docker.container_id("/docker"), None);
        assert_eq!(RuntimeKind::Docker.container_id("/docker/abc"), None);
        assert_eq!(RuntimeKind::Docker.container_id("/system.slice/sshd.service"), None);
        assert_eq!(
            RuntimeKind::Docker.container_id(&format!("/system.slice/docker-{}.scope/x.mount", id)),
            None
        );
    }

    #[test]
    fn test_podman_names() {
        let id = id();
        let systemd = format!("/machine.slice/libpod-{}.scope", id);
        assert_eq!(RuntimeKind::Podman.container_id(&systemd), Some(id.as_str()));
        assert_eq!(
            RuntimeKind::Podman.container_id(&format!("/system.slice/docker-{}.scope", id)),
            None
        );
        assert_eq!(RuntimeKind::Docker.container_id(&systemd), None);
    }

    #[test]
    fn test_candidate_cgroups_round_trip() {
        let id = id();
        for kind in [RuntimeKind::Docker, RuntimeKind::Podman] {
            for name in kind.candidate_cgroups(&id) {
                assert_eq!(kind.container_id(&name), Some(id.as_str()), "{}", name);
            }
        }
    }

    #[test]
    fn test_container_id_shape() {
        assert!(is_container_id(&id()));
        assert!(!is_container_id(&id().to_uppercase()));
        assert!(!is_container_id("abc"));
    }
}
