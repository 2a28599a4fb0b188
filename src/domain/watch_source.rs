use std::fmt;

use serde::{Deserialize, Serialize};

/// Discovery channel through which a container was observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchSource {
    /// Polling scan of the cgroup hierarchy
    Raw,
    /// Docker engine event stream
    Docker,
    /// Podman engine event stream
    Podman,
}

impl WatchSource {
    pub const ALL: [WatchSource; 3] = [WatchSource::Raw, WatchSource::Docker, WatchSource::Podman];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Docker => "docker",
            Self::Podman => "podman",
        }
    }
}

impl fmt::Display for WatchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
