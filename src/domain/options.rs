use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the container path of a v2 request is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdType {
    /// cgroup name, e.g. `/system.slice/foo.service`
    Name,
    /// Docker container name or id
    Docker,
    /// Podman container name or id
    Podman,
}

impl IdType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Docker => "docker",
            Self::Podman => "podman",
        }
    }

    /// Namespace used by runtime handlers for this id type
    pub fn namespace(&self) -> Option<&'static str> {
        match self {
            Self::Name => None,
            Self::Docker => Some("docker"),
            Self::Podman => Some("podman"),
        }
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(Self::Name),
            "docker" => Ok(Self::Docker),
            "podman" => Ok(Self::Podman),
            other => Err(format!("unknown 'type' {:?}", other)),
        }
    }
}

/// Options shared by every v2 request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestOptions {
    pub id_type: IdType,
    /// Number of stats to return; -1 returns all
    pub count: i64,
    pub recursive: bool,
    /// Refresh stats older than this before answering
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age: Option<Duration>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            id_type: IdType::Name,
            count: 64,
            recursive: false,
            max_age: None,
        }
    }
}
