use async_trait::async_trait;

use crate::domain::ProcessInfo;

/// Port for fetching process information
#[async_trait]
pub trait ProcessSource: Send + Sync {
    /// List all processes with their cgroup membership
    async fn list_processes(&self) -> Result<Vec<ProcessInfo>, Box<dyn std::error::Error + Send + Sync>>;
}
