mod machine;
pub(crate) mod parser;
mod process;

use std::path::PathBuf;

pub use machine::ProcfsMachineSource;
pub use parser::ParseError;
pub use process::ProcfsProcessSource;

/// Host paths, overridable when running inside a container with the host's
/// `/proc` and `/etc` bind-mounted elsewhere
#[derive(Debug, Clone)]
pub struct ProcfsConfig {
    pub proc_path: PathBuf,
    pub etc_path: PathBuf,
}

impl ProcfsConfig {
    pub fn new(proc_path: impl Into<PathBuf>, etc_path: impl Into<PathBuf>) -> Self {
        Self {
            proc_path: proc_path.into(),
            etc_path: etc_path.into(),
        }
    }

    pub fn host() -> Self {
        Self::new("/proc", "/etc")
    }
}

impl Default for ProcfsConfig {
    fn default() -> Self {
        Self::host()
    }
}

/// Combined adapter for the machine and process sources
#[derive(Debug, Clone)]
pub struct ProcfsAdapter {
    config: ProcfsConfig,
}

impl ProcfsAdapter {
    pub fn new(config: ProcfsConfig) -> Self {
        Self { config }
    }

    pub fn machine_source(&self) -> ProcfsMachineSource {
        ProcfsMachineSource::new(self.config.clone())
    }

    pub fn process_source(&self) -> ProcfsProcessSource {
        ProcfsProcessSource::new(self.config.clone())
    }
}
