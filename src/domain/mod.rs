pub mod container;
pub mod event;
pub mod machine;
pub mod metrics;
pub mod options;
pub mod process;
pub mod v2;
pub mod watch_source;

pub use container::{
    ContainerInfo, ContainerInfoRequest, ContainerReference, ContainerSpec, ContainerStats,
    ContainerType,
};
pub use event::{Event, EventRequest, EventType};
pub use machine::{Attributes, FsInfo, MachineInfo, VersionInfo};
pub use metrics::{CpuMetrics, CustomMetric, IoMetrics, MemoryMetrics, NetworkMetrics};
pub use options::{IdType, RequestOptions};
pub use process::{ProcessInfo, ProcessState};
pub use watch_source::WatchSource;
