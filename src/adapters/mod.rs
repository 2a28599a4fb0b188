pub mod cgroup;
pub mod procfs;
pub mod runtime;
pub mod store;

pub use cgroup::{CgroupReader, RawFactory, RawWatcher};
pub use procfs::{ProcfsAdapter, ProcfsConfig};
pub use runtime::{RuntimeEventWatcher, RuntimeFactory, RuntimeKind};
pub use store::RingBuffer;
