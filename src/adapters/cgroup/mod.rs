//! Generic cgroup v2 support: the `raw` factory, its handler and the
//! polling watcher.

mod handler;
pub(crate) mod parser;
pub(crate) mod reader;
mod watcher;

pub use handler::{RawFactory, RawHandler};
pub use reader::CgroupReader;
pub use watcher::RawWatcher;
