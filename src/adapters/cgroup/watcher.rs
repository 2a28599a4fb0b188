use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::WatchSource;
use crate::ports::{ContainerWatcher, WatchEvent, WatcherError};

use super::CgroupReader;

/// Discovers cgroups by rescanning the hierarchy on an interval
pub struct RawWatcher {
    reader: Arc<CgroupReader>,
    interval: Duration,
}

impl RawWatcher {
    pub fn new(reader: Arc<CgroupReader>, interval: Duration) -> Self {
        Self { reader, interval }
    }

    /// Events turning `known` into `current`: removals deepest first, then
    /// additions parents first
    fn diff(known: &BTreeSet<String>, current: &BTreeSet<String>) -> Vec<WatchEvent> {
        let removed = known
            .iter()
            .rev()
            .filter(|name| !current.contains(*name))
            .map(|name| WatchEvent::delete(name.clone(), WatchSource::Raw));
        let added = current
            .difference(known)
            .map(|name| WatchEvent::add(name.clone(), WatchSource::Raw));
        removed.chain(added).collect()
    }
}

#[async_trait]
impl ContainerWatcher for RawWatcher {
    fn source(&self) -> WatchSource {
        WatchSource::Raw
    }

    async fn run(&self, events: mpsc::Sender<WatchEvent>) -> Result<(), WatcherError> {
        let mut known = BTreeSet::new();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if events.is_closed() {
                return Ok(());
            }

            let reader = Arc::clone(&self.reader);
            let current: BTreeSet<String> = tokio::task::spawn_blocking(move || reader.list_cgroups())
                .await
                .map_err(|e| WatcherError::Engine(Box::new(e)))?
                .into_iter()
                .collect();

            for event in Self::diff(&known, &current) {
                debug!(container = %event.name, kind = ?event.kind, "cgroup change");
                if events.send(event).await.is_err() {
                    return Ok(());
                }
            }
            known = current;
        }
    }
}
