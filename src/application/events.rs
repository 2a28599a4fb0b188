use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::adapters::store::RingBuffer;
use crate::domain::{Event, EventRequest};
use crate::ports::EventWatch;

/// Buffered events per live watch before new ones are dropped
const WATCH_BUFFER: usize = 128;

struct Watch {
    request: EventRequest,
    sender: mpsc::Sender<Event>,
}

struct Inner {
    history: RingBuffer<Event>,
    watches: HashMap<u64, Watch>,
}

/// Bounded event history plus the live watches fed from it
pub struct EventStore {
    inner: Mutex<Inner>,
    next_id: AtomicU64,
}

impl EventStore {
    pub fn new(history_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                history: RingBuffer::new(history_size),
                watches: HashMap::new(),
            }),
            next_id: AtomicU64::new(1),
        }
    }

    /// Record `event` and forward it to every watch it matches
    pub fn publish(&self, event: Event) {
        let mut inner = self.inner.lock();

        inner.watches.retain(|id, watch| {
            if !watch.request.matches(&event) {
                return !watch.sender.is_closed();
            }
            match watch.sender.try_send(event.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(watch = id, container = %event.container_name, "event watch is lagging, dropping event");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(watch = id, "event watch closed");
                    false
                }
            }
        });

        inner.history.push(event);
    }

    /// Stored events matching `request`, oldest first
    pub fn past(&self, request: &EventRequest) -> Vec<Event> {
        let matching = {
            let inner = self.inner.lock();
            inner
                .history
                .iter()
                .filter(|event| request.matches(event))
                .cloned()
                .collect()
        };
        request.limit(matching)
    }

    pub fn watch(&self, request: EventRequest) -> EventWatch {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, events) = mpsc::channel(WATCH_BUFFER);
        self.inner.lock().watches.insert(id, Watch { request, sender });
        debug!(watch = id, "event watch opened");
        EventWatch { id, events }
    }

    /// Drop watch `id`; its receiver sees the channel close
    pub fn close(&self, id: u64) {
        if self.inner.lock().watches.remove(&id).is_some() {
            debug!(watch = id, "event watch removed");
        }
    }

    pub fn watch_count(&self) -> usize {
        self.inner.lock().watches.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EventType;

    fn all_events(name: &str, subcontainers: bool) -> EventRequest {
        EventRequest {
            container_name: name.to_string(),
            include_subcontainers: subcontainers,
            event_types: EventType::ALL.into_iter().collect(),
            max_events_returned: -1,
            ..EventRequest::default()
        }
    }

    #[test]
    fn test_history_is_bounded() {
        let store = EventStore::new(2);
        for name in ["/a", "/b", "/c"] {
            store.publish(Event::new(name, EventType::ContainerCreation));
        }
        let past = store.past(&all_events("/", true));
        let names: Vec<&str> = past.iter().map(|e| e.container_name.as_str()).collect();
        assert_eq!(names, vec!["/b", "/c"]);
    }

    #[tokio::test]
    async fn test_watch_receives_matching_events_only() {
        let store = EventStore::new(10);
        let mut watch = store.watch(all_events("/docker", true));

        store.publish(Event::new("/system.slice", EventType::ContainerCreation));
        store.publish(Event::new("/docker/abc", EventType::ContainerDeletion));

        let event = watch.events.recv().await.unwrap();
        assert_eq!(event.container_name, "/docker/abc");
        assert!(watch.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_ends_the_stream() {
        let store = EventStore::new(10);
        let mut watch = store.watch(all_events("/", true));
        assert_eq!(store.watch_count(), 1);

        store.close(watch.id);
        assert_eq!(store.watch_count(), 0);
        assert!(watch.events.recv().await.is_none());
    }

    #[test]
    fn test_dropped_receiver_is_pruned() {
        let store = EventStore::new(10);
        let watch = store.watch(all_events("/", true));
        drop(watch);
        store.publish(Event::new("/a", EventType::Oom));
        assert_eq!(store.watch_count(), 0);
    }
}
