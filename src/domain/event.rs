use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of container lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "oom")]
    Oom,
    #[serde(rename = "oomKill")]
    OomKill,
    #[serde(rename = "containerCreation")]
    ContainerCreation,
    #[serde(rename = "containerDeletion")]
    ContainerDeletion,
}

impl EventType {
    pub const ALL: [EventType; 4] = [
        EventType::Oom,
        EventType::OomKill,
        EventType::ContainerCreation,
        EventType::ContainerDeletion,
    ];
}

/// A container lifecycle event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub container_name: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub event_data: serde_json::Value,
}

impl Event {
    pub fn new(container_name: impl Into<String>, event_type: EventType) -> Self {
        Self {
            container_name: container_name.into(),
            timestamp: Utc::now(),
            event_type,
            event_data: serde_json::Value::Null,
        }
    }

    pub fn with_data(mut self, event_data: serde_json::Value) -> Self {
        self.event_data = event_data;
        self
    }
}

/// Selection criteria for past or live events
#[derive(Debug, Clone, PartialEq)]
pub struct EventRequest {
    pub container_name: String,
    pub include_subcontainers: bool,
    pub event_types: BTreeSet<EventType>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// -1 means unlimited
    pub max_events_returned: i32,
}

impl Default for EventRequest {
    fn default() -> Self {
        Self {
            container_name: "/".to_string(),
            include_subcontainers: false,
            event_types: BTreeSet::new(),
            start_time: None,
            end_time: None,
            max_events_returned: 10,
        }
    }
}

impl EventRequest {
    pub fn matches(&self, event: &Event) -> bool {
        if !self.event_types.contains(&event.event_type) {
            return false;
        }
        if let Some(start) = self.start_time {
            if event.timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end_time {
            if event.timestamp > end {
                return false;
            }
        }
        self.matches_container(&event.container_name)
    }

    fn matches_container(&self, name: &str) -> bool {
        if name == self.container_name {
            return true;
        }
        if !self.include_subcontainers {
            return false;
        }
        if self.container_name == "/" {
            return true;
        }
        name.strip_prefix(self.container_name.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Trim an oldest-first list to the newest `max_events_returned` entries
    pub fn limit(&self, mut events: Vec<Event>) -> Vec<Event> {
        if let Ok(max) = usize::try_from(self.max_events_returned) {
            if events.len() > max {
                events.drain(..events.len() - max);
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, subcontainers: bool) -> EventRequest {
        EventRequest {
            container_name: name.to_string(),
            include_subcontainers: subcontainers,
            event_types: EventType::ALL.into_iter().collect(),
            ..EventRequest::default()
        }
    }

    #[test]
    fn test_matches_exact_container_only() {
        let req = request("/docker", false);
        assert!(req.matches(&Event::new("/docker", EventType::Oom)));
        assert!(!req.matches(&Event::new("/docker/abc", EventType::Oom)));
    }

    #[test]
    fn test_matches_subcontainers_by_path() {
        let req = request("/docker", true);
        assert!(req.matches(&Event::new("/docker/abc", EventType::Oom)));
        assert!(!req.matches(&Event::new("/dockerd", EventType::Oom)));
        assert!(request("/", true).matches(&Event::new("/anything", EventType::Oom)));
    }

    #[test]
    fn test_filters_event_type() {
        let mut req = request("/", true);
        req.event_types = [EventType::ContainerCreation].into_iter().collect();
        assert!(!req.matches(&Event::new("/a", EventType::ContainerDeletion)));
        assert!(req.matches(&Event::new("/a", EventType::ContainerCreation)));
    }

    #[test]
    fn test_limit_keeps_newest() {
        let mut req = request("/", true);
        req.max_events_returned = 2;
        let events: Vec<Event> = ["/a", "/b", "/c"]
            .iter()
            .map(|n| Event::new(*n, EventType::Oom))
            .collect();
        let limited = req.limit(events);
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].container_name, "/b");

        req.max_events_returned = -1;
        assert_eq!(req.limit(vec![Event::new("/a", EventType::Oom)]).len(), 1);
    }

    #[test]
    fn test_event_type_wire_names() {
        let json = serde_json::to_string(&EventType::ContainerCreation).unwrap();
        assert_eq!(json, "\"containerCreation\"");
    }
}
