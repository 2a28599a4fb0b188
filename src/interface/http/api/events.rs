use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::http::header;
use axum::response::Response;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::domain::{EventRequest, EventType};
use crate::ports::{EventWatch, Manager};

use super::super::ApiError;
use super::{container_name, write_result, ApiRequest};

/// Boolean parameter, accepting the usual spellings (`1`, `t`, `TRUE`, ...)
fn flag(request: &ApiRequest, key: &str) -> Option<bool> {
    match request.param(key)? {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Build an event query from request parameters. Unparseable values keep
/// their defaults. Returns the query and whether a live stream was asked for.
pub fn parse_event_request(segments: &[String], request: &ApiRequest) -> (EventRequest, bool) {
    let mut query = EventRequest {
        container_name: container_name(segments),
        ..EventRequest::default()
    };

    let stream = flag(request, "stream").unwrap_or(false);
    query.include_subcontainers = flag(request, "subcontainers").unwrap_or(false);

    if flag(request, "all_events") == Some(true) {
        query.event_types.extend(EventType::ALL);
    }
    for (key, event_type) in [
        ("oom_events", EventType::Oom),
        ("oom_kill_events", EventType::OomKill),
        ("creation_events", EventType::ContainerCreation),
        ("deletion_events", EventType::ContainerDeletion),
    ] {
        if flag(request, key) == Some(true) {
            query.event_types.insert(event_type);
        }
    }

    if let Some(max) = request.param("max_events").and_then(|v| v.parse().ok()) {
        query.max_events_returned = max;
    }
    let time = |key: &str| {
        request
            .param(key)
            .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
            .map(|t| t.with_timezone(&Utc))
    };
    if let Some(start) = time("start_time") {
        query.start_time = Some(start);
    }
    if let Some(end) = time("end_time") {
        query.end_time = Some(end);
    }

    (query, stream)
}

/// Answer an `events` request with stored events or a live stream
pub async fn handle_event_request(
    segments: &[String],
    manager: &Arc<dyn Manager>,
    request: &ApiRequest,
) -> Result<Response, ApiError> {
    let (query, stream) = parse_event_request(segments, request);
    debug!(?query, stream, "Api - Events");

    if !stream {
        let events = manager.past_events(&query).await?;
        return write_result(&events);
    }

    let watch = manager.watch_for_events(query).await?;
    stream_events(watch, Arc::clone(manager))
}

/// Write each event as one JSON line until the client goes away or the
/// watch is closed
fn stream_events(watch: EventWatch, manager: Arc<dyn Manager>) -> Result<Response, ApiError> {
    let (tx, rx) = mpsc::channel::<Result<Bytes, Infallible>>(16);
    let EventWatch { id, mut events } = watch;

    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                event = events.recv() => event,
                _ = tx.closed() => break,
            };
            let Some(event) = event else {
                debug!(watch = id, "event watch closed");
                break;
            };

            let mut line = match serde_json::to_vec(&event) {
                Ok(line) => line,
                Err(e) => {
                    warn!(watch = id, error = %e, "failed to encode event, ending stream");
                    break;
                }
            };
            line.push(b'\n');
            if tx.send(Ok(Bytes::from(line))).await.is_err() {
                break;
            }
        }
        manager.close_event_watch(id);
    });

    Ok(Response::builder()
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from_stream(ReceiverStream::new(rx)))?)
}
