//! Typed client for the v1.3 HTTP API.

use std::collections::BTreeMap;

use futures::StreamExt;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::{ContainerInfo, ContainerInfoRequest, Event, MachineInfo};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("unable to get {what} from {url}: {source}")]
    Http {
        what: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request {url} failed with status {status}: {body:?}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("unable to decode {what} (body: {body:?}) from {url}: {source}")]
    Decode {
        what: String,
        url: String,
        body: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("expected exactly one Docker container, got {0}")]
    NotSingle(usize),

    #[error("event receiver dropped")]
    ReceiverClosed,
}

pub struct Client {
    base_url: String,
    http: reqwest::Client,
}

impl Client {
    /// `base_url` is the daemon root, e.g. `http://localhost:8080/`
    pub fn new(base_url: &str) -> Self {
        Self::with_http_client(base_url, reqwest::Client::new())
    }

    pub fn with_http_client(base_url: &str, http: reqwest::Client) -> Self {
        let root = base_url.trim_end_matches('/');
        Self {
            base_url: format!("{}/api/v1.3/", root),
            http,
        }
    }

    fn url(&self, request_type: &str, name: &str) -> String {
        let name = name.trim_start_matches('/');
        if name.is_empty() {
            format!("{}{}", self.base_url, request_type)
        } else {
            format!("{}{}/{}", self.base_url, request_type, name)
        }
    }

    pub async fn machine_info(&self) -> Result<MachineInfo, ClientError> {
        self.get_json(&self.url("machine", ""), None, "machine info")
            .await
    }

    pub async fn container_info(
        &self,
        name: &str,
        query: &ContainerInfoRequest,
    ) -> Result<ContainerInfo, ClientError> {
        self.get_json(
            &self.url("containers", name),
            Some(query),
            &format!("container info for {:?}", name),
        )
        .await
    }

    pub async fn subcontainers_info(
        &self,
        name: &str,
        query: &ContainerInfoRequest,
    ) -> Result<Vec<ContainerInfo>, ClientError> {
        self.get_json(
            &self.url("subcontainers", name),
            Some(query),
            &format!("subcontainers info for {:?}", name),
        )
        .await
    }

    /// One Docker container by name or id
    pub async fn docker_container(
        &self,
        name: &str,
        query: &ContainerInfoRequest,
    ) -> Result<ContainerInfo, ClientError> {
        let containers: BTreeMap<String, ContainerInfo> = self
            .get_json(
                &self.url("docker", name),
                Some(query),
                &format!("Docker container info for {:?}", name),
            )
            .await?;
        if containers.len() != 1 {
            return Err(ClientError::NotSingle(containers.len()));
        }
        containers.into_values().next().ok_or(ClientError::NotSingle(0))
    }

    pub async fn all_docker_containers(
        &self,
        query: &ContainerInfoRequest,
    ) -> Result<Vec<ContainerInfo>, ClientError> {
        let containers: BTreeMap<String, ContainerInfo> = self
            .get_json(&self.url("docker", ""), Some(query), "all Docker containers info")
            .await?;
        Ok(containers.into_values().collect())
    }

    /// Stored events; `query` is the container path plus query string, e.g.
    /// `/docker?subcontainers=true&oom_events=true`
    pub async fn event_static_info(&self, query: &str) -> Result<Vec<Event>, ClientError> {
        self.get_json(&self.events_url(query), None, "event info").await
    }

    /// Forward streamed events to `events` until the server ends the stream.
    /// `query` must request `stream=true`.
    pub async fn event_streaming_info(
        &self,
        query: &str,
        events: mpsc::Sender<Event>,
    ) -> Result<(), ClientError> {
        let url = self.events_url(query);
        let response = self.send(&url, None, "event stream").await?;

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| ClientError::Http {
                what: "event stream".to_string(),
                url: url.clone(),
                source,
            })?;
            buffer.extend_from_slice(&chunk);
            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                let event = decode(&line, &url, "event")?;
                if events.send(event).await.is_err() {
                    return Err(ClientError::ReceiverClosed);
                }
            }
        }
        debug!(url = %url, "event stream ended");
        Ok(())
    }

    fn events_url(&self, query: &str) -> String {
        let (path, params) = match query.split_once('?') {
            Some((path, params)) => (path, Some(params)),
            None => (query, None),
        };
        let mut url = self.url("events", path);
        if let Some(params) = params {
            url.push('?');
            url.push_str(params);
        }
        url
    }

    async fn send(
        &self,
        url: &str,
        body: Option<&ContainerInfoRequest>,
        what: &str,
    ) -> Result<reqwest::Response, ClientError> {
        let request = match body {
            Some(body) => self.http.post(url).json(body),
            None => self.http.get(url),
        };
        let http_error = |source| ClientError::Http {
            what: what.to_string(),
            url: url.to_string(),
            source,
        };

        let response = request.send().await.map_err(http_error)?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.map_err(http_error)?;
            return Err(ClientError::Status {
                url: url.to_string(),
                status,
                body: body.trim().to_string(),
            });
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        body: Option<&ContainerInfoRequest>,
        what: &str,
    ) -> Result<T, ClientError> {
        let response = self.send(url, body, what).await?;
        let bytes = response.bytes().await.map_err(|source| ClientError::Http {
            what: what.to_string(),
            url: url.to_string(),
            source,
        })?;
        decode(&bytes, url, what)
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8], url: &str, what: &str) -> Result<T, ClientError> {
    serde_json::from_slice(bytes).map_err(|source| ClientError::Decode {
        what: what.to_string(),
        url: url.to_string(),
        body: String::from_utf8_lossy(bytes).into_owned(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let client = Client::new("http://localhost:8080");
        assert_eq!(client.url("machine", ""), "http://localhost:8080/api/v1.3/machine");
        assert_eq!(
            client.url("containers", "/system.slice"),
            "http://localhost:8080/api/v1.3/containers/system.slice"
        );

        let client = Client::new("http://localhost:8080/");
        assert_eq!(client.url("docker", "/"), "http://localhost:8080/api/v1.3/docker");
        assert_eq!(
            client.events_url("/docker?stream=true"),
            "http://localhost:8080/api/v1.3/events/docker?stream=true"
        );
        assert_eq!(
            client.events_url("?all_events=true"),
            "http://localhost:8080/api/v1.3/events?all_events=true"
        );
    }

    #[test]
    fn test_decode_error_keeps_body() {
        let err = decode::<MachineInfo>(b"not json", "http://x", "machine info").unwrap_err();
        match err {
            ClientError::Decode { body, .. } => assert_eq!(body, "not json"),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
