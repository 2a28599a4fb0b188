use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::response::Response;
use tracing::debug;

use crate::ports::Manager;

use super::super::ApiError;
use super::{
    container_name, extend_types, handle_event_request, write_result, ApiRequest, ApiVersion,
    CONTAINERS, DOCKER, EVENTS, MACHINE, SUBCONTAINERS,
};

/// Machine info and single-container queries
pub struct V1_0 {
    supported: Vec<&'static str>,
}

impl V1_0 {
    pub fn new() -> Self {
        Self {
            supported: vec![CONTAINERS, MACHINE],
        }
    }
}

impl Default for V1_0 {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ApiVersion for V1_0 {
    fn version(&self) -> &'static str {
        "v1.0"
    }

    fn supported_request_types(&self) -> &[&'static str] {
        &self.supported
    }

    async fn handle_request(
        &self,
        request_type: &str,
        segments: &[String],
        manager: &Arc<dyn Manager>,
        request: &ApiRequest,
    ) -> Result<Response, ApiError> {
        match request_type {
            MACHINE => {
                debug!("Api - Machine");
                write_result(&manager.machine_info().await?)
            }
            CONTAINERS => {
                let name = container_name(segments);
                debug!(container = %name, "Api - Container");
                let query = request.container_info_request()?;
                write_result(&manager.container_info(&name, &query).await?)
            }
            other => Err(ApiError::UnknownRequestType(other.to_string())),
        }
    }
}

/// Adds recursive subcontainer listing
pub struct V1_1 {
    base: Arc<dyn ApiVersion>,
    supported: Vec<&'static str>,
}

impl V1_1 {
    pub fn new(base: Arc<dyn ApiVersion>) -> Self {
        let supported = extend_types(base.as_ref(), &[SUBCONTAINERS]);
        Self { base, supported }
    }
}

#[async_trait]
impl ApiVersion for V1_1 {
    fn version(&self) -> &'static str {
        "v1.1"
    }

    fn supported_request_types(&self) -> &[&'static str] {
        &self.supported
    }

    async fn handle_request(
        &self,
        request_type: &str,
        segments: &[String],
        manager: &Arc<dyn Manager>,
        request: &ApiRequest,
    ) -> Result<Response, ApiError> {
        if request_type != SUBCONTAINERS {
            return self
                .base
                .handle_request(request_type, segments, manager, request)
                .await;
        }

        let name = container_name(segments);
        debug!(container = %name, "Api - Subcontainers");
        let query = request.container_info_request()?;
        write_result(&manager.subcontainers_info(&name, &query).await?)
    }
}

/// Adds Docker container lookups
pub struct V1_2 {
    base: Arc<dyn ApiVersion>,
    supported: Vec<&'static str>,
}

impl V1_2 {
    pub fn new(base: Arc<dyn ApiVersion>) -> Self {
        let supported = extend_types(base.as_ref(), &[DOCKER]);
        Self { base, supported }
    }
}

#[async_trait]
impl ApiVersion for V1_2 {
    fn version(&self) -> &'static str {
        "v1.2"
    }

    fn supported_request_types(&self) -> &[&'static str] {
        &self.supported
    }

    async fn handle_request(
        &self,
        request_type: &str,
        segments: &[String],
        manager: &Arc<dyn Manager>,
        request: &ApiRequest,
    ) -> Result<Response, ApiError> {
        if request_type != DOCKER {
            return self
                .base
                .handle_request(request_type, segments, manager, request)
                .await;
        }

        debug!(?segments, "Api - Docker");
        let query = request.container_info_request()?;

        // `docker/` means the same as `docker`
        let segments: &[String] = match segments {
            [only] if only.is_empty() => &[],
            other => other,
        };

        let containers = match segments {
            [] => manager.all_docker_containers(&query).await?,
            [id] => {
                let container = manager.docker_container(id, &query).await?;
                BTreeMap::from([(container.name().to_string(), container)])
            }
            _ => return Err(ApiError::InvalidDockerRequest(segments.to_vec())),
        };
        write_result(&containers)
    }
}

/// Adds event queries and streaming
pub struct V1_3 {
    base: Arc<dyn ApiVersion>,
    supported: Vec<&'static str>,
}

impl V1_3 {
    pub fn new(base: Arc<dyn ApiVersion>) -> Self {
        let supported = extend_types(base.as_ref(), &[EVENTS]);
        Self { base, supported }
    }
}

#[async_trait]
impl ApiVersion for V1_3 {
    fn version(&self) -> &'static str {
        "v1.3"
    }

    fn supported_request_types(&self) -> &[&'static str] {
        &self.supported
    }

    async fn handle_request(
        &self,
        request_type: &str,
        segments: &[String],
        manager: &Arc<dyn Manager>,
        request: &ApiRequest,
    ) -> Result<Response, ApiError> {
        match request_type {
            EVENTS => handle_event_request(segments, manager, request).await,
            _ => {
                self.base
                    .handle_request(request_type, segments, manager, request)
                    .await
            }
        }
    }
}
