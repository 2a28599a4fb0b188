//! Versioned REST API.
//!
//! Each revision answers the request types it introduced and hands anything
//! else, unchanged, to the revision it extends. The v1 line starts at v1.0;
//! v2.0 is a separate root that v2.1 builds on.

mod events;
mod options;
mod request;
mod v1;
mod v2;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::header;
use axum::response::Response;
use serde::Serialize;

use crate::ports::Manager;

use super::ApiError;

pub use events::{handle_event_request, parse_event_request};
pub use options::parse_request_options;
pub use request::{container_name, ApiRequest};
pub use v1::{V1_0, V1_1, V1_2, V1_3};
pub use v2::{V2_0, V2_1};

pub const CONTAINERS: &str = "containers";
pub const SUBCONTAINERS: &str = "subcontainers";
pub const MACHINE: &str = "machine";
pub const MACHINE_STATS: &str = "machinestats";
pub const DOCKER: &str = "docker";
pub const SUMMARY: &str = "summary";
pub const STATS: &str = "stats";
pub const SPEC: &str = "spec";
pub const EVENTS: &str = "events";
pub const STORAGE: &str = "storage";
pub const ATTRIBUTES: &str = "attributes";
pub const VERSION: &str = "version";
pub const PS: &str = "ps";
pub const CUSTOM_METRICS: &str = "appmetrics";

/// One revision of the REST API
#[async_trait]
pub trait ApiVersion: Send + Sync {
    /// Version string as it appears in the URL, e.g. `v1.3`
    fn version(&self) -> &'static str;

    /// Every request type this revision answers, including inherited ones
    fn supported_request_types(&self) -> &[&'static str];

    /// Answer `request_type`; `segments` are the path elements after it
    async fn handle_request(
        &self,
        request_type: &str,
        segments: &[String],
        manager: &Arc<dyn Manager>,
        request: &ApiRequest,
    ) -> Result<Response, ApiError>;
}

/// All revisions, oldest first
pub fn api_versions() -> Vec<Arc<dyn ApiVersion>> {
    let v1_0: Arc<dyn ApiVersion> = Arc::new(V1_0::new());
    let v1_1: Arc<dyn ApiVersion> = Arc::new(V1_1::new(Arc::clone(&v1_0)));
    let v1_2: Arc<dyn ApiVersion> = Arc::new(V1_2::new(Arc::clone(&v1_1)));
    let v1_3: Arc<dyn ApiVersion> = Arc::new(V1_3::new(Arc::clone(&v1_2)));
    let v2_0: Arc<dyn ApiVersion> = Arc::new(V2_0::new());
    let v2_1: Arc<dyn ApiVersion> = Arc::new(V2_1::new(Arc::clone(&v2_0)));

    vec![v1_0, v1_1, v1_2, v1_3, v2_0, v2_1]
}

/// Supported types of `base` followed by `added`
fn extend_types(base: &dyn ApiVersion, added: &[&'static str]) -> Vec<&'static str> {
    let mut types = base.supported_request_types().to_vec();
    types.extend_from_slice(added);
    types
}

/// Serialize `value` as the JSON response body
pub fn write_result<T: Serialize + ?Sized>(value: &T) -> Result<Response, ApiError> {
    let body = serde_json::to_vec(value).map_err(ApiError::Encode)?;
    Ok(Response::builder()
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())?)
}
