use bytes::Bytes;

use crate::domain::ContainerInfoRequest;

use super::super::ApiError;

/// Query parameters and body of one API call
#[derive(Debug, Clone, Default)]
pub struct ApiRequest {
    query: Vec<(String, String)>,
    body: Bytes,
}

impl ApiRequest {
    pub fn new(query: Vec<(String, String)>, body: Bytes) -> Self {
        Self { query, body }
    }

    /// First value of query parameter `key`
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Optional JSON body of the v1 container endpoints
    pub fn container_info_request(&self) -> Result<ContainerInfoRequest, ApiError> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(ContainerInfoRequest::default());
        }
        serde_json::from_slice(&self.body).map_err(ApiError::InvalidBody)
    }
}

/// Join path segments into a rooted, cleaned container name
pub fn container_name(segments: &[String]) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in segments.iter().flat_map(|s| s.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            part => parts.push(part),
        }
    }
    format!("/{}", parts.join("/"))
}
