use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::{debug, error};

use crate::ports::ManagerError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unknown request type {0:?}")]
    UnknownRequestType(String),

    #[error("unsupported API version {version:?}, supported versions: {}", supported.join(", "))]
    UnsupportedVersion {
        version: String,
        supported: Vec<String>,
    },

    #[error("API version required, supported versions: {}", .0.join(", "))]
    MissingVersion(Vec<String>),

    #[error("incomplete API request {0:?}")]
    Incomplete(String),

    #[error("{0}")]
    InvalidOption(String),

    #[error("unable to decode the json value: {0}")]
    InvalidBody(#[source] serde_json::Error),

    #[error("unknown request for Docker container {0:?}")]
    InvalidDockerRequest(Vec<String>),

    #[error(transparent)]
    Manager(#[from] ManagerError),

    #[error("failed to encode response: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to build response: {0}")]
    Response(#[from] axum::http::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnknownRequestType(_)
            | Self::UnsupportedVersion { .. }
            | Self::MissingVersion(_)
            | Self::Incomplete(_)
            | Self::InvalidOption(_)
            | Self::InvalidBody(_)
            | Self::InvalidDockerRequest(_) => StatusCode::BAD_REQUEST,
            Self::Manager(ManagerError::UnknownContainer(_)) => StatusCode::NOT_FOUND,
            Self::Manager(ManagerError::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
            Self::Manager(_) | Self::Encode(_) | Self::Response(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "API request failed");
        } else {
            debug!(error = %self, status = status.as_u16(), "API request rejected");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
