//! Proxy errors and their OpenAI-compatible error responses

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Failed to read request body: {0}")]
    RequestBody(#[source] axum::Error),

    #[error("Invalid upstream URI: {0}")]
    InvalidUri(String),

    #[error("Upstream request failed: {0}")]
    Upstream(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Failed to read upstream response: {0}")]
    ResponseBody(#[source] axum::Error),

    #[error("Upstream returned an unreadable responses body: {0}")]
    UpstreamParse(#[source] serde_json::Error),

    #[error("Failed to encode response: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::RequestBody(_) => StatusCode::BAD_REQUEST,
            ProxyError::InvalidUri(_) => StatusCode::BAD_REQUEST,
            ProxyError::Upstream(_)
            | ProxyError::ResponseBody(_)
            | ProxyError::UpstreamParse(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Serialize(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            ProxyError::RequestBody(_) | ProxyError::InvalidUri(_) => "invalid_request_error",
            ProxyError::Upstream(_)
            | ProxyError::ResponseBody(_)
            | ProxyError::UpstreamParse(_) => "upstream_error",
            ProxyError::Serialize(_) => "internal_error",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "type": self.error_type(),
                "message": self.to_string()
            }
        });

        (self.status(), Json(body)).into_response()
    }
}
