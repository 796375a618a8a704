use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;

/// The few failures the servers answer with an HTTP error status.
/// Everything else is reported inside a normal response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// `/invocations` without a session id header
    MissingSessionHeader,
    /// The static proxy could not serve even its fallback page
    FallbackUnavailable,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::MissingSessionHeader => StatusCode::BAD_REQUEST,
            ErrorKind::FallbackUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error body: `{"error": {"message": ..., "type": ...}}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: ErrorKind,
}

impl ErrorResponse {
    pub fn new(kind: ErrorKind, message: String) -> Self {
        Self {
            error: ErrorDetail { message, kind },
        }
    }

    pub fn missing_session_header(header: &str) -> Self {
        Self::new(
            ErrorKind::MissingSessionHeader,
            format!("missing required header {}", header),
        )
    }

    pub fn fallback_unavailable(key: &str, cause: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorKind::FallbackUnavailable,
            format!("failed to fetch {}: {}", key, cause),
        )
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = self.error.kind.status();
        if status.is_server_error() {
            error!("{}", self.error.message);
        }
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kinds_map_to_status() {
        assert_eq!(
            ErrorResponse::missing_session_header("x-session")
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorResponse::fallback_unavailable("index.html", "gone")
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn body_names_the_kind() {
        let body = serde_json::to_value(ErrorResponse::missing_session_header("x-session")).unwrap();
        assert_eq!(
            body,
            json!({"error": {
                "message": "missing required header x-session",
                "type": "missing_session_header"
            }})
        );
    }
}
