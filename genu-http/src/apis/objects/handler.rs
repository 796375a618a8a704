use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use genu_core::{ObjectBody, ObjectHead, StoreError};
use tracing::{info, warn};

use crate::http::StaticState;
use crate::ErrorResponse;

/// Object served when the requested key cannot be
pub const FALLBACK_KEY: &str = "index.html";

/// Load-balancer health check
pub async fn handle_healthcheck() -> StatusCode {
    StatusCode::OK
}

/// Object key for a request path: one leading `/` stripped, percent-decoded
pub fn object_key(path: &str) -> String {
    let key = path.strip_prefix('/').unwrap_or(path);
    urlencoding::decode(key)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| key.to_string())
}

/// Serve the object named by the request path, or the fallback page
pub async fn handle_get_object(
    State(state): State<StaticState>,
    uri: Uri,
) -> Result<Response, ErrorResponse> {
    info!("GET {}", uri.path());
    let key = object_key(uri.path());

    match fetch(&state, &key).await {
        Ok((head, body)) => Ok((
            [
                (header::CONTENT_TYPE, head.content_type),
                (header::CONTENT_LENGTH, head.content_length.to_string()),
            ],
            Body::from_stream(body),
        )
            .into_response()),
        Err(e) => {
            warn!("Serving {} for {}: {}", FALLBACK_KEY, key, e);
            let body = state
                .store
                .get(FALLBACK_KEY)
                .await
                .map_err(|e| ErrorResponse::fallback_unavailable(FALLBACK_KEY, e))?;
            Ok((
                [(header::CONTENT_TYPE, "text/html")],
                Body::from_stream(body),
            )
                .into_response())
        }
    }
}

async fn fetch(state: &StaticState, key: &str) -> Result<(ObjectHead, ObjectBody), StoreError> {
    let head = state.store.head(key).await?;
    let body = state.store.get(key).await?;
    Ok((head, body))
}
