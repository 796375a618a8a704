use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap},
    response::{IntoResponse, Json, Response},
};
use futures::StreamExt;
use genu_core::{SessionId, SESSION_HEADER};
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

use super::types::{InvocationRequest, InvocationResponse};
use crate::http::{ResponseMode, ServerState};
use crate::session::{InvocationError, InvocationSession};
use crate::streaming::{error_line, ndjson_line, session_to_ndjson_stream, RelayFormatter};
use crate::ErrorResponse;

const NDJSON: &str = "application/x-ndjson";

/// Handle one agent invocation.
/// Only a missing session header is an HTTP error; payload, setup and agent
/// failures are reported inside a normal response.
pub async fn handle_invocation(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ErrorResponse> {
    let request_id = Uuid::new_v4().to_string();

    let session_id = headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(SessionId::parse)
        .ok_or_else(|| ErrorResponse::missing_session_header(SESSION_HEADER))?;

    info!("[{}] - [{}] POST /invocations", request_id, session_id);

    let started = match parse_request(&body) {
        Ok(request) => state.invocations.start(&request_id, &session_id, request).await,
        Err(e) => Err(e),
    };

    match state.mode {
        ResponseMode::FinalMessage => {
            let response = match started {
                Ok(session) => final_message(&request_id, session).await,
                Err(e) => {
                    error!("[{}] - [{}] Error in invocation: {}", request_id, session_id, e);
                    InvocationResponse::error(&e.to_string())
                }
            };
            Ok(Json(response).into_response())
        }
        ResponseMode::EventStream => {
            let body = match started {
                Ok(session) => Body::from_stream(session_to_ndjson_stream(session, RelayFormatter)),
                Err(e) => {
                    error!("[{}] - [{}] Error in streaming response: {}", request_id, session_id, e);
                    Body::from(ndjson_line(&error_line(&e.to_string())).unwrap_or_default())
                }
            };
            Ok(([(header::CONTENT_TYPE, NDJSON)], body).into_response())
        }
    }
}

/// JSON body to request, with schema violations reported as payload errors
fn parse_request(body: &[u8]) -> Result<InvocationRequest, InvocationError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| InvocationError::Payload(e.to_string()))?;
    InvocationRequest::from_body(value).map_err(|e| InvocationError::Payload(e.to_string()))
}

/// Drive the agent to the end and keep the last assistant message.
/// A missing or empty final reply becomes the apology message.
/// The session is dropped on return, which removes the workspace.
async fn final_message(request_id: &str, session: InvocationSession) -> InvocationResponse {
    let InvocationSession { mut events, lifecycle } = session;

    let mut last = None;
    while let Some(event) = events.next().await {
        match event {
            Ok(event) => {
                if let Some(message) = event.assistant_message() {
                    last = Some(message.clone());
                }
            }
            Err(e) => {
                error!(
                    "[{}] - [{}] Error in invocation: {}",
                    request_id,
                    lifecycle.session_id(),
                    e
                );
                return InvocationResponse::error(&e.to_string());
            }
        }
    }

    match last.filter(|message| !message.content.is_empty()) {
        Some(message) => {
            info!("[{}] - [{}] Response generated", request_id, lifecycle.session_id());
            InvocationResponse::new(message)
        }
        None => InvocationResponse::empty(),
    }
}

/// Health check polled by the runtime host
pub async fn handle_ping() -> Json<Value> {
    Json(json!({"status": "healthy", "service": "generic-agent-core-runtime"}))
}
