use axum::body::Bytes;
use futures::stream::{Stream, StreamExt};
use genu_core::{AgentError, AgentEvent};
use serde::Serialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use tracing::error;

use crate::apis::invocations::error_text;
use crate::session::InvocationSession;

/// Trait for formatting AgentEvents into the lines written to the client
pub trait EventFormatter: Send {
    type Output: Serialize + Send;

    /// Convert an AgentEvent to its output line
    /// Returns None if the event should be filtered out
    fn format_event(&mut self, event: AgentEvent) -> Option<Self::Output>;

    /// Line written when the agent fails; the stream ends after it
    fn format_error(&mut self, error: &AgentError) -> Self::Output;
}

/// Relays raw model stream events as `{"event": {...}}` and failures as
/// `{"error": true, "message": ...}`. Assembled messages are not repeated.
#[derive(Debug, Default)]
pub struct RelayFormatter;

impl EventFormatter for RelayFormatter {
    type Output = Value;

    fn format_event(&mut self, event: AgentEvent) -> Option<Value> {
        match event {
            AgentEvent::Event(_) => serde_json::to_value(&event).ok(),
            AgentEvent::Message(_) => None,
        }
    }

    fn format_error(&mut self, error: &AgentError) -> Value {
        error_line(&error.to_string())
    }
}

pub fn error_line(error: &str) -> Value {
    json!({"error": true, "message": error_text(error)})
}

/// Serialize one output as a newline-terminated JSON line
pub fn ndjson_line<T: Serialize>(output: &T) -> Option<Bytes> {
    match serde_json::to_vec(output) {
        Ok(mut line) => {
            line.push(b'\n');
            Some(Bytes::from(line))
        }
        Err(e) => {
            error!("Failed to serialize event: {}", e);
            None
        }
    }
}

/// Turn a running invocation into NDJSON body chunks.
/// The session (and with it the workspace) lives in the stream state, so it is
/// released when the agent finishes, fails, or the client goes away.
pub fn session_to_ndjson_stream<F>(
    session: InvocationSession,
    formatter: F,
) -> impl Stream<Item = Result<Bytes, Infallible>>
where
    F: EventFormatter + 'static,
{
    let InvocationSession { events, lifecycle } = session;

    futures::stream::unfold(
        (events, formatter, false, lifecycle),
        |(mut events, mut fmt, done, lifecycle)| async move {
            if done {
                return None;
            }

            loop {
                match events.next().await {
                    Some(Ok(event)) => {
                        let Some(output) = fmt.format_event(event) else {
                            continue;
                        };
                        if let Some(line) = ndjson_line(&output) {
                            return Some((Ok(line), (events, fmt, false, lifecycle)));
                        }
                    }
                    Some(Err(e)) => {
                        error!(
                            "[{}] Error in streaming response: {}",
                            lifecycle.session_id(),
                            e
                        );
                        let output = fmt.format_error(&e);
                        let line = ndjson_line(&output).unwrap_or_default();
                        return Some((Ok(line), (events, fmt, true, lifecycle)));
                    }
                    None => return None,
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use genu_llm::{Message, Role, StreamEvent};

    #[test]
    fn relay_keeps_only_stream_events() {
        let mut fmt = RelayFormatter;
        assert!(fmt
            .format_event(AgentEvent::Message(Message::assistant_text("hi")))
            .is_none());

        let line = fmt
            .format_event(AgentEvent::Event(StreamEvent::MessageStart {
                role: Role::Assistant,
            }))
            .unwrap();
        assert_eq!(line, json!({"event": {"messageStart": {"role": "assistant"}}}));
    }

    #[test]
    fn errors_become_error_lines() {
        let mut fmt = RelayFormatter;
        let line = fmt.format_error(&AgentError::IncompleteResponse);
        assert_eq!(line["error"], json!(true));
        assert_eq!(
            line["message"],
            json!(error_text("model stream ended before the message was complete"))
        );
    }

    #[test]
    fn lines_end_with_newline() {
        let line = ndjson_line(&json!({"a": 1})).unwrap();
        assert_eq!(&line[..], b"{\"a\":1}\n");
    }
}
