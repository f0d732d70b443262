//! WebSocket event channel.
//!
//! Clients send `{"event": "...", "data": {...}}` frames and receive zero or
//! more frames of the same shape back, in order. Each connection processes
//! its requests one at a time.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};

use crate::ops::{
    self, Failure, Reply, Request, DELETED_MESSAGE, RENAMED_MESSAGE, UNCHANGED_MESSAGE,
};
use crate::server::ServerState;

/// One server-to-client event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub event: &'static str,
    pub data: Value,
}

impl Frame {
    /// Builds a frame, or an `error` frame if `data` cannot be encoded.
    fn new(event: &'static str, data: impl Serialize) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => Self { event, data },
            Err(error) => {
                tracing::error!("failed to encode {event} payload: {error}");
                Self {
                    event: "error",
                    data: Value::String(format!("failed to encode {event} payload")),
                }
            }
        }
    }

    fn bare(event: &'static str) -> Self {
        Self {
            event,
            data: Value::Null,
        }
    }
}

pub(crate) async fn ws_handler(
    State(state): State<Arc<ServerState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: Arc<ServerState>, socket: WebSocket) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    tracing::debug!("socket connected");

    while let Some(Ok(msg)) = ws_stream.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        for frame in handle_text(&state, &text).await {
            let encoded = match serde_json::to_string(&frame) {
                Ok(encoded) => encoded,
                Err(error) => {
                    tracing::error!("failed to encode {} frame: {error}", frame.event);
                    continue;
                }
            };
            if ws_sink.send(Message::Text(encoded.into())).await.is_err() {
                tracing::debug!("socket closed while sending");
                return;
            }
        }
    }
    tracing::debug!("socket disconnected");
}

/// Decodes and runs one client frame.
pub(crate) async fn handle_text(state: &ServerState, text: &str) -> Vec<Frame> {
    match serde_json::from_str::<Request>(text) {
        Ok(request) => frames(ops::execute(state, request).await),
        Err(error) => vec![Frame::new("error", format!("invalid message: {error}"))],
    }
}

/// Renders a reply as the frames the client expects.
pub fn frames(result: Result<Reply, Failure>) -> Vec<Frame> {
    let reply = match result {
        Ok(reply) => reply,
        Err(failure) => return vec![Frame::new("error", failure.message)],
    };

    match reply {
        Reply::Results(results) => vec![Frame::new("results", results.as_ref())],
        Reply::Tags(tags) => vec![Frame::new("tags", tags.as_ref())],
        Reply::Renamed {
            results: Some(results),
            ..
        } => vec![
            Frame::new("success", RENAMED_MESSAGE),
            Frame::new("results", results),
        ],
        Reply::Renamed { path, results: None } => vec![
            Frame::new("success", RENAMED_MESSAGE),
            Frame::new("rename_success", json!({ "path": path })),
        ],
        Reply::Unchanged => vec![Frame::new("unchanged", UNCHANGED_MESSAGE)],
        Reply::Deleted {
            results: Some(results),
        } => vec![
            Frame::new("success", DELETED_MESSAGE),
            Frame::new("results", results),
        ],
        Reply::Deleted { results: None } => vec![Frame::bare("delete_success")],
        Reply::Opened => vec![Frame::bare("open_success")],
        Reply::Uploaded { url } => vec![Frame::new("catbox_success", url)],
    }
}
