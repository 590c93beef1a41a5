//! One HTTP turn: accept a user message, drive [`AgentLoop::run_turn`], and stream
//! every emitted event back as an SSE frame (spec §4.1, §6.1).
//!
//! The transport is one-way and stateless per request — there's no client→server
//! frame once the turn starts, unlike the teacher's WebSocket request/response
//! dispatch. A client that drops the connection cancels the turn: the SSE body's
//! sender side fails on the next `tx.send`, and that failure flips the turn's
//! [`CancelToken`], which the agent loop already checks once per iteration.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Json, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use engine::{CancelToken, TurnRequest};
use serde::Deserialize;
use stream_event::to_sse_frame;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct TurnHttpRequest {
    pub user_id: String,
    pub chat_id: String,
    pub message: String,
}

pub async fn handle_turn(State(state): State<Arc<AppState>>, Json(req): Json<TurnHttpRequest>) -> Response {
    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = CancelToken::new();

    let turn_req =
        TurnRequest { user_id: req.user_id, chat_id: req.chat_id, user_message: req.message, cancel: cancel.clone() };

    let agent = state.agent.clone();
    tokio::spawn(async move {
        let emit_cancel = cancel.clone();
        let result = agent
            .run_turn(turn_req, move |event| {
                if tx.send(event).is_err() {
                    emit_cancel.cancel();
                    return false;
                }
                true
            })
            .await;
        if let Err(err) = result {
            tracing::warn!(error = %err, "turn ended with an error");
        }
    });

    let frames = UnboundedReceiverStream::new(rx).map(|event| {
        let frame = to_sse_frame(&event).unwrap_or_else(|err| {
            format!("event: error\ndata: {{\"error\":\"frame encoding failed: {err}\"}}\n\n")
        });
        Ok::<_, std::convert::Infallible>(Bytes::from(frame))
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header("x-accel-buffering", "no")
        .body(Body::from_stream(frames))
        .unwrap()
        .into_response()
}
