//! # serve
//!
//! HTTP/SSE transport fronting the Agent Loop (spec §4.1, §6.1, C*). One `POST
//! /turns` drives one turn of `engine::AgentLoop` to completion, streaming every
//! `stream_event::Event` back on the response body as `event: <type>\ndata:
//! <json>\n\n`. Unlike the teacher's WebSocket server this is one-way and
//! stateless per request: the spec's transport is "one TCP response body... no
//! reconnection semantics" (§4.1), not a bidirectional session.
//!
//! **Public API**: [`run_serve`], [`run_serve_on_listener`], [`AppState`].

mod app;
mod turn;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

pub use app::AppState;
use app::router;

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Runs the SSE server on an existing listener. Used by tests (bind to
/// `127.0.0.1:0`, then pass the listener in so the bound port can be read back).
pub async fn run_serve_on_listener(
    listener: TcpListener,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = listener.local_addr()?;
    info!("SSE server listening on http://{}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Runs the SSE server. Listens on `addr` (default `127.0.0.1:8080`).
pub async fn run_serve(
    addr: Option<&str>,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = addr.unwrap_or(DEFAULT_ADDR);
    let listener = TcpListener::bind(addr).await?;
    run_serve_on_listener(listener, state).await
}
