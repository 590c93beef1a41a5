//! Axum app: shared state and the route table.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use engine::AgentLoop;

use crate::turn::handle_turn;

/// Shared across every request. The agent loop is the one collaborator this crate
/// actually owns; the LLM client and tool registry it was built with are injected by
/// whatever binary constructs it (spec §6.5).
pub struct AppState {
    pub agent: Arc<AgentLoop>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new().route("/turns", post(handle_turn)).route("/healthz", get(healthz)).with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}
