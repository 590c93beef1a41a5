//! Strategy-code return shapes (spec §3): `EntrySignal`/`ExitSignal`, and the contexts
//! user code receives as its only way to see the outside world (§4.4 invariant 4:
//! no implicit clock — `now` arrives as an explicit field).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read-through view of an open position, reported by the platform collaborator
/// (spec §3 Position — not owned by this system).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Position {
    pub position_id: String,
    pub market_id: String,
    pub side: String,
    pub size: f64,
    pub entry_price: f64,
    pub unrealized_pnl: f64,
}

/// Data handed to `entry(ctx)` / `exit(ctx, position)` (spec §4.4's `data` argument).
/// Opaque to the sandbox itself; tools populate `market_data` before invocation.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct StrategyContext {
    pub now: DateTime<Utc>,
    pub market_data: serde_json::Value,
}

/// Produced by `entry(ctx)` (spec §3): `{market_id, side, reason, confidence}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntrySignal {
    pub market_id: String,
    pub side: String,
    pub reason: String,
    pub confidence: f64,
}

/// Produced by `exit(ctx, position)` (spec §3): `{position_id, reason}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExitSignal {
    pub position_id: String,
    pub reason: String,
}
