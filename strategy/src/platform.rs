//! Platform/broker collaborator contract (spec §6.5): Polymarket/Kalshi/Alpaca/
//! SnapTrade wire formats are explicit non-goals, so this crate only defines the
//! shape the Executor calls through. A real binary wires in a concrete client per
//! platform; tests use an in-memory fake.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sandbox::Position;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderParams {
    pub strategy_id: String,
    pub market_id: String,
    pub side: String,
    pub size: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
    pub filled: bool,
    pub fill_price: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub account: String,
    pub kind: String,
    pub amount: f64,
    pub occurred_at: DateTime<Utc>,
}

/// Broker/platform client (spec §6.5): `get_positions`, `submit_order`,
/// `get_activities`. Injected, not implemented here — wire formats are an explicit
/// non-goal (spec §1).
#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn get_positions(&self, strategy_id: &str) -> Result<Vec<Position>, String>;
    async fn submit_order(&self, params: OrderParams) -> Result<OrderAck, String>;
    async fn get_activities(&self, user_id: &str, account: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Activity>, String>;
}
