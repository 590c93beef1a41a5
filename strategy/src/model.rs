//! Strategy data model (spec §3): the persistent record a Loader (§4.9), Executor
//! (§4.10), Scheduler (§4.11), and Capital Guard (§4.12) all read and write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Monotone trading mode. Progression is gated by the Scheduler's graduation rule
/// (§4.11), never written directly by the Executor or Capital Guard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Backtest,
    Paper,
    Live,
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "backtest" => Ok(Self::Backtest),
            "paper" => Ok(Self::Paper),
            "live" => Ok(Self::Live),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Backtest => write!(f, "backtest"),
            Mode::Paper => write!(f, "paper"),
            Mode::Live => write!(f, "live"),
        }
    }
}

/// Position sizing method (spec §4.12).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizingMethod {
    Fixed,
    Percent,
    Kelly,
}

impl std::str::FromStr for SizingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "percent" => Ok(Self::Percent),
            "kelly" => Ok(Self::Kelly),
            other => Err(format!("unknown sizing_method: {other}")),
        }
    }
}

/// Per-strategy capital invariants (spec §3, §4.12).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Capital {
    pub total: f64,
    pub per_trade: f64,
    pub max_positions: u32,
    pub max_daily_loss: f64,
    pub sizing_method: SizingMethod,
}

/// Rolling counters updated only inside a strategy's own serialized cycle (spec §5).
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Stats {
    pub trades: u32,
    pub wins: u32,
    pub losses: u32,
    pub pnl: f64,
    /// Realized losses accumulated since [`Self::daily_loss_reset_at`] (spec §4.12
    /// Capital Guard's kill-switch). Resets to 0 the first cycle that runs on a new
    /// UTC calendar day.
    #[serde(default)]
    pub daily_loss: f64,
    #[serde(default)]
    pub daily_loss_reset_at: Option<DateTime<Utc>>,
    /// Peak-to-current retracement of cumulative realized pnl (spec §4.11 graduation
    /// rule), as a fraction of the peak. 0 until pnl has a positive peak to fall from.
    #[serde(default)]
    pub drawdown: f64,
    #[serde(default)]
    pub peak_pnl: f64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub current_positions: u32,
    pub deployed_capital: f64,
}

impl Stats {
    /// Folds one realized exit's pnl into `pnl`, `drawdown`, and `daily_loss` (spec
    /// §4.10 step 6). `now` is the executor's clock, used both as the peak-drawdown
    /// sample point and as the daily-loss reset boundary.
    pub fn record_realized_pnl(&mut self, realized_pnl: f64, now: DateTime<Utc>) {
        self.pnl += realized_pnl;
        self.peak_pnl = self.peak_pnl.max(self.pnl);
        self.drawdown = if self.peak_pnl > 0.0 { ((self.peak_pnl - self.pnl) / self.peak_pnl).max(0.0) } else { 0.0 };

        if realized_pnl < 0.0 {
            let same_day = self.daily_loss_reset_at.is_some_and(|reset_at| reset_at.date_naive() == now.date_naive());
            if !same_day {
                self.daily_loss = 0.0;
                self.daily_loss_reset_at = Some(now);
            }
            self.daily_loss += -realized_pnl;
        }
    }
}

impl Stats {
    pub fn win_rate(&self) -> f64 {
        if self.trades == 0 {
            0.0
        } else {
            self.wins as f64 / self.trades as f64
        }
    }
}

/// Identifiers of the three ChatFiles a strategy's code and config live in (spec §6.4).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileRefs {
    pub entry: String,
    pub exit: String,
    pub config: String,
}

/// Persistent record of a user-authored bot (spec §3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Strategy {
    pub id: String,
    pub user_id: String,
    pub chat_id: String,
    pub name: String,
    pub thesis: String,
    pub platform: String,
    pub execution_frequency_seconds: u64,
    pub capital: Capital,
    pub parameters: serde_json::Value,
    pub file_ids: FileRefs,
    pub mode: Mode,
    pub enabled: bool,
    pub approved: bool,
    pub stats: Stats,
}

impl Strategy {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.stats.last_run_at {
            None => true,
            Some(last) => (now - last).num_seconds() >= self.execution_frequency_seconds as i64,
        }
    }

    /// Graduation rule (spec §4.11): all four conditions must hold before a user is
    /// even allowed to request `mode = live`.
    pub fn meets_graduation_criteria(&self) -> bool {
        self.stats.trades >= 20
            && self.stats.win_rate() > 0.55
            && self.stats.pnl > 0.0
            && self.stats.drawdown < 0.20
    }
}
