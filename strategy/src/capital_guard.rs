//! Capital Guard (spec §4.12, C12): a pure function of `(capital, stats, signal)`.
//! No I/O, no clock, no storage — the Executor calls this once per entry signal and
//! either gets a clamped order size or a [`CapitalGuardReject`] reason.

use sandbox::EntrySignal;

use crate::error::CapitalGuardReject;
use crate::model::{Capital, Mode, SizingMethod, Stats};

/// Evaluates one proposed entry against the strategy's capital invariants (spec
/// §4.12). Reject order follows the spec's listed order: position-count, capital,
/// daily-loss, then mode/approval.
pub fn evaluate(
    capital: &Capital,
    stats: &Stats,
    mode: Mode,
    approved: bool,
    signal: &EntrySignal,
) -> Result<f64, CapitalGuardReject> {
    if stats.current_positions >= capital.max_positions {
        return Err(CapitalGuardReject::MaxPositionsReached);
    }
    let size = proposed_size(capital, signal.confidence);
    if stats.deployed_capital + size >= capital.total {
        return Err(CapitalGuardReject::CapitalExhausted);
    }
    if stats.daily_loss >= capital.max_daily_loss {
        return Err(CapitalGuardReject::DailyLossLimitReached);
    }
    if mode == Mode::Live && !approved {
        return Err(CapitalGuardReject::LiveModeNotApproved);
    }
    Ok(size)
}

/// Position size from `capital.sizing_method` (spec §4.12), clamped to
/// `[0, capital.total - stats.deployed]` is applied by the caller using `stats`;
/// this only derives the unclamped size, then clamps against `capital.total` alone
/// since `evaluate` above already checks `deployed + size` against `total`.
fn proposed_size(capital: &Capital, confidence: f64) -> f64 {
    let raw = match capital.sizing_method {
        SizingMethod::Fixed => capital.per_trade,
        SizingMethod::Percent => (capital.per_trade / 100.0) * capital.total,
        SizingMethod::Kelly => capital.per_trade * confidence,
    };
    raw.clamp(0.0, capital.total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capital(sizing_method: SizingMethod) -> Capital {
        Capital { total: 1000.0, per_trade: 100.0, max_positions: 5, max_daily_loss: 200.0, sizing_method }
    }

    fn signal(confidence: f64) -> EntrySignal {
        EntrySignal { market_id: "AAPL".into(), side: "buy".into(), reason: "momentum".into(), confidence }
    }

    #[test]
    fn fixed_sizing_uses_per_trade_verbatim() {
        let size = evaluate(&capital(SizingMethod::Fixed), &Stats::default(), Mode::Paper, true, &signal(0.9)).unwrap();
        assert_eq!(size, 100.0);
    }

    #[test]
    fn kelly_sizing_scales_by_confidence() {
        let size = evaluate(&capital(SizingMethod::Kelly), &Stats::default(), Mode::Paper, true, &signal(0.5)).unwrap();
        assert_eq!(size, 50.0);
    }

    #[test]
    fn percent_sizing_is_a_fraction_of_total() {
        let size = evaluate(&capital(SizingMethod::Percent), &Stats::default(), Mode::Paper, true, &signal(0.9)).unwrap();
        assert_eq!(size, 100.0);
    }

    #[test]
    fn rejects_when_position_count_is_at_the_cap() {
        let stats = Stats { current_positions: 5, ..Default::default() };
        let err = evaluate(&capital(SizingMethod::Fixed), &stats, Mode::Paper, true, &signal(0.9)).unwrap_err();
        assert_eq!(err, CapitalGuardReject::MaxPositionsReached);
    }

    #[test]
    fn rejects_when_deployed_plus_size_would_reach_total() {
        let stats = Stats { deployed_capital: 950.0, ..Default::default() };
        let err = evaluate(&capital(SizingMethod::Fixed), &stats, Mode::Paper, true, &signal(0.9)).unwrap_err();
        assert_eq!(err, CapitalGuardReject::CapitalExhausted);
    }

    #[test]
    fn rejects_when_daily_loss_limit_is_reached() {
        let stats = Stats { daily_loss: 200.0, ..Default::default() };
        let err = evaluate(&capital(SizingMethod::Fixed), &stats, Mode::Paper, true, &signal(0.9)).unwrap_err();
        assert_eq!(err, CapitalGuardReject::DailyLossLimitReached);
    }

    #[test]
    fn rejects_live_mode_without_approval() {
        let err = evaluate(&capital(SizingMethod::Fixed), &Stats::default(), Mode::Live, false, &signal(0.9)).unwrap_err();
        assert_eq!(err, CapitalGuardReject::LiveModeNotApproved);
    }

    #[test]
    fn approved_live_mode_is_allowed() {
        let size = evaluate(&capital(SizingMethod::Fixed), &Stats::default(), Mode::Live, true, &signal(0.9)).unwrap();
        assert_eq!(size, 100.0);
    }
}
