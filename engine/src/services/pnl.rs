//! Profit and loss rollups over a user's trades.

use rust_decimal::Decimal;
use serde::Serialize;
use shared::{Trade, TradeOutcome};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PnlSummary {
    pub active_trades: usize,
    pub settled_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Percentage of settled trades won, two decimals.
    pub win_rate: Decimal,
    /// Stake currently held in escrow by active trades.
    pub open_stake: Decimal,
    pub total_staked: Decimal,
    pub total_commission: Decimal,
    pub total_net_profit: Decimal,
    /// Net profit relative to stake settled, two decimals.
    pub realized_pnl_percent: Decimal,
}

pub fn summarize(trades: &[Trade]) -> PnlSummary {
    let mut summary = PnlSummary::default();

    for trade in trades {
        let Some(settlement) = &trade.settlement else {
            summary.active_trades += 1;
            summary.open_stake += trade.stake;
            continue;
        };

        summary.settled_trades += 1;
        summary.total_staked += trade.stake;
        summary.total_net_profit += settlement.net_profit;
        match settlement.outcome {
            TradeOutcome::Win => {
                summary.winning_trades += 1;
                summary.total_commission += settlement.commission;
            }
            TradeOutcome::Lose => summary.losing_trades += 1,
        }
    }

    if summary.settled_trades > 0 {
        summary.win_rate = (Decimal::from(summary.winning_trades as u64) * Decimal::ONE_HUNDRED
            / Decimal::from(summary.settled_trades as u64))
        .round_dp(2);
    }
    if !summary.total_staked.is_zero() {
        summary.realized_pnl_percent =
            (summary.total_net_profit / summary.total_staked * Decimal::ONE_HUNDRED).round_dp(2);
    }

    summary
}
