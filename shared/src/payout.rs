//! Payout schedule and the settlement arithmetic.
//!
//! Everything here is pure: terms are resolved once when a trade opens and the
//! settlement numbers are derived from the frozen terms plus the exit price.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::TradeError;
use crate::models::{Direction, Settlement, Trade, TradeOutcome, MONEY_SCALE};

/// Durations (seconds) a trade may be opened for.
pub const SUPPORTED_DURATIONS: [u32; 5] = [60, 100, 200, 300, 600];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutTerms {
    pub profit_rate: Decimal,
    pub commission_rate: Decimal,
}

/// Sell trades up to `max_duration_secs` (inclusive) pay `profit_rate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SellTier {
    pub max_duration_secs: u32,
    pub profit_rate: Decimal,
}

/// One row of the order form, derived from the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntry {
    pub duration_secs: u32,
    pub profit_rate: Decimal,
    pub commission_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutSchedule {
    durations: Vec<u32>,
    buy_profit_rate: Decimal,
    sell_tiers: Vec<SellTier>,
    sell_fallback_rate: Decimal,
    commission_rate: Decimal,
}

impl Default for PayoutSchedule {
    fn default() -> Self {
        Self {
            durations: SUPPORTED_DURATIONS.to_vec(),
            buy_profit_rate: Decimal::new(85, 2),
            sell_tiers: vec![
                SellTier { max_duration_secs: 60, profit_rate: Decimal::new(8, 2) },
                SellTier { max_duration_secs: 300, profit_rate: Decimal::new(20, 2) },
            ],
            sell_fallback_rate: Decimal::new(40, 2),
            commission_rate: Decimal::new(1, 2),
        }
    }
}

impl PayoutSchedule {
    pub fn with_commission_rate(mut self, commission_rate: Decimal) -> Self {
        self.commission_rate = commission_rate;
        self
    }

    pub fn durations(&self) -> &[u32] {
        &self.durations
    }

    pub fn commission_rate(&self) -> Decimal {
        self.commission_rate
    }

    pub fn is_supported(&self, duration_secs: u32) -> bool {
        self.durations.contains(&duration_secs)
    }

    /// Resolves the frozen terms for a new trade.
    pub fn quote(&self, direction: Direction, duration_secs: u32) -> Result<PayoutTerms, TradeError> {
        if !self.is_supported(duration_secs) {
            return Err(TradeError::InvalidDuration(duration_secs));
        }

        let profit_rate = match direction {
            Direction::Buy => self.buy_profit_rate,
            Direction::Sell => self
                .sell_tiers
                .iter()
                .find(|tier| duration_secs <= tier.max_duration_secs)
                .map(|tier| tier.profit_rate)
                .unwrap_or(self.sell_fallback_rate),
        };

        Ok(PayoutTerms {
            profit_rate,
            commission_rate: self.commission_rate,
        })
    }

    /// Every offered duration with the terms it would lock in.
    pub fn menu(&self, direction: Direction) -> Vec<MenuEntry> {
        self.durations
            .iter()
            .filter_map(|&duration_secs| {
                self.quote(direction, duration_secs).ok().map(|terms| MenuEntry {
                    duration_secs,
                    profit_rate: terms.profit_rate,
                    commission_rate: terms.commission_rate,
                })
            })
            .collect()
    }
}

/// Strict comparison: an unchanged price loses for both directions.
pub fn resolve_outcome(direction: Direction, entry_price: Decimal, exit_price: Decimal) -> TradeOutcome {
    let price_delta = exit_price - entry_price;
    let won = match direction {
        Direction::Buy => price_delta > Decimal::ZERO,
        Direction::Sell => price_delta < Decimal::ZERO,
    };
    if won {
        TradeOutcome::Win
    } else {
        TradeOutcome::Lose
    }
}

/// Settlement figures for `trade` closing at `exit_price`.
///
/// Win: payout = stake + stake * profit_rate, net = stake * profit_rate - stake * commission_rate.
/// Lose: payout = 0, net = -stake.
///
/// The exit price, gross profit and commission are rounded to `MONEY_SCALE` places before
/// they are combined, so every stored figure is exact at ledger precision.
pub fn compute_settlement(trade: &Trade, exit_price: Decimal, settled_at: DateTime<Utc>) -> Settlement {
    let exit_price = exit_price.round_dp(MONEY_SCALE);
    let outcome = resolve_outcome(trade.direction, trade.entry_price, exit_price);
    let commission = (trade.stake * trade.commission_rate).round_dp(MONEY_SCALE);

    let (payout, net_profit) = match outcome {
        TradeOutcome::Win => {
            let gross_profit = (trade.stake * trade.profit_rate).round_dp(MONEY_SCALE);
            (trade.stake + gross_profit, gross_profit - commission)
        }
        TradeOutcome::Lose => (Decimal::ZERO, -trade.stake),
    };

    Settlement {
        outcome,
        exit_price,
        commission,
        payout,
        net_profit,
        settled_at,
    }
}
