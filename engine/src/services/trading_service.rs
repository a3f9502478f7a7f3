//! User-facing trading operations: placing trades, views over active and settled
//! trades, and the account ledger.

use chrono::Duration as ChronoDuration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    compute_settlement, is_valid_amount, normalize_symbol, resolve_outcome, CoinQuote, Direction,
    MenuEntry, PayoutSchedule, Trade, TradeError, TradeEvent, TradeOutcome, Transaction,
    MONEY_SCALE, QUOTE_ASSET,
};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use super::pnl::{self, PnlSummary};
use super::settlement::{SettlementEngine, OWNER_SETTLE_ATTEMPTS};
use crate::clock::Clock;
use crate::notifier::NotificationSink;
use crate::price_source::PriceSource;
use crate::repositories::{NewTrade, TradeStore};

/// Largest page served by the list endpoints.
pub const MAX_PAGE: u64 = 500;

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceTrade {
    pub pair: String,
    pub direction: Direction,
    pub stake: Decimal,
    #[serde(alias = "duration")]
    pub duration_secs: u32,
}

/// An unexpired trade with its live, non-binding valuation.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveTradeView {
    #[serde(flatten)]
    pub trade: Trade,
    pub pair: String,
    pub time_left_secs: i64,
    pub live_price: Option<Decimal>,
    pub provisional_outcome: Option<TradeOutcome>,
    pub provisional_net_profit: Option<Decimal>,
}

pub struct TradingService {
    store: Arc<dyn TradeStore>,
    prices: Arc<dyn PriceSource>,
    settlement: Arc<SettlementEngine>,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    schedule: PayoutSchedule,
    single_active_trade: bool,
}

impl TradingService {
    pub fn new(
        store: Arc<dyn TradeStore>,
        prices: Arc<dyn PriceSource>,
        settlement: Arc<SettlementEngine>,
        notifier: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        schedule: PayoutSchedule,
    ) -> Self {
        Self {
            store,
            prices,
            settlement,
            notifier,
            clock,
            schedule,
            single_active_trade: true,
        }
    }

    pub fn with_single_active_trade(mut self, enabled: bool) -> Self {
        self.single_active_trade = enabled;
        self
    }

    /// Opens a trade: validates the request, freezes the payout terms and entry price,
    /// escrows the stake and arms the settlement timer.
    pub async fn place_trade(&self, user_id: i64, request: PlaceTrade) -> Result<Trade, TradeError> {
        if !is_valid_amount(request.stake) {
            return Err(TradeError::InvalidStake(request.stake));
        }
        let terms = self.schedule.quote(request.direction, request.duration_secs)?;
        let symbol = normalize_symbol(&request.pair)
            .ok_or_else(|| TradeError::UnknownInstrument(request.pair.clone()))?;

        // Cheap early refusal; the store re-checks atomically with the debit.
        if self.single_active_trade && !self.store.active_trades(user_id).await?.is_empty() {
            return Err(TradeError::ActiveTradeExists(user_id));
        }

        let entry_price = self.prices.current_price(&symbol).await?.round_dp(MONEY_SCALE);
        let start_time = self.clock.now();
        let new_trade = NewTrade {
            id: Uuid::new_v4(),
            user_id,
            symbol,
            direction: request.direction,
            stake: request.stake,
            duration_secs: request.duration_secs,
            entry_price,
            terms,
            start_time,
            settlement_time: start_time + ChronoDuration::seconds(i64::from(request.duration_secs)),
        };

        let trade = self.store.open_trade(new_trade, self.single_active_trade).await?;
        info!(
            trade_id = %trade.id,
            user_id,
            pair = %trade.pair(),
            direction = %trade.direction,
            stake = %trade.stake,
            entry = %trade.entry_price,
            duration_secs = trade.duration_secs,
            "Trade placed"
        );

        self.settlement.schedule(&trade);

        let event = TradeEvent::Placed {
            trade_id: trade.id,
            symbol: trade.symbol.clone(),
            direction: trade.direction,
            stake: trade.stake,
            settlement_time: trade.settlement_time,
        };
        if let Err(e) = self.notifier.emit(user_id, event).await {
            error!(trade_id = %trade.id, error = %e, "Failed to deliver placement notification");
        }

        Ok(trade)
    }

    /// Unsettled trades that have not reached their settlement time.
    pub async fn active_trades(&self, user_id: i64) -> Result<Vec<Trade>, TradeError> {
        let now = self.clock.now();
        let trades = self.store.active_trades(user_id).await?;
        Ok(trades.into_iter().filter(|t| !t.is_due(now)).collect())
    }

    /// Active trades with countdown and a provisional outcome at the current price.
    ///
    /// A missing live price leaves the provisional fields empty rather than failing.
    pub async fn active_trade_views(&self, user_id: i64) -> Result<Vec<ActiveTradeView>, TradeError> {
        let trades = self.active_trades(user_id).await?;
        let mut views = Vec::with_capacity(trades.len());
        for trade in trades {
            let now = self.clock.now();
            let live_price = self.prices.current_price(&trade.symbol).await.ok();
            let provisional_outcome =
                live_price.map(|price| resolve_outcome(trade.direction, trade.entry_price, price));
            let provisional_net_profit =
                live_price.map(|price| compute_settlement(&trade, price, now).net_profit);
            views.push(ActiveTradeView {
                pair: trade.pair(),
                time_left_secs: trade.time_left_secs(now),
                live_price,
                provisional_outcome,
                provisional_net_profit,
                trade,
            });
        }
        Ok(views)
    }

    pub async fn history(&self, user_id: i64, limit: u64) -> Result<Vec<Trade>, TradeError> {
        self.store.trade_history(user_id, limit.clamp(1, MAX_PAGE)).await
    }

    /// A single trade, visible only to its owner.
    pub async fn trade(&self, user_id: i64, trade_id: Uuid) -> Result<Trade, TradeError> {
        let trade = self
            .store
            .find_trade(trade_id)
            .await?
            .ok_or(TradeError::TradeNotFound(trade_id))?;
        if trade.user_id != user_id {
            return Err(TradeError::Unauthorized { user_id, trade_id });
        }
        Ok(trade)
    }

    /// Settled trades the user has not acknowledged yet.
    pub async fn recent_results(&self, user_id: i64) -> Result<Vec<Trade>, TradeError> {
        self.store.unseen_results(user_id).await
    }

    pub async fn mark_result_seen(&self, user_id: i64, trade_id: Uuid) -> Result<Trade, TradeError> {
        let trade = self.trade(user_id, trade_id).await?;
        if self.store.mark_result_seen(trade_id).await? {
            return self.trade(user_id, trade_id).await;
        }
        Ok(trade)
    }

    /// Settles a due trade on the owner's request. Repeating the call is harmless.
    ///
    /// Gives up with `PriceUnavailable` after a few exit-price attempts; the trade's timer
    /// settles it once the feed recovers.
    pub async fn settle_now(&self, user_id: i64, trade_id: Uuid) -> Result<Trade, TradeError> {
        self.trade(user_id, trade_id).await?;
        Ok(self
            .settlement
            .settle_bounded(trade_id, OWNER_SETTLE_ATTEMPTS)
            .await?
            .into_trade())
    }

    pub async fn open_account(&self, user_id: i64, username: Option<String>) -> Result<Decimal, TradeError> {
        self.store.create_account(user_id, username).await?;
        self.store.balance(user_id).await
    }

    pub async fn balance(&self, user_id: i64) -> Result<Decimal, TradeError> {
        self.store.balance(user_id).await
    }

    /// Credits the account, creating it on first deposit.
    pub async fn deposit(&self, user_id: i64, amount: Decimal) -> Result<Transaction, TradeError> {
        if !is_valid_amount(amount) {
            return Err(TradeError::InvalidAmount(amount));
        }
        self.store.create_account(user_id, None).await?;
        let tx = self
            .store
            .deposit(user_id, amount, QUOTE_ASSET, self.clock.now())
            .await?;
        info!(user_id, amount = %amount, "Deposit credited");
        Ok(tx)
    }

    pub async fn withdraw(&self, user_id: i64, amount: Decimal, address: &str) -> Result<Transaction, TradeError> {
        if !is_valid_amount(amount) {
            return Err(TradeError::InvalidAmount(amount));
        }
        let tx = self
            .store
            .withdraw(user_id, amount, QUOTE_ASSET, address, self.clock.now())
            .await?;
        info!(user_id, amount = %amount, "Withdrawal debited");
        Ok(tx)
    }

    pub async fn transactions(&self, user_id: i64, limit: u64) -> Result<Vec<Transaction>, TradeError> {
        self.store.transactions(user_id, limit.clamp(1, MAX_PAGE)).await
    }

    pub async fn pnl_summary(&self, user_id: i64) -> Result<PnlSummary, TradeError> {
        let trades = self.store.trade_history(user_id, u64::MAX).await?;
        Ok(pnl::summarize(&trades))
    }

    /// Current price of a user-supplied pair, with the symbol it normalized to.
    pub async fn price(&self, pair: &str) -> Result<(String, Decimal), TradeError> {
        let symbol =
            normalize_symbol(pair).ok_or_else(|| TradeError::UnknownInstrument(pair.to_string()))?;
        let price = self.prices.current_price(&symbol).await?;
        Ok((symbol, price))
    }

    /// Market list: every instrument the price source quotes, sorted by symbol.
    pub async fn market(&self) -> Result<Vec<CoinQuote>, TradeError> {
        let mut quotes = self.prices.quotes().await?;
        quotes.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(quotes)
    }

    pub fn payout_menu(&self, direction: Direction) -> Vec<MenuEntry> {
        self.schedule.menu(direction)
    }
}
