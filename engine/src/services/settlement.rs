//! Expiry-driven settlement.
//!
//! Each active trade gets one timer task that sleeps until its settlement time and then
//! settles it. A periodic recovery sweep re-arms timers for active trades that have none
//! (after a restart, or when a task gave up), so every trade is eventually settled.

use rust_decimal::Decimal;
use shared::{compute_settlement, Trade, TradeError, TradeEvent};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::Retry;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::clock::{self, Clock};
use crate::notifier::NotificationSink;
use crate::price_source::PriceSource;
use crate::repositories::{SettlementApplied, TradeStore};

/// Exit-price lookups an owner-requested settlement makes before answering
/// `PriceUnavailable`. The expiry timer keeps retrying regardless.
pub const OWNER_SETTLE_ATTEMPTS: usize = 3;

/// Backoff between attempts when the exit price or the store is unavailable.
///
/// Delays double from `base_delay` and are capped at `max_delay`. Attempts never stop:
/// a trade is only ever settled with a real price.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn strategy(&self) -> ExponentialBackoff {
        // from_millis(2) yields 2, 4, 8... so factor = base / 2 gives base, 2 * base, ...
        let factor = (self.base_delay.as_millis() as u64 / 2).max(1);
        ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(self.max_delay)
    }
}

pub struct SettlementEngine {
    store: Arc<dyn TradeStore>,
    prices: Arc<dyn PriceSource>,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    scheduled: Mutex<HashSet<Uuid>>,
}

impl SettlementEngine {
    pub fn new(
        store: Arc<dyn TradeStore>,
        prices: Arc<dyn PriceSource>,
        notifier: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            prices,
            notifier,
            clock,
            retry,
            scheduled: Mutex::new(HashSet::new()),
        }
    }

    /// Arms the expiry timer for `trade`. Returns false if the trade is already settled
    /// or a timer is already pending for it.
    pub fn schedule(self: &Arc<Self>, trade: &Trade) -> bool {
        if trade.is_settled() {
            return false;
        }
        if !self.scheduled_ids().insert(trade.id) {
            return false;
        }

        let trade_id = trade.id;
        let due = trade.settlement_time;
        debug!(%trade_id, %due, "Settlement timer armed");

        let guard = TimerGuard {
            engine: Arc::clone(self),
            trade_id,
        };
        tokio::spawn(async move {
            guard.engine.run_timer(trade_id, due).await;
            drop(guard);
        });
        true
    }

    /// Number of trades with a pending timer.
    pub fn pending(&self) -> usize {
        self.scheduled_ids().len()
    }

    fn scheduled_ids(&self) -> MutexGuard<'_, HashSet<Uuid>> {
        self.scheduled.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn run_timer(&self, trade_id: Uuid, due: chrono::DateTime<chrono::Utc>) {
        let mut backoff = self.retry.strategy();
        loop {
            let wait = clock::until(due, self.clock.now());
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }

            match self.settle(trade_id).await {
                Ok(_) => return,
                Err(TradeError::NotYetDue { .. }) => continue,
                Err(e) if e.is_transient() => {
                    let delay = backoff.next().unwrap_or(self.retry.max_delay);
                    warn!(%trade_id, error = %e, delay_ms = delay.as_millis() as u64, "Settlement attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(%trade_id, error = %e, "Settlement abandoned");
                    return;
                }
            }
        }
    }

    /// Settles `trade_id` if it is due.
    ///
    /// Already-settled trades are left untouched and reported as `AlreadySettled`, so the
    /// call is safe to repeat. A trade that is not yet due fails with `NotYetDue`. The
    /// exit price is fetched with unbounded backoff.
    pub async fn settle(&self, trade_id: Uuid) -> Result<SettlementApplied, TradeError> {
        self.settle_with(trade_id, None).await
    }

    /// `settle` with at most `attempts` exit-price lookups, for callers that cannot wait
    /// out an outage. Running out of attempts fails with `PriceUnavailable` and leaves the
    /// trade active.
    pub async fn settle_bounded(&self, trade_id: Uuid, attempts: usize) -> Result<SettlementApplied, TradeError> {
        self.settle_with(trade_id, Some(attempts.max(1))).await
    }

    async fn settle_with(&self, trade_id: Uuid, attempts: Option<usize>) -> Result<SettlementApplied, TradeError> {
        let trade = self
            .store
            .find_trade(trade_id)
            .await?
            .ok_or(TradeError::TradeNotFound(trade_id))?;

        if trade.is_settled() {
            info!(%trade_id, error = %TradeError::DoubleSettlement(trade_id), "Ignoring duplicate settlement");
            return Ok(SettlementApplied::AlreadySettled(trade));
        }
        if !trade.is_due(self.clock.now()) {
            return Err(TradeError::NotYetDue {
                trade_id,
                due: trade.settlement_time,
            });
        }

        let exit_price = self.exit_price(&trade, attempts).await?;
        let settlement = compute_settlement(&trade, exit_price, self.clock.now());
        let applied = self.store.apply_settlement(trade_id, settlement).await?;

        match &applied {
            SettlementApplied::Applied(settled) => {
                if let Some(s) = &settled.settlement {
                    info!(
                        %trade_id,
                        user_id = settled.user_id,
                        symbol = %settled.symbol,
                        direction = %settled.direction,
                        entry = %settled.entry_price,
                        exit = %s.exit_price,
                        outcome = s.outcome.as_str(),
                        net_profit = %s.net_profit,
                        "Trade settled"
                    );
                }
                self.notify_settled(settled).await;
            }
            SettlementApplied::AlreadySettled(_) => {
                info!(%trade_id, error = %TradeError::DoubleSettlement(trade_id), "Lost settlement race");
            }
        }
        Ok(applied)
    }

    async fn exit_price(&self, trade: &Trade, attempts: Option<usize>) -> Result<Decimal, TradeError> {
        let trade_id = trade.id;
        let symbol = trade.symbol.as_str();
        let lookup = || async move {
            self.prices.current_price(symbol).await.map_err(|e| {
                warn!(%trade_id, symbol, error = %e, "Exit price unavailable");
                e
            })
        };

        let Some(attempts) = attempts else {
            return Retry::spawn(self.retry.strategy(), lookup).await;
        };
        Retry::spawn(self.retry.strategy().take(attempts - 1), lookup)
            .await
            .map_err(|e| match e {
                TradeError::UnknownInstrument(_) => TradeError::PriceUnavailable {
                    symbol: symbol.to_string(),
                    reason: format!("feed no longer quotes {symbol}"),
                },
                other => other,
            })
    }

    async fn notify_settled(&self, trade: &Trade) {
        let Some(settlement) = &trade.settlement else {
            return;
        };
        let event = TradeEvent::Settled {
            trade_id: trade.id,
            outcome: settlement.outcome,
            net_profit: settlement.net_profit,
            payout: settlement.payout,
        };
        if let Err(e) = self.notifier.emit(trade.user_id, event).await {
            error!(trade_id = %trade.id, user_id = trade.user_id, error = %e, "Failed to deliver settlement notification");
        }
    }

    /// Arms timers for every active trade that has none. Returns how many were armed.
    pub async fn recover(self: &Arc<Self>) -> Result<usize, TradeError> {
        let active = self.store.all_active_trades().await?;
        let mut armed = 0;
        for trade in &active {
            if self.schedule(trade) {
                armed += 1;
            }
        }
        if armed > 0 {
            info!(armed, active = active.len(), "Recovered settlement timers");
        }
        Ok(armed)
    }

    /// Runs `recover` every `every` until the task is dropped.
    pub async fn run_recovery_loop(self: Arc<Self>, every: Duration) {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            if let Err(e) = self.recover().await {
                error!(error = %e, "Recovery sweep failed");
            }
        }
    }
}

/// Releases a trade's timer slot when its task ends, panics included, so the recovery
/// sweep can arm it again.
struct TimerGuard {
    engine: Arc<SettlementEngine>,
    trade_id: Uuid,
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.engine.scheduled_ids().remove(&self.trade_id);
    }
}
