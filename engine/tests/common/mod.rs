#![allow(dead_code)]

use engine::{
    BroadcastNotifier, EngineParts, EngineState, InMemoryTradeStore, PlaceTrade, RetryPolicy,
    StaticPriceSource, TokioClock, TradeStore,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use shared::{Direction, PayoutSchedule, TradeEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

pub struct Harness {
    pub state: EngineState,
    pub store: Arc<InMemoryTradeStore>,
    pub prices: Arc<StaticPriceSource>,
    pub notifier: Arc<BroadcastNotifier>,
    pub events: broadcast::Receiver<(i64, TradeEvent)>,
}

pub fn harness() -> Harness {
    harness_with(true)
}

pub fn harness_with(single_active_trade: bool) -> Harness {
    let store = Arc::new(InMemoryTradeStore::new());
    let prices = Arc::new(StaticPriceSource::with_prices([
        ("BTC", dec!(50000)),
        ("ETH", dec!(2500)),
        ("SOL", dec!(300)),
    ]));
    let notifier = Arc::new(BroadcastNotifier::new(64));
    let events = notifier.subscribe();

    let state = EngineState::from_parts(EngineParts {
        store: store.clone(),
        prices: prices.clone(),
        notifier: notifier.clone(),
        clock: Arc::new(TokioClock::new()),
        schedule: PayoutSchedule::default(),
        retry: RetryPolicy {
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
        },
        single_active_trade,
    });

    Harness {
        state,
        store,
        prices,
        notifier,
        events,
    }
}

impl Harness {
    pub async fn funded(&self, user_id: i64, amount: Decimal) {
        self.state.trading.deposit(user_id, amount).await.unwrap();
    }

    pub async fn balance(&self, user_id: i64) -> Decimal {
        self.store.balance(user_id).await.unwrap()
    }

    /// Drains every event published so far.
    pub fn drain_events(&mut self) -> Vec<(i64, TradeEvent)> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

pub fn order(pair: &str, direction: Direction, stake: Decimal, duration_secs: u32) -> PlaceTrade {
    PlaceTrade {
        pair: pair.to_string(),
        direction,
        stake,
        duration_secs,
    }
}

/// Lets the paused runtime advance past `secs` seconds, running every timer due on the way.
pub async fn advance(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}
