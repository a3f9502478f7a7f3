pub mod clock;
pub mod notifier;
pub mod price_source;
pub mod repositories;
pub mod services;
pub mod state;
pub mod telemetry;

pub use clock::{Clock, SystemClock, TokioClock};
pub use notifier::{BroadcastNotifier, NotificationSink, RedisNotifier};
pub use price_source::{HttpPriceSource, PriceSource, StaticPriceSource};
pub use repositories::{InMemoryTradeStore, NewTrade, SettlementApplied, TradeRepository, TradeStore};
pub use services::{
    ActiveTradeView, PlaceTrade, PnlSummary, RetryPolicy, SettlementEngine, TradingService,
};
pub use state::{EngineParts, EngineState};
