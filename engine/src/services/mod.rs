pub mod pnl;
pub mod settlement;
pub mod trading_service;

pub use pnl::{summarize, PnlSummary};
pub use settlement::{RetryPolicy, SettlementEngine};
pub use trading_service::{ActiveTradeView, PlaceTrade, TradingService, MAX_PAGE};
