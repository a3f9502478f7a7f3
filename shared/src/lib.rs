pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod models;
pub mod payout;
pub mod price_feed;
pub mod redis;

pub use config::Config;
pub use database::get_db_connection;
pub use error::TradeError;
pub use models::*;
pub use payout::{compute_settlement, resolve_outcome, MenuEntry, PayoutSchedule, PayoutTerms};
pub use price_feed::{CoinQuote, PriceFeedClient};
pub use redis::{get_redis_client, publish_json, Redis};
