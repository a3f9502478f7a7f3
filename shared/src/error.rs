use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TradeError {
    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance { available: Decimal, requested: Decimal },

    #[error("stake must be positive with at most 8 decimal places, got {0}")]
    InvalidStake(Decimal),

    #[error("amount must be positive with at most 8 decimal places, got {0}")]
    InvalidAmount(Decimal),

    #[error("settlement duration {0}s is not offered")]
    InvalidDuration(u32),

    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("price unavailable for {symbol}: {reason}")]
    PriceUnavailable { symbol: String, reason: String },

    #[error("trade {0} is already settled")]
    DoubleSettlement(Uuid),

    #[error("trade {trade_id} is not due before {due}")]
    NotYetDue { trade_id: Uuid, due: DateTime<Utc> },

    #[error("user {user_id} does not own trade {trade_id}")]
    Unauthorized { user_id: i64, trade_id: Uuid },

    #[error("trade {0} not found")]
    TradeNotFound(Uuid),

    #[error("account {0} not found")]
    AccountNotFound(i64),

    #[error("user {0} already has an active trade")]
    ActiveTradeExists(i64),

    #[error(transparent)]
    Database(#[from] sea_orm::DbErr),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TradeError {
    /// Errors worth retrying: the operation may succeed later without any input change.
    pub fn is_transient(&self) -> bool {
        matches!(self, TradeError::PriceUnavailable { .. } | TradeError::Database(_))
    }

    /// Stable machine-readable name, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            TradeError::InsufficientBalance { .. } => "InsufficientBalance",
            TradeError::InvalidStake(_) => "InvalidStake",
            TradeError::InvalidAmount(_) => "InvalidAmount",
            TradeError::InvalidDuration(_) => "InvalidDuration",
            TradeError::UnknownInstrument(_) => "UnknownInstrument",
            TradeError::PriceUnavailable { .. } => "PriceUnavailable",
            TradeError::DoubleSettlement(_) => "DoubleSettlement",
            TradeError::NotYetDue { .. } => "NotYetDue",
            TradeError::Unauthorized { .. } => "Unauthorized",
            TradeError::TradeNotFound(_) => "TradeNotFound",
            TradeError::AccountNotFound(_) => "AccountNotFound",
            TradeError::ActiveTradeExists(_) => "ActiveTradeExists",
            TradeError::Database(_) => "Database",
            TradeError::Other(_) => "Internal",
        }
    }
}
