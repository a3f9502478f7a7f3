//! Persistence for accounts, trades and the transaction ledger.
//!
//! Every balance-affecting operation is a single atomic unit in each implementation:
//! the escrow debit commits together with the trade row, and a settlement credit
//! commits together with the status flip.

pub mod memory;
pub mod trade_repository;

pub use memory::InMemoryTradeStore;
pub use trade_repository::TradeRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{Direction, PayoutTerms, Settlement, Trade, TradeError, Transaction, TransactionKind};
use uuid::Uuid;

/// A validated trade ready to be opened.
#[derive(Debug, Clone)]
pub struct NewTrade {
    pub id: Uuid,
    pub user_id: i64,
    pub symbol: String,
    pub direction: Direction,
    pub stake: Decimal,
    pub duration_secs: u32,
    pub entry_price: Decimal,
    pub terms: PayoutTerms,
    pub start_time: DateTime<Utc>,
    pub settlement_time: DateTime<Utc>,
}

impl NewTrade {
    pub fn into_trade(self) -> Trade {
        Trade {
            id: self.id,
            user_id: self.user_id,
            symbol: self.symbol,
            direction: self.direction,
            stake: self.stake,
            duration_secs: self.duration_secs,
            entry_price: self.entry_price,
            profit_rate: self.terms.profit_rate,
            commission_rate: self.terms.commission_rate,
            start_time: self.start_time,
            settlement_time: self.settlement_time,
            settlement: None,
            result_seen: false,
        }
    }

    /// Ledger entry for the escrow debit.
    pub fn stake_transaction(&self) -> Transaction {
        Transaction::new(
            self.user_id,
            TransactionKind::Stake {
                trade_id: self.id,
                symbol: self.symbol.clone(),
                direction: self.direction,
                amount: self.stake,
            },
            self.start_time,
        )
    }
}

/// Result of a conditional settlement write.
#[derive(Debug, Clone, PartialEq)]
pub enum SettlementApplied {
    /// This call flipped the trade to settled and credited the payout.
    Applied(Trade),
    /// The trade was already settled; nothing was written.
    AlreadySettled(Trade),
}

impl SettlementApplied {
    pub fn trade(&self) -> &Trade {
        match self {
            SettlementApplied::Applied(trade) | SettlementApplied::AlreadySettled(trade) => trade,
        }
    }

    pub fn into_trade(self) -> Trade {
        match self {
            SettlementApplied::Applied(trade) | SettlementApplied::AlreadySettled(trade) => trade,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, SettlementApplied::Applied(_))
    }
}

#[async_trait]
pub trait TradeStore: Send + Sync {
    /// Creates a zero-balance account. No-op if the account exists.
    async fn create_account(&self, user_id: i64, username: Option<String>) -> Result<(), TradeError>;

    async fn balance(&self, user_id: i64) -> Result<Decimal, TradeError>;

    async fn deposit(
        &self,
        user_id: i64,
        amount: Decimal,
        asset: &str,
        at: DateTime<Utc>,
    ) -> Result<Transaction, TradeError>;

    async fn withdraw(
        &self,
        user_id: i64,
        amount: Decimal,
        asset: &str,
        address: &str,
        at: DateTime<Utc>,
    ) -> Result<Transaction, TradeError>;

    /// Debits the stake and records the trade atomically.
    ///
    /// With `single_active` set the open is refused while the user still holds an
    /// unsettled trade.
    async fn open_trade(&self, trade: NewTrade, single_active: bool) -> Result<Trade, TradeError>;

    /// Marks the trade settled and credits the payout, only if it is still active.
    async fn apply_settlement(
        &self,
        trade_id: Uuid,
        settlement: Settlement,
    ) -> Result<SettlementApplied, TradeError>;

    async fn find_trade(&self, trade_id: Uuid) -> Result<Option<Trade>, TradeError>;

    /// All of the user's unsettled trades, expired or not, newest first.
    async fn active_trades(&self, user_id: i64) -> Result<Vec<Trade>, TradeError>;

    /// Every unsettled trade in the system, earliest expiry first.
    async fn all_active_trades(&self) -> Result<Vec<Trade>, TradeError>;

    /// The user's trades in any state, most recent first.
    async fn trade_history(&self, user_id: i64, limit: u64) -> Result<Vec<Trade>, TradeError>;

    /// Settled trades whose result the user has not acknowledged, latest settlement first.
    async fn unseen_results(&self, user_id: i64) -> Result<Vec<Trade>, TradeError>;

    /// Sets the seen flag on a settled trade. Returns false if nothing changed.
    async fn mark_result_seen(&self, trade_id: Uuid) -> Result<bool, TradeError>;

    /// Ledger entries, newest first.
    async fn transactions(&self, user_id: i64, limit: u64) -> Result<Vec<Transaction>, TradeError>;
}
