use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    prelude::*, ActiveValue::Set, ConnectionTrait, DatabaseTransaction, PaginatorTrait, QueryOrder,
    QuerySelect, TransactionTrait,
};
use shared::entity::{binary_trades, transactions, users};
use shared::{Settlement, Trade, TradeError, TradeStatus, Transaction, TransactionKind};
use std::sync::Arc;
use tracing::debug;

use super::{NewTrade, SettlementApplied, TradeStore};

/// MySQL-backed store.
///
/// Balance mutations run inside a database transaction that locks the user row first
/// (`SELECT ... FOR UPDATE`) and the trade row second, so concurrent settlements and
/// opens for the same user serialize on the account.
pub struct TradeRepository {
    db: Arc<DatabaseConnection>,
}

impl TradeRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn lock_user(txn: &DatabaseTransaction, user_id: i64) -> Result<users::Model, TradeError> {
        users::Entity::find_by_id(user_id)
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or(TradeError::AccountNotFound(user_id))
    }

    async fn set_balance(
        txn: &DatabaseTransaction,
        user: users::Model,
        balance: Decimal,
        at: DateTime<Utc>,
    ) -> Result<(), TradeError> {
        let mut active: users::ActiveModel = user.into();
        active.balance = Set(balance);
        active.updated_at = Set(Some(at));
        active.update(txn).await?;
        Ok(())
    }

    async fn record<C: ConnectionTrait>(conn: &C, tx: &Transaction) -> Result<(), TradeError> {
        let active = transactions::ActiveModel::try_from(tx)?;
        transactions::Entity::insert(active).exec(conn).await?;
        Ok(())
    }

    fn into_trades(models: Vec<binary_trades::Model>) -> Result<Vec<Trade>, TradeError> {
        let trades = models
            .into_iter()
            .map(Trade::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(trades)
    }
}

#[async_trait]
impl TradeStore for TradeRepository {
    async fn create_account(&self, user_id: i64, username: Option<String>) -> Result<(), TradeError> {
        let now = Utc::now();
        let user = users::ActiveModel {
            id: Set(user_id),
            username: Set(username),
            balance: Set(Decimal::ZERO),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
        };
        users::Entity::insert(user)
            .on_conflict(OnConflict::column(users::Column::Id).do_nothing().to_owned())
            .exec_without_returning(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn balance(&self, user_id: i64) -> Result<Decimal, TradeError> {
        let user = users::Entity::find_by_id(user_id)
            .one(self.db.as_ref())
            .await?
            .ok_or(TradeError::AccountNotFound(user_id))?;
        Ok(user.balance)
    }

    async fn deposit(
        &self,
        user_id: i64,
        amount: Decimal,
        asset: &str,
        at: DateTime<Utc>,
    ) -> Result<Transaction, TradeError> {
        let txn = self.db.begin().await?;
        let user = Self::lock_user(&txn, user_id).await?;
        let balance = user.balance + amount;
        Self::set_balance(&txn, user, balance, at).await?;

        let tx = Transaction::new(
            user_id,
            TransactionKind::Deposit {
                amount,
                asset: asset.to_string(),
            },
            at,
        );
        Self::record(&txn, &tx).await?;
        txn.commit().await?;
        Ok(tx)
    }

    async fn withdraw(
        &self,
        user_id: i64,
        amount: Decimal,
        asset: &str,
        address: &str,
        at: DateTime<Utc>,
    ) -> Result<Transaction, TradeError> {
        let txn = self.db.begin().await?;
        let user = Self::lock_user(&txn, user_id).await?;
        if user.balance < amount {
            return Err(TradeError::InsufficientBalance {
                available: user.balance,
                requested: amount,
            });
        }
        let balance = user.balance - amount;
        Self::set_balance(&txn, user, balance, at).await?;

        let tx = Transaction::new(
            user_id,
            TransactionKind::Withdrawal {
                amount,
                asset: asset.to_string(),
                address: address.to_string(),
            },
            at,
        );
        Self::record(&txn, &tx).await?;
        txn.commit().await?;
        Ok(tx)
    }

    async fn open_trade(&self, trade: NewTrade, single_active: bool) -> Result<Trade, TradeError> {
        let txn = self.db.begin().await?;
        let user = Self::lock_user(&txn, trade.user_id).await?;

        if single_active {
            let open = binary_trades::Entity::find()
                .filter(binary_trades::Column::UserId.eq(trade.user_id))
                .filter(binary_trades::Column::Status.eq(TradeStatus::Active.as_str()))
                .count(&txn)
                .await?;
            if open > 0 {
                return Err(TradeError::ActiveTradeExists(trade.user_id));
            }
        }

        if user.balance < trade.stake {
            return Err(TradeError::InsufficientBalance {
                available: user.balance,
                requested: trade.stake,
            });
        }
        let balance = user.balance - trade.stake;
        Self::set_balance(&txn, user, balance, trade.start_time).await?;

        let row = binary_trades::ActiveModel {
            id: Set(trade.id),
            user_id: Set(trade.user_id),
            symbol: Set(trade.symbol.clone()),
            direction: Set(trade.direction.as_str().to_string()),
            stake: Set(trade.stake),
            duration: Set(trade.duration_secs as i32),
            entry_price: Set(trade.entry_price),
            profit_rate: Set(trade.terms.profit_rate),
            commission_rate: Set(trade.terms.commission_rate),
            start_time: Set(trade.start_time),
            settlement_time: Set(trade.settlement_time),
            status: Set(TradeStatus::Active.as_str().to_string()),
            outcome: Set(None),
            final_price: Set(None),
            commission: Set(None),
            payout: Set(None),
            net_profit: Set(None),
            settled_at: Set(None),
            result_seen: Set(false),
            created_at: Set(Some(trade.start_time)),
        };
        binary_trades::Entity::insert(row).exec(&txn).await?;
        Self::record(&txn, &trade.stake_transaction()).await?;

        txn.commit().await?;
        debug!(trade_id = %trade.id, user_id = trade.user_id, stake = %trade.stake, "Trade row committed");
        Ok(trade.into_trade())
    }

    async fn apply_settlement(
        &self,
        trade_id: Uuid,
        settlement: Settlement,
    ) -> Result<SettlementApplied, TradeError> {
        let txn = self.db.begin().await?;

        let owner = binary_trades::Entity::find_by_id(trade_id)
            .one(&txn)
            .await?
            .ok_or(TradeError::TradeNotFound(trade_id))?
            .user_id;
        let user = Self::lock_user(&txn, owner).await?;
        let row = binary_trades::Entity::find_by_id(trade_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(TradeError::TradeNotFound(trade_id))?;

        if row.status != TradeStatus::Active.as_str() {
            let trade = Trade::try_from(row)?;
            return Ok(SettlementApplied::AlreadySettled(trade));
        }

        let mut trade = Trade::try_from(row.clone())?;
        let mut active: binary_trades::ActiveModel = row.into();
        active.status = Set(TradeStatus::Settled.as_str().to_string());
        active.outcome = Set(Some(settlement.outcome.as_str().to_string()));
        active.final_price = Set(Some(settlement.exit_price));
        active.commission = Set(Some(settlement.commission));
        active.payout = Set(Some(settlement.payout));
        active.net_profit = Set(Some(settlement.net_profit));
        active.settled_at = Set(Some(settlement.settled_at));
        active.update(&txn).await?;

        let credit = settlement.credited(trade.stake);
        if credit > Decimal::ZERO {
            let balance = user.balance + credit;
            Self::set_balance(&txn, user, balance, settlement.settled_at).await?;
        }

        let contract = Transaction::new(
            trade.user_id,
            TransactionKind::contract(&trade, &settlement),
            settlement.settled_at,
        );
        Self::record(&txn, &contract).await?;
        txn.commit().await?;

        trade.settlement = Some(settlement);
        Ok(SettlementApplied::Applied(trade))
    }

    async fn find_trade(&self, trade_id: Uuid) -> Result<Option<Trade>, TradeError> {
        let row = binary_trades::Entity::find_by_id(trade_id)
            .one(self.db.as_ref())
            .await?;
        Ok(row.map(Trade::try_from).transpose()?)
    }

    async fn active_trades(&self, user_id: i64) -> Result<Vec<Trade>, TradeError> {
        let rows = binary_trades::Entity::find()
            .filter(binary_trades::Column::UserId.eq(user_id))
            .filter(binary_trades::Column::Status.eq(TradeStatus::Active.as_str()))
            .order_by_desc(binary_trades::Column::StartTime)
            .all(self.db.as_ref())
            .await?;
        Self::into_trades(rows)
    }

    async fn all_active_trades(&self) -> Result<Vec<Trade>, TradeError> {
        let rows = binary_trades::Entity::find()
            .filter(binary_trades::Column::Status.eq(TradeStatus::Active.as_str()))
            .order_by_asc(binary_trades::Column::SettlementTime)
            .all(self.db.as_ref())
            .await?;
        Self::into_trades(rows)
    }

    async fn trade_history(&self, user_id: i64, limit: u64) -> Result<Vec<Trade>, TradeError> {
        let rows = binary_trades::Entity::find()
            .filter(binary_trades::Column::UserId.eq(user_id))
            .order_by_desc(binary_trades::Column::StartTime)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;
        Self::into_trades(rows)
    }

    async fn unseen_results(&self, user_id: i64) -> Result<Vec<Trade>, TradeError> {
        let rows = binary_trades::Entity::find()
            .filter(binary_trades::Column::UserId.eq(user_id))
            .filter(binary_trades::Column::Status.eq(TradeStatus::Settled.as_str()))
            .filter(binary_trades::Column::ResultSeen.eq(false))
            .order_by_desc(binary_trades::Column::SettledAt)
            .all(self.db.as_ref())
            .await?;
        Self::into_trades(rows)
    }

    async fn mark_result_seen(&self, trade_id: Uuid) -> Result<bool, TradeError> {
        let result = binary_trades::Entity::update_many()
            .col_expr(binary_trades::Column::ResultSeen, Expr::value(true))
            .filter(binary_trades::Column::Id.eq(trade_id))
            .filter(binary_trades::Column::Status.eq(TradeStatus::Settled.as_str()))
            .filter(binary_trades::Column::ResultSeen.eq(false))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn transactions(&self, user_id: i64, limit: u64) -> Result<Vec<Transaction>, TradeError> {
        let rows = transactions::Entity::find()
            .filter(transactions::Column::UserId.eq(user_id))
            .order_by_desc(transactions::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;
        let ledger = rows
            .into_iter()
            .map(Transaction::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ledger)
    }
}
