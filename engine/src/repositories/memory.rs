use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{Settlement, Trade, TradeError, Transaction, TransactionKind};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::{NewTrade, SettlementApplied, TradeStore};

#[derive(Debug, Default)]
struct AccountBook {
    username: Option<String>,
    balance: Decimal,
    trades: Vec<Trade>,
    transactions: Vec<Transaction>,
}

/// Process-local store. Each account is guarded by its own mutex so mutations for
/// one user are serialized without blocking others.
#[derive(Default)]
pub struct InMemoryTradeStore {
    books: RwLock<HashMap<i64, Arc<Mutex<AccountBook>>>>,
    owners: RwLock<HashMap<Uuid, i64>>,
}

impl InMemoryTradeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn username(&self, user_id: i64) -> Option<String> {
        let book = self.book(user_id).await.ok()?;
        let book = book.lock().await;
        book.username.clone()
    }

    async fn book(&self, user_id: i64) -> Result<Arc<Mutex<AccountBook>>, TradeError> {
        self.books
            .read()
            .await
            .get(&user_id)
            .cloned()
            .ok_or(TradeError::AccountNotFound(user_id))
    }

    async fn owner_book(&self, trade_id: Uuid) -> Result<Arc<Mutex<AccountBook>>, TradeError> {
        let owner = self
            .owners
            .read()
            .await
            .get(&trade_id)
            .copied()
            .ok_or(TradeError::TradeNotFound(trade_id))?;
        self.book(owner).await
    }
}

fn newest_first(trades: &mut [Trade]) {
    trades.sort_by(|a, b| b.start_time.cmp(&a.start_time));
}

#[async_trait]
impl TradeStore for InMemoryTradeStore {
    async fn create_account(&self, user_id: i64, username: Option<String>) -> Result<(), TradeError> {
        let mut books = self.books.write().await;
        books.entry(user_id).or_insert_with(|| {
            Arc::new(Mutex::new(AccountBook {
                username,
                ..Default::default()
            }))
        });
        Ok(())
    }

    async fn balance(&self, user_id: i64) -> Result<Decimal, TradeError> {
        let book = self.book(user_id).await?;
        let balance = book.lock().await.balance;
        Ok(balance)
    }

    async fn deposit(
        &self,
        user_id: i64,
        amount: Decimal,
        asset: &str,
        at: DateTime<Utc>,
    ) -> Result<Transaction, TradeError> {
        let book = self.book(user_id).await?;
        let mut book = book.lock().await;
        let tx = Transaction::new(
            user_id,
            TransactionKind::Deposit {
                amount,
                asset: asset.to_string(),
            },
            at,
        );
        book.balance += amount;
        book.transactions.push(tx.clone());
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
        let book = self.book(user_id).await?;
        let mut book = book.lock().await;
        if book.balance < amount {
            return Err(TradeError::InsufficientBalance {
                available: book.balance,
                requested: amount,
            });
        }
        let tx = Transaction::new(
            user_id,
            TransactionKind::Withdrawal {
                amount,
                asset: asset.to_string(),
                address: address.to_string(),
            },
            at,
        );
        book.balance -= amount;
        book.transactions.push(tx.clone());
        Ok(tx)
    }

    async fn open_trade(&self, trade: NewTrade, single_active: bool) -> Result<Trade, TradeError> {
        let book = self.book(trade.user_id).await?;
        let mut book = book.lock().await;

        if single_active && book.trades.iter().any(|t| !t.is_settled()) {
            return Err(TradeError::ActiveTradeExists(trade.user_id));
        }
        if book.balance < trade.stake {
            return Err(TradeError::InsufficientBalance {
                available: book.balance,
                requested: trade.stake,
            });
        }

        let stake_tx = trade.stake_transaction();
        let trade = trade.into_trade();
        book.balance -= trade.stake;
        book.trades.push(trade.clone());
        book.transactions.push(stake_tx);
        // Indexed before the account lock is released so a settlement can always find it.
        self.owners.write().await.insert(trade.id, trade.user_id);
        Ok(trade)
    }

    async fn apply_settlement(
        &self,
        trade_id: Uuid,
        settlement: Settlement,
    ) -> Result<SettlementApplied, TradeError> {
        let book = self.owner_book(trade_id).await?;
        let mut book = book.lock().await;
        let book = &mut *book;

        let trade = book
            .trades
            .iter_mut()
            .find(|t| t.id == trade_id)
            .ok_or(TradeError::TradeNotFound(trade_id))?;
        if trade.is_settled() {
            return Ok(SettlementApplied::AlreadySettled(trade.clone()));
        }

        let contract = Transaction::new(
            trade.user_id,
            TransactionKind::contract(trade, &settlement),
            settlement.settled_at,
        );
        book.balance += settlement.credited(trade.stake);
        trade.settlement = Some(settlement);
        let settled = trade.clone();
        book.transactions.push(contract);
        Ok(SettlementApplied::Applied(settled))
    }

    async fn find_trade(&self, trade_id: Uuid) -> Result<Option<Trade>, TradeError> {
        let book = match self.owner_book(trade_id).await {
            Ok(book) => book,
            Err(TradeError::TradeNotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let book = book.lock().await;
        Ok(book.trades.iter().find(|t| t.id == trade_id).cloned())
    }

    async fn active_trades(&self, user_id: i64) -> Result<Vec<Trade>, TradeError> {
        let book = self.book(user_id).await?;
        let book = book.lock().await;
        let mut trades: Vec<Trade> = book.trades.iter().filter(|t| !t.is_settled()).cloned().collect();
        newest_first(&mut trades);
        Ok(trades)
    }

    async fn all_active_trades(&self) -> Result<Vec<Trade>, TradeError> {
        let books: Vec<_> = self.books.read().await.values().cloned().collect();
        let mut trades = Vec::new();
        for book in books {
            let book = book.lock().await;
            trades.extend(book.trades.iter().filter(|t| !t.is_settled()).cloned());
        }
        trades.sort_by(|a, b| a.settlement_time.cmp(&b.settlement_time));
        Ok(trades)
    }

    async fn trade_history(&self, user_id: i64, limit: u64) -> Result<Vec<Trade>, TradeError> {
        let book = self.book(user_id).await?;
        let book = book.lock().await;
        let mut trades = book.trades.clone();
        newest_first(&mut trades);
        trades.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(trades)
    }

    async fn unseen_results(&self, user_id: i64) -> Result<Vec<Trade>, TradeError> {
        let book = self.book(user_id).await?;
        let book = book.lock().await;
        let mut trades: Vec<Trade> = book
            .trades
            .iter()
            .filter(|t| t.is_settled() && !t.result_seen)
            .cloned()
            .collect();
        trades.sort_by_key(|t| std::cmp::Reverse(t.settlement.as_ref().map(|s| s.settled_at)));
        Ok(trades)
    }

    async fn mark_result_seen(&self, trade_id: Uuid) -> Result<bool, TradeError> {
        let book = self.owner_book(trade_id).await?;
        let mut book = book.lock().await;
        match book.trades.iter_mut().find(|t| t.id == trade_id) {
            Some(trade) if trade.is_settled() && !trade.result_seen => {
                trade.result_seen = true;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(TradeError::TradeNotFound(trade_id)),
        }
    }

    async fn transactions(&self, user_id: i64, limit: u64) -> Result<Vec<Transaction>, TradeError> {
        let book = self.book(user_id).await?;
        let book = book.lock().await;
        Ok(book
            .transactions
            .iter()
            .rev()
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }
}
