use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Quote currency every balance and stake is denominated in.
pub const QUOTE_ASSET: &str = "USDT";

/// Decimal places money and prices are stored with.
pub const MONEY_SCALE: u32 = 8;

/// A positive amount that the ledger can store without rounding.
pub fn is_valid_amount(amount: Decimal) -> bool {
    amount > Decimal::ZERO && amount.normalize().scale() <= MONEY_SCALE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Wager that the price rises.
    Buy,
    /// Wager that the price falls.
    Sell,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "buy",
            Direction::Sell => "sell",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" | "long" | "up" => Ok(Direction::Buy),
            "sell" | "short" | "down" => Ok(Direction::Sell),
            other => Err(anyhow::anyhow!("unknown trade direction: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Active,
    Settled,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Active => "active",
            TradeStatus::Settled => "settled",
        }
    }
}

impl FromStr for TradeStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(TradeStatus::Active),
            "settled" => Ok(TradeStatus::Settled),
            other => Err(anyhow::anyhow!("unknown trade status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeOutcome {
    Win,
    Lose,
}

impl TradeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeOutcome::Win => "win",
            TradeOutcome::Lose => "lose",
        }
    }
}

impl FromStr for TradeOutcome {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "win" => Ok(TradeOutcome::Win),
            "lose" => Ok(TradeOutcome::Lose),
            other => Err(anyhow::anyhow!("unknown trade outcome: {}", other)),
        }
    }
}

/// Result of settling a trade. Present only once the trade left the active state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub outcome: TradeOutcome,
    pub exit_price: Decimal,
    pub commission: Decimal,
    /// Quoted payout: stake + gross profit on a win, zero on a loss. Commission is
    /// withheld from it, see [`Settlement::credited`].
    pub payout: Decimal,
    pub net_profit: Decimal,
    /// Actual settlement instant; may trail the scheduled `Trade::settlement_time`.
    pub settled_at: DateTime<Utc>,
}

impl Settlement {
    /// Amount credited back to the balance: escrowed stake plus net profit. Over the
    /// life of a trade the owner's balance therefore moves by exactly `net_profit`.
    pub fn credited(&self, stake: Decimal) -> Decimal {
        (stake + self.net_profit).max(Decimal::ZERO)
    }
}

/// A fixed-stake, fixed-duration binary wager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub user_id: i64,
    pub symbol: String,
    pub direction: Direction,
    pub stake: Decimal,
    pub duration_secs: u32,
    pub entry_price: Decimal,
    pub profit_rate: Decimal,
    pub commission_rate: Decimal,
    pub start_time: DateTime<Utc>,
    pub settlement_time: DateTime<Utc>,
    pub settlement: Option<Settlement>,
    pub result_seen: bool,
}

impl Trade {
    pub fn status(&self) -> TradeStatus {
        if self.settlement.is_some() {
            TradeStatus::Settled
        } else {
            TradeStatus::Active
        }
    }

    pub fn is_settled(&self) -> bool {
        self.settlement.is_some()
    }

    pub fn outcome(&self) -> Option<TradeOutcome> {
        self.settlement.as_ref().map(|s| s.outcome)
    }

    pub fn pair(&self) -> String {
        format!("{}-{}", self.symbol, QUOTE_ASSET)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.settlement_time
    }

    /// Whole seconds until expiry, floored at zero.
    pub fn time_left_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.settlement_time - now).num_seconds().max(0)
    }

    /// Net profit as a percentage of stake; zero while active.
    pub fn profit_percentage(&self) -> Decimal {
        match &self.settlement {
            Some(s) if !self.stake.is_zero() => s.net_profit / self.stake * Decimal::ONE_HUNDRED,
            _ => Decimal::ZERO,
        }
    }
}

/// Events pushed to the owning client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TradeEvent {
    Placed {
        trade_id: Uuid,
        symbol: String,
        direction: Direction,
        stake: Decimal,
        settlement_time: DateTime<Utc>,
    },
    Settled {
        trade_id: Uuid,
        outcome: TradeOutcome,
        net_profit: Decimal,
        payout: Decimal,
    },
}

impl TradeEvent {
    pub fn trade_id(&self) -> Uuid {
        match self {
            TradeEvent::Placed { trade_id, .. } | TradeEvent::Settled { trade_id, .. } => *trade_id,
        }
    }
}

/// One balance-affecting entry in a user's ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit {
        amount: Decimal,
        asset: String,
    },
    Withdrawal {
        amount: Decimal,
        asset: String,
        address: String,
    },
    /// Stake escrowed when a trade opens.
    Stake {
        trade_id: Uuid,
        symbol: String,
        direction: Direction,
        amount: Decimal,
    },
    /// A binary contract reaching settlement.
    Contract {
        trade_id: Uuid,
        pair: String,
        direction: Direction,
        duration_secs: u32,
        entry_price: Decimal,
        exit_price: Decimal,
        outcome: TradeOutcome,
        stake: Decimal,
        payout: Decimal,
        net_profit: Decimal,
    },
}

impl TransactionKind {
    /// Signed change this entry applied to the balance.
    pub fn balance_delta(&self) -> Decimal {
        match self {
            TransactionKind::Deposit { amount, .. } => *amount,
            TransactionKind::Withdrawal { amount, .. } => -*amount,
            TransactionKind::Stake { amount, .. } => -*amount,
            TransactionKind::Contract { stake, net_profit, .. } => (*stake + *net_profit).max(Decimal::ZERO),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TransactionKind::Deposit { .. } => "deposit",
            TransactionKind::Withdrawal { .. } => "withdrawal",
            TransactionKind::Stake { .. } => "stake",
            TransactionKind::Contract { .. } => "contract",
        }
    }

    pub fn trade_id(&self) -> Option<Uuid> {
        match self {
            TransactionKind::Stake { trade_id, .. } | TransactionKind::Contract { trade_id, .. } => {
                Some(*trade_id)
            }
            _ => None,
        }
    }

    pub fn contract(trade: &Trade, settlement: &Settlement) -> Self {
        TransactionKind::Contract {
            trade_id: trade.id,
            pair: trade.pair(),
            direction: trade.direction,
            duration_secs: trade.duration_secs,
            entry_price: trade.entry_price,
            exit_price: settlement.exit_price,
            outcome: settlement.outcome,
            stake: trade.stake,
            payout: settlement.payout,
            net_profit: settlement.net_profit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: TransactionKind,
}

impl Transaction {
    pub fn new(user_id: i64, kind: TransactionKind, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            created_at,
            kind,
        }
    }
}

/// Reduces a user-supplied pair to its base symbol.
///
/// Accepts `BTC`, `btc`, `BTC-USDT`, `BTC/USDT`, `BTC_USDT` and `BTCUSDT`. Pairs quoted in
/// anything other than USDT are rejected since balances only exist in USDT.
pub fn normalize_symbol(pair: &str) -> Option<String> {
    let pair_upper = pair.trim().to_uppercase();
    if pair_upper.is_empty() {
        return None;
    }

    if let Some(separator) = pair_upper.find(['-', '/', '_']) {
        let base = &pair_upper[..separator];
        let quote = &pair_upper[separator + 1..];
        if quote != QUOTE_ASSET || !is_symbol(base) {
            return None;
        }
        return Some(base.to_string());
    }

    if pair_upper.len() > QUOTE_ASSET.len() && pair_upper.ends_with(QUOTE_ASSET) {
        let base = &pair_upper[..pair_upper.len() - QUOTE_ASSET.len()];
        if is_symbol(base) {
            return Some(base.to_string());
        }
    }

    is_symbol(&pair_upper).then_some(pair_upper)
}

fn is_symbol(s: &str) -> bool {
    (2..=10).contains(&s.len()) && s.chars().all(|c| c.is_ascii_alphanumeric())
}
