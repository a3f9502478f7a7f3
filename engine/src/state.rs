use sea_orm::DatabaseConnection;
use shared::{get_db_connection, get_redis_client, Config, PayoutSchedule};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::notifier::{BroadcastNotifier, NotificationSink, RedisNotifier};
use crate::price_source::{HttpPriceSource, PriceSource, StaticPriceSource};
use crate::repositories::{InMemoryTradeStore, TradeRepository, TradeStore};
use crate::services::{RetryPolicy, SettlementEngine, TradingService};

/// Collaborators the services are built from.
pub struct EngineParts {
    pub store: Arc<dyn TradeStore>,
    pub prices: Arc<dyn PriceSource>,
    pub notifier: Arc<dyn NotificationSink>,
    pub clock: Arc<dyn Clock>,
    pub schedule: PayoutSchedule,
    pub retry: RetryPolicy,
    pub single_active_trade: bool,
}

impl EngineParts {
    /// In-process parts: in-memory store, broadcast notifications, system clock.
    pub fn in_memory(prices: Arc<dyn PriceSource>) -> Self {
        Self {
            store: Arc::new(InMemoryTradeStore::new()),
            prices,
            notifier: Arc::new(BroadcastNotifier::default()),
            clock: Arc::new(SystemClock),
            schedule: PayoutSchedule::default(),
            retry: RetryPolicy::default(),
            single_active_trade: true,
        }
    }
}

#[derive(Clone)]
pub struct EngineState {
    pub db: Option<Arc<DatabaseConnection>>,
    pub store: Arc<dyn TradeStore>,
    pub settlement: Arc<SettlementEngine>,
    pub trading: Arc<TradingService>,
    pub recovery_interval: Duration,
}

impl EngineState {
    /// Production wiring: MySQL store, redis notifications, HTTP or built-in prices.
    pub async fn connect(config: &Config) -> Result<Self, anyhow::Error> {
        let db = Arc::new(get_db_connection(&config.database_url).await?);
        info!("Connected to database successfully");

        let prices: Arc<dyn PriceSource> = match &config.price_feed_url {
            Some(url) => {
                info!(url = %url, "Using HTTP price feed");
                Arc::new(HttpPriceSource::new(url.clone())?)
            }
            None => {
                warn!("PRICE_FEED_URL not set, serving the built-in static price table");
                Arc::new(StaticPriceSource::with_default_quotes())
            }
        };
        let redis = get_redis_client(&config.redis_url)?;

        let parts = EngineParts {
            store: Arc::new(TradeRepository::new(db.clone())),
            prices,
            notifier: Arc::new(RedisNotifier::new(redis, config.notification_channel.clone())),
            clock: Arc::new(SystemClock),
            schedule: PayoutSchedule::default().with_commission_rate(config.commission_rate),
            retry: RetryPolicy {
                base_delay: Duration::from_millis(config.settlement_retry_base_ms),
                max_delay: Duration::from_secs(config.settlement_retry_max_secs),
            },
            single_active_trade: config.single_active_trade,
        };

        let mut state = Self::from_parts(parts);
        state.db = Some(db);
        state.recovery_interval = Duration::from_secs(config.recovery_interval_secs.max(1));
        Ok(state)
    }

    pub fn from_parts(parts: EngineParts) -> Self {
        let settlement = Arc::new(SettlementEngine::new(
            parts.store.clone(),
            parts.prices.clone(),
            parts.notifier.clone(),
            parts.clock.clone(),
            parts.retry,
        ));
        let trading = TradingService::new(
            parts.store.clone(),
            parts.prices,
            settlement.clone(),
            parts.notifier,
            parts.clock,
            parts.schedule,
        )
        .with_single_active_trade(parts.single_active_trade);

        Self {
            db: None,
            store: parts.store,
            settlement,
            trading: Arc::new(trading),
            recovery_interval: Duration::from_secs(30),
        }
    }

    /// Re-arms timers for trades left active by a previous run, then keeps sweeping.
    pub async fn start_settlement(&self) -> Result<tokio::task::JoinHandle<()>, anyhow::Error> {
        let armed = self.settlement.recover().await?;
        info!(armed, "Settlement engine started");
        let engine = self.settlement.clone();
        Ok(tokio::spawn(engine.run_recovery_loop(self.recovery_interval)))
    }
}
