use async_trait::async_trait;
use shared::{publish_json, Redis, TradeEvent};
use tokio::sync::broadcast;
use tracing::debug;

/// Pushes trade events to the owning user's clients.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn emit(&self, user_id: i64, event: TradeEvent) -> Result<(), anyhow::Error>;
}

/// Publishes events as JSON on `<prefix>:<user_id>`.
pub struct RedisNotifier {
    client: Redis,
    channel_prefix: String,
}

impl RedisNotifier {
    pub fn new(client: Redis, channel_prefix: String) -> Self {
        Self {
            client,
            channel_prefix,
        }
    }

    pub fn channel_for(&self, user_id: i64) -> String {
        format!("{}:{}", self.channel_prefix, user_id)
    }
}

#[async_trait]
impl NotificationSink for RedisNotifier {
    async fn emit(&self, user_id: i64, event: TradeEvent) -> Result<(), anyhow::Error> {
        let channel = self.channel_for(user_id);
        let receivers = publish_json(&self.client, &channel, &event).await?;
        debug!(channel = %channel, receivers, trade_id = %event.trade_id(), "Published trade event");
        Ok(())
    }
}

/// In-process fan-out of `(user_id, event)` pairs.
pub struct BroadcastNotifier {
    sender: broadcast::Sender<(i64, TradeEvent)>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<(i64, TradeEvent)> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl NotificationSink for BroadcastNotifier {
    async fn emit(&self, user_id: i64, event: TradeEvent) -> Result<(), anyhow::Error> {
        // No subscribers is not a failure; clients also poll for unseen results.
        let _ = self.sender.send((user_id, event));
        Ok(())
    }
}
