use anyhow::Result;
use redis::{AsyncCommands, Client};
use serde::Serialize;

pub type Redis = Client;

pub fn get_redis_client(redis_url: &str) -> Result<Redis> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Serializes `payload` as JSON and publishes it; returns the number of receivers.
pub async fn publish_json<T: Serialize>(client: &Redis, channel: &str, payload: &T) -> Result<i64> {
    let body = serde_json::to_string(payload)?;
    let mut conn = client.get_multiplexed_async_connection().await?;
    let receivers: i64 = conn.publish(channel, body).await?;
    Ok(receivers)
}
