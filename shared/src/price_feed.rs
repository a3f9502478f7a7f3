use anyhow::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client for the market data endpoint that lists coins with their current price.
#[derive(Debug, Clone)]
pub struct PriceFeedClient {
    pub base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinQuote {
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
    pub current_price: Decimal,
    #[serde(default)]
    pub price_change_percentage_24h: Option<Decimal>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

impl PriceFeedClient {
    pub fn new(base_url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Every coin the feed lists.
    pub async fn coins(&self) -> Result<Vec<CoinQuote>> {
        let coins = self
            .client
            .get(&format!("{}/coins", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(coins)
    }

    /// Quote for a single base symbol; `Ok(None)` when the feed does not list it.
    pub async fn coin(&self, symbol: &str) -> Result<Option<CoinQuote>> {
        let response = self
            .client
            .get(&format!("{}/coins/{}", self.base_url, symbol.to_lowercase()))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let coin: CoinQuote = response.error_for_status()?.json().await?;
        Ok(Some(coin))
    }
}
