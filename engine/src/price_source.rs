//! Current-price lookups for instruments.

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::{CoinQuote, PriceFeedClient, TradeError};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::RwLock;

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Current price of `symbol` (a normalized base symbol such as `BTC`).
    ///
    /// `UnknownInstrument` when the feed does not quote it, `PriceUnavailable` when the
    /// feed cannot answer right now.
    async fn current_price(&self, symbol: &str) -> Result<Decimal, TradeError>;

    /// Every instrument the source quotes, for the market list.
    async fn quotes(&self) -> Result<Vec<CoinQuote>, TradeError>;
}

/// Price source backed by the market data HTTP feed.
pub struct HttpPriceSource {
    client: PriceFeedClient,
}

impl HttpPriceSource {
    pub fn new(base_url: String) -> Result<Self, anyhow::Error> {
        Ok(Self {
            client: PriceFeedClient::new(base_url)?,
        })
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    async fn current_price(&self, symbol: &str) -> Result<Decimal, TradeError> {
        match self.client.coin(symbol).await {
            Ok(Some(coin)) if coin.current_price > Decimal::ZERO => Ok(coin.current_price),
            Ok(Some(coin)) => Err(TradeError::PriceUnavailable {
                symbol: symbol.to_string(),
                reason: format!("feed returned non-positive price {}", coin.current_price),
            }),
            Ok(None) => Err(TradeError::UnknownInstrument(symbol.to_string())),
            Err(e) => Err(TradeError::PriceUnavailable {
                symbol: symbol.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn quotes(&self) -> Result<Vec<CoinQuote>, TradeError> {
        let coins = self.client.coins().await.map_err(|e| TradeError::PriceUnavailable {
            symbol: "*".to_string(),
            reason: e.to_string(),
        })?;
        Ok(coins
            .into_iter()
            .filter(|coin| coin.current_price > Decimal::ZERO)
            .map(|coin| CoinQuote {
                symbol: coin.symbol.to_uppercase(),
                ..coin
            })
            .collect())
    }
}

/// In-process price table. Used when no feed is configured and in tests.
#[derive(Default)]
pub struct StaticPriceSource {
    prices: RwLock<HashMap<String, Decimal>>,
    outages: AtomicU32,
}

/// Reference quotes served when running without a market data feed.
const DEFAULT_QUOTES: [(&str, &str); 8] = [
    ("BTC", "108740.19"),
    ("XRP", "2.27416"),
    ("ETH", "2547.7"),
    ("LTC", "87.56"),
    ("ADA", "0.58486"),
    ("TRX", "0.285657"),
    ("ETC", "16.6581"),
    ("EOS", "0.7231"),
];

impl StaticPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prices<I, S>(prices: I) -> Self
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: Into<String>,
    {
        let prices = prices
            .into_iter()
            .map(|(symbol, price)| (symbol.into().to_uppercase(), price))
            .collect();
        Self {
            prices: RwLock::new(prices),
            outages: AtomicU32::new(0),
        }
    }

    pub fn with_default_quotes() -> Self {
        Self::with_prices(DEFAULT_QUOTES.iter().filter_map(|(symbol, price)| {
            Decimal::from_str(price).ok().map(|price| (*symbol, price))
        }))
    }

    pub async fn set_price(&self, symbol: &str, price: Decimal) {
        self.prices.write().await.insert(symbol.to_uppercase(), price);
    }

    pub async fn remove(&self, symbol: &str) {
        self.prices.write().await.remove(&symbol.to_uppercase());
    }

    /// Makes the next `count` lookups fail with `PriceUnavailable`.
    pub fn fail_next(&self, count: u32) {
        self.outages.store(count, Ordering::SeqCst);
    }

    fn take_outage(&self) -> bool {
        self.outages
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn outage(symbol: &str) -> TradeError {
        TradeError::PriceUnavailable {
            symbol: symbol.to_string(),
            reason: "price table offline".to_string(),
        }
    }
}

#[async_trait]
impl PriceSource for StaticPriceSource {
    async fn current_price(&self, symbol: &str) -> Result<Decimal, TradeError> {
        if self.take_outage() {
            return Err(Self::outage(symbol));
        }

        self.prices
            .read()
            .await
            .get(&symbol.to_uppercase())
            .copied()
            .ok_or_else(|| TradeError::UnknownInstrument(symbol.to_string()))
    }

    async fn quotes(&self) -> Result<Vec<CoinQuote>, TradeError> {
        if self.take_outage() {
            return Err(Self::outage("*"));
        }

        let prices = self.prices.read().await;
        Ok(prices
            .iter()
            .map(|(symbol, price)| CoinQuote {
                symbol: symbol.clone(),
                name: None,
                current_price: *price,
                price_change_percentage_24h: None,
                last_updated: None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn static_source_serves_and_updates_prices() {
        let source = StaticPriceSource::with_prices([("btc", dec!(50000))]);
        assert_eq!(source.current_price("BTC").await.unwrap(), dec!(50000));
        source.set_price("BTC", dec!(50100)).await;
        assert_eq!(source.current_price("btc").await.unwrap(), dec!(50100));
        assert!(matches!(
            source.current_price("DOGE").await,
            Err(TradeError::UnknownInstrument(_))
        ));
    }

    #[tokio::test]
    async fn outages_are_consumed_one_lookup_at_a_time() {
        let source = StaticPriceSource::with_default_quotes();
        source.fail_next(2);
        assert!(source.current_price("ETH").await.unwrap_err().is_transient());
        assert!(source.current_price("ETH").await.unwrap_err().is_transient());
        assert_eq!(source.current_price("ETH").await.unwrap(), dec!(2547.7));
    }

    #[tokio::test]
    async fn quotes_cover_the_whole_table() {
        let source = StaticPriceSource::with_default_quotes();
        let mut quotes = source.quotes().await.unwrap();
        assert_eq!(quotes.len(), 8);
        quotes.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        assert_eq!(quotes[0].symbol, "ADA");
        assert_eq!(quotes[0].current_price, dec!(0.58486));

        source.remove("ADA").await;
        assert_eq!(source.quotes().await.unwrap().len(), 7);
    }
}
