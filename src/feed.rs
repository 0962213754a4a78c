//! Price feed clients

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use reqwest::Client;
use rust_decimal::Decimal;

use crate::config::FeedConfig;
use crate::types::{Candle, EngineError, PricePoint, Result};

/// Trait for price data sources
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Get current price for a symbol
    async fn get_price(&self, symbol: &str) -> Result<PricePoint>;

    /// Get recent candle history, oldest first
    async fn get_candles(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>>;

    /// Source name
    fn name(&self) -> &str;
}

/// HTTP client against the price API
pub struct HttpPriceFeed {
    client: Client,
    base_url: String,
}

/// Price payload returned by the API
#[derive(Debug, serde::Deserialize)]
struct PriceResponse {
    #[allow(dead_code)]
    symbol: String,
    price: f64,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

impl HttpPriceFeed {
    pub fn new(config: &FeedConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::Feed(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn request<T: serde::de::DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| EngineError::Feed(e.to_string()))?;

        let status = response.status();
        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(EngineError::RateLimited {
                feed: "price-api".to_string(),
                retry_after,
            });
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(EngineError::Feed(format!(
                "price API error ({}): {}",
                status, text
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl PriceFeed for HttpPriceFeed {
    async fn get_price(&self, symbol: &str) -> Result<PricePoint> {
        let symbol = symbol.to_uppercase();
        let endpoint = format!("/prices/{}", symbol);
        let response: PriceResponse = self.request(&endpoint).await?;

        Ok(PricePoint {
            symbol,
            price: Decimal::try_from(response.price)
                .map_err(|e| EngineError::InvalidResponse(e.to_string()))?,
            timestamp: response.timestamp.unwrap_or_else(Utc::now),
        })
    }

    async fn get_candles(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>> {
        let endpoint = format!("/candles/{}?limit={}", symbol.to_uppercase(), limit);

        // Rows of [timestamp_ms, open, high, low, close, volume]
        let response: Vec<[f64; 6]> = self.request(&endpoint).await?;

        let candles: Vec<Candle> = response
            .into_iter()
            .filter_map(|row| {
                let timestamp = DateTime::from_timestamp_millis(row[0] as i64)?;
                Some(Candle {
                    timestamp,
                    open: Decimal::try_from(row[1]).ok()?,
                    high: Decimal::try_from(row[2]).ok()?,
                    low: Decimal::try_from(row[3]).ok()?,
                    close: Decimal::try_from(row[4]).ok()?,
                    volume: Decimal::try_from(row[5]).ok()?,
                })
            })
            .take(limit)
            .collect();

        Ok(candles)
    }

    fn name(&self) -> &str {
        "price-api"
    }
}

/// Random-walk price feed for paper runs without a live price API.
///
/// Each symbol walks from a fixed base price; candle history is generated
/// backward from the current price so the latest close always matches what
/// `get_price` last returned.
pub struct SimulatedPriceFeed {
    prices: tokio::sync::Mutex<HashMap<String, f64>>,
}

impl SimulatedPriceFeed {
    pub fn new() -> Self {
        Self {
            prices: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    fn base_price(symbol: &str) -> f64 {
        match symbol {
            "BTC" => 67000.0,
            "ETH" => 3500.0,
            "BNB" => 580.0,
            "XRP" => 0.52,
            "SOL" => 140.0,
            "ADA" => 0.45,
            "DOGE" => 0.12,
            "DOT" => 6.5,
            "AVAX" => 35.0,
            "LINK" => 14.0,
            "MATIC" => 0.85,
            "LTC" => 85.0,
            "UNI" => 9.5,
            "ATOM" => 9.2,
            "NEAR" => 5.8,
            _ => 100.0,
        }
    }
}

impl Default for SimulatedPriceFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceFeed for SimulatedPriceFeed {
    async fn get_price(&self, symbol: &str) -> Result<PricePoint> {
        let symbol = symbol.to_uppercase();
        let mut prices = self.prices.lock().await;
        let current = prices
            .entry(symbol.clone())
            .or_insert_with(|| Self::base_price(&symbol));

        // Step up to +-0.5% per fetch
        let step = (rand::random::<f64>() - 0.5) * 0.01;
        *current *= 1.0 + step;
        let price = *current;
        drop(prices);

        Ok(PricePoint {
            symbol,
            price: Decimal::try_from(price)
                .map_err(|e| EngineError::InvalidResponse(e.to_string()))?,
            timestamp: Utc::now(),
        })
    }

    async fn get_candles(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>> {
        let symbol = symbol.to_uppercase();
        let current = {
            let mut prices = self.prices.lock().await;
            *prices
                .entry(symbol.clone())
                .or_insert_with(|| Self::base_price(&symbol))
        };

        let mut rng = rand::thread_rng();

        // Walk backward from the current price so history ends where the
        // live price is
        let mut closes = vec![0.0f64; limit];
        let mut price = current;
        for slot in closes.iter_mut().rev() {
            *slot = price;
            let step = (rng.gen::<f64>() - 0.5) * 0.04;
            price /= 1.0 + step;
        }

        let now = Utc::now();
        let candles = closes
            .iter()
            .enumerate()
            .filter_map(|(i, &close)| {
                let open = if i == 0 { close } else { closes[i - 1] };
                let spread = close.max(open) * rng.gen_range(0.0..0.01);
                let high = close.max(open) + spread;
                let low = close.min(open) - spread;
                let volume = rng.gen_range(500_000.0..1_500_000.0);
                let age_hours = (limit - 1 - i) as i64;

                Some(Candle {
                    timestamp: now - chrono::Duration::hours(age_hours),
                    open: Decimal::try_from(open).ok()?,
                    high: Decimal::try_from(high).ok()?,
                    low: Decimal::try_from(low).ok()?,
                    close: Decimal::try_from(close).ok()?,
                    volume: Decimal::try_from(volume).ok()?,
                })
            })
            .collect();

        Ok(candles)
    }

    fn name(&self) -> &str {
        "simulated"
    }
}
